//! # 目录层
//!
//! 目录是一张定长的目录项表，以文件形式存放在磁盘上。
//! 目录内名字唯一，目录项记录名字指向的文件头扇区以及是否为子目录。

use crate::DirEntry;
use crate::Error;
use crate::OpenFile;
use crate::NUM_DIR_ENTRIES;

pub struct Directory {
    table: [DirEntry; NUM_DIR_ENTRIES],
}

impl Directory {
    /// 空目录
    pub fn new() -> Self {
        Self {
            table: core::array::from_fn(|_| DirEntry::default()),
        }
    }

    /// 在目录中查找名字，返回其文件头扇区
    pub fn find(&self, name: &str) -> Option<u32> {
        self.entry(name).map(DirEntry::sector)
    }

    /// 在目录中查找名字，返回其文件头扇区与是否为子目录
    pub fn find_entry(&self, name: &str) -> Option<(u32, bool)> {
        self.entry(name).map(|entry| (entry.sector(), entry.is_dir()))
    }

    /// 名字是否指向子目录
    pub fn is_dir(&self, name: &str) -> bool {
        self.entry(name).is_some_and(DirEntry::is_dir)
    }

    /// 把名字放进第一个空槽
    pub fn add(&mut self, name: &str, sector: u32, is_dir: bool) -> Result<(), Error> {
        if name.len() > crate::NAME_MAX_LEN {
            return Err(Error::NameTooLong);
        }
        if self.entry(name).is_some() {
            return Err(Error::AlreadyExists);
        }

        let slot = self
            .table
            .iter_mut()
            .find(|entry| !entry.in_use())
            .ok_or(Error::DirectoryFull)?;
        *slot = DirEntry::new(name, sector, is_dir);

        Ok(())
    }

    /// 释放名字所在的槽位，返回其文件头扇区
    pub fn remove(&mut self, name: &str) -> Result<u32, Error> {
        let entry = self
            .table
            .iter_mut()
            .find(|entry| entry.in_use() && entry.name() == name)
            .ok_or(Error::NotFound)?;

        let sector = entry.sector();
        entry.vacate();
        Ok(sector)
    }

    /// 遍历在用的目录项
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.table.iter().filter(|entry| entry.in_use())
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// 从底层文件读出整张目录表
    pub fn fetch_from(file: &OpenFile) -> Self {
        let mut directory = Self::new();
        for (index, entry) in directory.table.iter_mut().enumerate() {
            assert_eq!(
                file.read_at(entry.as_bytes_mut(), index * DirEntry::SIZE),
                DirEntry::SIZE
            );
        }
        directory
    }

    /// 把整张目录表重写进底层文件
    pub fn write_back(&self, file: &OpenFile) {
        for (index, entry) in self.table.iter().enumerate() {
            assert_eq!(
                file.write_at(entry.as_bytes(), index * DirEntry::SIZE),
                DirEntry::SIZE
            );
        }
    }
}

impl Directory {
    fn entry(&self, name: &str) -> Option<&DirEntry> {
        self.table
            .iter()
            .find(|entry| entry.in_use() && entry.name() == name)
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_find_remove() {
        let mut directory = Directory::new();
        directory.add("a", 7, false).unwrap();
        directory.add("sub", 9, true).unwrap();

        assert_eq!(directory.find("a"), Some(7));
        assert_eq!(directory.find_entry("sub"), Some((9, true)));
        assert!(directory.is_dir("sub"));
        assert!(!directory.is_dir("a"));
        assert_eq!(directory.find("b"), None);

        assert_eq!(directory.add("a", 11, false), Err(Error::AlreadyExists));
        assert_eq!(directory.remove("a"), Ok(7));
        assert_eq!(directory.remove("a"), Err(Error::NotFound));

        // 槽位释放后可以复用
        directory.add("a", 11, false).unwrap();
        assert_eq!(directory.find("a"), Some(11));
    }

    #[test]
    fn table_full() {
        let mut directory = Directory::new();
        let mut name = alloc::string::String::new();
        for index in 0..NUM_DIR_ENTRIES {
            use core::fmt::Write;
            name.clear();
            write!(name, "f{index}").unwrap();
            directory.add(&name, index as u32 + 2, false).unwrap();
        }
        assert_eq!(directory.add("one-more", 99, false), Err(Error::DirectoryFull));
    }

    #[test]
    fn name_bound() {
        let mut directory = Directory::new();
        let long = "x".repeat(crate::NAME_MAX_LEN + 1);
        assert_eq!(directory.add(&long, 2, false), Err(Error::NameTooLong));
    }
}
