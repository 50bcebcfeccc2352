//! # 文件系统层
//!
//! 磁盘的布局：扇区 0 存放空闲扇区位图文件的文件头，
//! 扇区 1 存放根目录文件的文件头，其余扇区由位图统一分配。
//! 位图与根目录都是普通文件，在文件系统实例的整个生命期内保持打开。
//!
//! 修改目录或位图的操作(创建、删除、建目录)遵循同一条纪律：
//! 全部步骤在内存副本上完成，成功后才写回磁盘；
//! 任何一步失败就丢弃内存副本，磁盘保持原样。

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Write as _;

use log::debug;

use crate::block_cache;
use crate::BlockDevice;
use crate::Directory;
use crate::Error;
use crate::FileHeader;
use crate::OpenFile;
use crate::PersistentBitmap;
use crate::{DIRECTORY_FILE_SIZE, FREE_MAP_SECTOR, ROOT_DIR_SECTOR};

pub struct FileSystem {
    device: Arc<dyn BlockDevice>,
    total_sectors: usize,
    /// 位图文件，常开
    free_map_file: OpenFile,
    /// 根目录文件，常开
    root_dir_file: OpenFile,
}

/// 列目录的结果项，`depth` 为递归列出时相对起点的深度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub is_dir: bool,
    pub depth: usize,
}

/// 路径解析的结果：终点所在的父目录、终点名字，
/// 以及终点目录项(若存在)指向的扇区与类别
struct Resolved {
    parent: Directory,
    parent_sector: usize,
    name: String,
    target: Option<(u32, bool)>,
}

impl FileSystem {
    /// 格式化磁盘并建立文件系统实例。
    ///
    /// 在新位图中保留扇区 0 与 1，为位图文件和根目录文件分配空间，
    /// 把两个文件头写到众所周知的扇区，最后持久化空目录与位图本身。
    pub fn format(device: Arc<dyn BlockDevice>, total_sectors: usize) -> Self {
        debug!(target: "fs", "formatting {total_sectors} sectors");
        let mut free_map = PersistentBitmap::new(total_sectors);
        free_map.mark(FREE_MAP_SECTOR);
        free_map.mark(ROOT_DIR_SECTOR);

        let mut map_header = FileHeader::new();
        let mut dir_header = FileHeader::new();
        map_header
            .allocate(&mut free_map, total_sectors / 8, &device)
            .expect("no space for the free map file");
        dir_header
            .allocate(&mut free_map, DIRECTORY_FILE_SIZE, &device)
            .expect("no space for the root directory file");

        // 先落盘文件头才能打开这两个文件
        map_header.write_back(FREE_MAP_SECTOR, &device);
        dir_header.write_back(ROOT_DIR_SECTOR, &device);

        let free_map_file = OpenFile::new(FREE_MAP_SECTOR, device.clone());
        let root_dir_file = OpenFile::new(ROOT_DIR_SECTOR, device.clone());

        free_map.write_back(&free_map_file);
        Directory::new().write_back(&root_dir_file);
        block_cache::sync_all();

        Self {
            device,
            total_sectors,
            free_map_file,
            root_dir_file,
        }
    }

    /// 打开一块已格式化的磁盘
    pub fn load(device: Arc<dyn BlockDevice>, total_sectors: usize) -> Self {
        let free_map_file = OpenFile::new(FREE_MAP_SECTOR, device.clone());
        let root_dir_file = OpenFile::new(ROOT_DIR_SECTOR, device.clone());
        assert_eq!(free_map_file.length(), total_sectors / 8);

        Self {
            device,
            total_sectors,
            free_map_file,
            root_dir_file,
        }
    }

    /// 创建 `size` 字节的文件，大小自此固定
    pub fn create(&self, path: &str, size: usize) -> Result<(), Error> {
        debug!(target: "fs", "creating file {path} of {size} bytes");
        let resolved = self.resolve(path)?;
        if resolved.target.is_some() {
            return Err(Error::AlreadyExists);
        }

        let mut free_map = self.fetch_free_map();
        let mut parent = resolved.parent;

        // 文件头自己的扇区
        let header_sector = free_map.find_and_set().ok_or(Error::NoSpace)? as u32;
        parent.add(&resolved.name, header_sector, false)?;

        let mut header = FileHeader::new();
        header.allocate(&mut free_map, size, &self.device)?;

        // 诸事顺利，把所有修改写回磁盘
        header.write_back(header_sector as usize, &self.device);
        parent.write_back(&self.dir_file(resolved.parent_sector));
        free_map.write_back(&self.free_map_file);
        block_cache::sync_all();

        debug!(target: "fs", "file {path} created at sector {header_sector}");
        Ok(())
    }

    /// 创建子目录
    pub fn mkdir(&self, path: &str) -> Result<(), Error> {
        debug!(target: "fs", "creating directory {path}");
        let resolved = self.resolve(path)?;
        if resolved.target.is_some() {
            return Err(Error::AlreadyExists);
        }

        let mut free_map = self.fetch_free_map();
        let mut parent = resolved.parent;

        let header_sector = free_map.find_and_set().ok_or(Error::NoSpace)? as u32;
        parent.add(&resolved.name, header_sector, true)?;

        let mut header = FileHeader::new();
        header.allocate(&mut free_map, DIRECTORY_FILE_SIZE, &self.device)?;

        header.write_back(header_sector as usize, &self.device);
        // 新目录以空表起步
        Directory::new().write_back(&self.dir_file(header_sector as usize));
        parent.write_back(&self.dir_file(resolved.parent_sector));
        free_map.write_back(&self.free_map_file);
        block_cache::sync_all();

        debug!(target: "fs", "directory {path} created at sector {header_sector}");
        Ok(())
    }

    /// 打开文件，返回带游标的 [`OpenFile`]
    pub fn open(&self, path: &str) -> Result<OpenFile, Error> {
        let resolved = self.resolve(path)?;
        let (sector, _) = resolved.target.ok_or(Error::NotFound)?;
        Ok(OpenFile::new(sector as usize, self.device.clone()))
    }

    /// 删除文件或目录。
    /// 非空目录只有在 `recursive` 置位时才会连同子项一并删除。
    pub fn remove(&self, path: &str, recursive: bool) -> Result<(), Error> {
        debug!(target: "fs", "removing {path}");
        let resolved = self.resolve(path)?;
        let (sector, is_dir) = resolved.target.ok_or(Error::NotFound)?;

        if is_dir {
            let directory = Directory::fetch_from(&self.dir_file(sector as usize));
            if !directory.is_empty() {
                if !recursive {
                    return Err(Error::DirectoryNotEmpty);
                }
                // 以拼接出的绝对路径逐个删除子项
                let base = path.trim_end_matches('/');
                let names: Vec<String> = directory
                    .entries()
                    .map(|entry| String::from(entry.name()))
                    .collect();
                for name in names {
                    self.remove(&format!("{base}/{name}"), true)?;
                }
            }
        }

        // 递归删除改写过磁盘，重新解析取得最新的父目录
        let resolved = self.resolve(path)?;
        let (sector, _) = resolved.target.ok_or(Error::NotFound)?;
        let mut parent = resolved.parent;

        let mut free_map = self.fetch_free_map();
        let header = FileHeader::fetch_from(sector as usize, &self.device);
        header.deallocate(&mut free_map, &self.device);
        free_map.clear(sector as usize);
        parent.remove(&resolved.name)?;

        free_map.write_back(&self.free_map_file);
        parent.write_back(&self.dir_file(resolved.parent_sector));
        block_cache::sync_all();

        debug!(target: "fs", "{path} removed, sector {sector} freed");
        Ok(())
    }

    /// 列出目录内容，`recursive` 置位时深入子目录
    pub fn list(&self, path: &str, recursive: bool) -> Result<Vec<ListEntry>, Error> {
        let directory = self.directory_at(path)?;
        let mut entries = Vec::new();
        self.list_into(&directory, recursive, 0, &mut entries);
        Ok(entries)
    }

    /// 打印文件系统全貌：两个众所周知的文件头、位图与目录树
    pub fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "free map file header:")?;
        FileHeader::fetch_from(FREE_MAP_SECTOR, &self.device).dump(out, &self.device)?;
        writeln!(out, "root directory file header:")?;
        FileHeader::fetch_from(ROOT_DIR_SECTOR, &self.device).dump(out, &self.device)?;

        let free_map = self.fetch_free_map();
        writeln!(
            out,
            "free map: {} of {} sectors clear, set:",
            free_map.num_clear(),
            self.total_sectors
        )?;
        for sector in (0..self.total_sectors).filter(|&sector| free_map.test(sector)) {
            write!(out, "{sector} ")?;
        }
        writeln!(out)?;

        writeln!(out, "directory tree:")?;
        let root = Directory::fetch_from(&self.dir_file(ROOT_DIR_SECTOR));
        self.dump_tree(&root, 0, out)
    }

    /// 重新从磁盘读出位图
    pub fn fetch_free_map(&self) -> PersistentBitmap {
        PersistentBitmap::fetch_from(&self.free_map_file, self.total_sectors)
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.device
    }

    #[inline]
    pub fn total_sectors(&self) -> usize {
        self.total_sectors
    }
}

impl FileSystem {
    /// 从根目录出发解析 `/` 分隔的绝对路径。
    ///
    /// 每一段中间名字必须解析到一个子目录，否则以 [`Error::NotFound`]
    /// 或 [`Error::NotADirectory`] 终止；终点名字允许不存在，
    /// 此时 `target` 为空，交由调用者定夺。
    fn resolve(&self, path: &str) -> Result<Resolved, Error> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        let mut segment = segments.next().ok_or(Error::NotFound)?;
        let mut parent_sector = ROOT_DIR_SECTOR;
        let mut parent = Directory::fetch_from(&self.root_dir_file);

        loop {
            let target = parent.find_entry(segment);
            let Some(next) = segments.next() else {
                return Ok(Resolved {
                    parent,
                    parent_sector,
                    name: String::from(segment),
                    target,
                });
            };

            // 还有后续段，当前段必须是已存在的目录
            match target {
                Some((sector, true)) => {
                    parent_sector = sector as usize;
                    parent = Directory::fetch_from(&self.dir_file(parent_sector));
                    segment = next;
                }
                Some((_, false)) => return Err(Error::NotADirectory),
                None => return Err(Error::NotFound),
            }
        }
    }

    /// 解析到目录本身；根路径直接返回根目录
    fn directory_at(&self, path: &str) -> Result<Directory, Error> {
        if path.split('/').all(|s| s.is_empty()) {
            return Ok(Directory::fetch_from(&self.root_dir_file));
        }

        let resolved = self.resolve(path)?;
        match resolved.target {
            Some((sector, true)) => Ok(Directory::fetch_from(&self.dir_file(sector as usize))),
            Some((_, false)) => Err(Error::NotADirectory),
            None => Err(Error::NotFound),
        }
    }

    fn list_into(
        &self,
        directory: &Directory,
        recursive: bool,
        depth: usize,
        entries: &mut Vec<ListEntry>,
    ) {
        for entry in directory.entries() {
            entries.push(ListEntry {
                name: String::from(entry.name()),
                is_dir: entry.is_dir(),
                depth,
            });
            if recursive && entry.is_dir() {
                let sub = Directory::fetch_from(&self.dir_file(entry.sector() as usize));
                self.list_into(&sub, recursive, depth + 1, entries);
            }
        }
    }

    fn dump_tree(&self, directory: &Directory, depth: usize, out: &mut dyn fmt::Write) -> fmt::Result {
        for entry in directory.entries() {
            for _ in 0..depth {
                write!(out, "  ")?;
            }
            writeln!(
                out,
                "{}{} (header at sector {})",
                entry.name(),
                if entry.is_dir() { "/" } else { "" },
                entry.sector()
            )?;
            if entry.is_dir() {
                let sub = Directory::fetch_from(&self.dir_file(entry.sector() as usize));
                self.dump_tree(&sub, depth + 1, out)?;
            }
        }
        Ok(())
    }

    /// 以常规文件的方式打开一个目录文件
    fn dir_file(&self, header_sector: usize) -> OpenFile {
        OpenFile::new(header_sector, self.device.clone())
    }
}
