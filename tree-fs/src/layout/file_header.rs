//! # 文件头树
//!
//! 每个文件头恰好占据一个扇区，记录文件的字节数与一张索引槽表。
//! 小文件(不超过 [`MAX_FILE_SIZE1`])的槽直接指向数据扇区；
//! 更大的文件的槽指向**子文件头**，从而构成一棵扇出为
//! [`NUM_DIRECT`] 的索引树，树高最多四层。
//!
//! 除最后一个孩子外，每个孩子都覆盖满一层的容量，
//! 因此树总是取能容纳文件的最小高度。
//!
//! [`MAX_FILE_SIZE1`]: crate::MAX_FILE_SIZE1
//! [`NUM_DIRECT`]: crate::NUM_DIRECT

use alloc::sync::Arc;
use core::fmt;
use core::fmt::Write as _;
use core::mem;

use crate::block_cache;
use crate::BlockDevice;
use crate::Error;
use crate::PersistentBitmap;
use crate::SectorData;
use crate::{MAX_FILE_SIZE, MAX_FILE_SIZE1, MAX_FILE_SIZE2, MAX_FILE_SIZE3};
use crate::{NUM_DIRECT, SECTOR_SIZE};

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FileHeader {
    /// 文件字节数，对子文件头而言是子树覆盖的字节数
    num_bytes: u32,
    /// 已填充的索引槽数量
    num_sectors: u32,
    /// 索引槽表，指向数据扇区或子文件头扇区
    data_sectors: [u32; NUM_DIRECT],
}

// 文件头必须恰好占据一个扇区
const _: () = assert!(mem::size_of::<FileHeader>() == SECTOR_SIZE);

impl FileHeader {
    pub fn new() -> Self {
        Self {
            num_bytes: 0,
            num_sectors: 0,
            data_sectors: [0; NUM_DIRECT],
        }
    }

    /// 文件的字节数
    #[inline]
    pub fn length(&self) -> usize {
        self.num_bytes as usize
    }

    /// 已填充的索引槽
    #[inline]
    pub fn sectors(&self) -> &[u32] {
        &self.data_sectors[..self.num_sectors as usize]
    }

    /// 文件头树的高度
    pub fn height(&self) -> usize {
        match Self::level_span(self.num_bytes as usize) {
            Some(MAX_FILE_SIZE3) => 4,
            Some(MAX_FILE_SIZE2) => 3,
            Some(_) => 2,
            None => 1,
        }
    }

    /// 容纳 `size` 字节所需的扇区总数，包括数据扇区与所有内部文件头扇区，
    /// 不含根文件头自身
    pub fn total_sectors(size: usize) -> usize {
        let mut total = size.div_ceil(SECTOR_SIZE);
        if size > MAX_FILE_SIZE1 {
            total += size.div_ceil(MAX_FILE_SIZE1);
        }
        if size > MAX_FILE_SIZE2 {
            total += size.div_ceil(MAX_FILE_SIZE2);
        }
        if size > MAX_FILE_SIZE3 {
            total += size.div_ceil(MAX_FILE_SIZE3);
        }
        total
    }

    /// 为 `size` 字节的新文件预定扇区并构建文件头树。
    ///
    /// 入口处先确认空闲扇区足以容纳整棵树，之后才开始消耗位图，
    /// 所以要么什么都不占用，要么整棵树构建完成。
    /// 子文件头随分配写回各自的扇区；根文件头由调用者写回。
    pub fn allocate(
        &mut self,
        free_map: &mut PersistentBitmap,
        size: usize,
        device: &Arc<dyn BlockDevice>,
    ) -> Result<(), Error> {
        assert!(size <= MAX_FILE_SIZE);
        if free_map.num_clear() < Self::total_sectors(size) {
            return Err(Error::NoSpace);
        }

        self.build(free_map, size, device);
        Ok(())
    }

    /// 释放整棵树占用的扇区。
    /// 内部层先递归释放子树，再释放子文件头自己的扇区。
    pub fn deallocate(&self, free_map: &mut PersistentBitmap, device: &Arc<dyn BlockDevice>) {
        if self.num_bytes as usize > MAX_FILE_SIZE1 {
            for &sector in self.sectors() {
                let child = Self::fetch_from(sector as usize, device);
                child.deallocate(free_map, device);
                free_map.clear(sector as usize);
            }
        } else {
            for &sector in self.sectors() {
                // 数据扇区一定在位图中置位
                assert!(free_map.test(sector as usize));
                free_map.clear(sector as usize);
            }
        }
    }

    /// 文件内字节偏移到数据扇区号的转换，即沿树下行的查找
    pub fn byte_to_sector(&self, offset: usize, device: &Arc<dyn BlockDevice>) -> u32 {
        assert!(offset < self.num_bytes as usize);
        match Self::level_span(self.num_bytes as usize) {
            None => self.data_sectors[offset / SECTOR_SIZE],
            Some(span) => {
                let which = offset / span;
                let child = Self::fetch_from(self.data_sectors[which] as usize, device);
                child.byte_to_sector(offset % span, device)
            }
        }
    }

    /// 从磁盘扇区读出文件头
    pub fn fetch_from(sector: usize, device: &Arc<dyn BlockDevice>) -> Self {
        block_cache::get(sector, device.clone())
            .lock()
            .map(0, |header: &Self| *header)
    }

    /// 把文件头写回磁盘扇区
    pub fn write_back(&self, sector: usize, device: &Arc<dyn BlockDevice>) {
        block_cache::get(sector, device.clone())
            .lock()
            .map_mut(0, |on_disk: &mut Self| *on_disk = *self);
    }

    /// 打印文件头与文件内容，不可见字节以十六进制转义
    pub fn dump(&self, out: &mut dyn fmt::Write, device: &Arc<dyn BlockDevice>) -> fmt::Result {
        writeln!(
            out,
            "file header: {} bytes over {} slots",
            self.num_bytes, self.num_sectors
        )?;

        if self.num_bytes as usize > MAX_FILE_SIZE1 {
            for &sector in self.sectors() {
                writeln!(out, "child header at sector {sector}:")?;
                Self::fetch_from(sector as usize, device).dump(out, device)?;
            }
            return Ok(());
        }

        for &sector in self.sectors() {
            write!(out, "{sector} ")?;
        }
        writeln!(out)?;

        let mut remaining = self.num_bytes as usize;
        for &sector in self.sectors() {
            let data = block_cache::get(sector as usize, device.clone())
                .lock()
                .map(0, |data: &SectorData| *data);
            for &byte in data.iter().take(remaining.min(SECTOR_SIZE)) {
                if (0x20..0x7f).contains(&byte) {
                    write!(out, "{}", byte as char)?;
                } else {
                    write!(out, "\\{byte:x}")?;
                }
            }
            remaining -= remaining.min(SECTOR_SIZE);
            writeln!(out)?;
        }

        Ok(())
    }
}

impl FileHeader {
    /// 容纳 `size` 字节的树中，每个孩子覆盖的字节数；
    /// 单层树(槽直接指向数据扇区)返回空
    fn level_span(size: usize) -> Option<usize> {
        if size > MAX_FILE_SIZE3 {
            Some(MAX_FILE_SIZE3)
        } else if size > MAX_FILE_SIZE2 {
            Some(MAX_FILE_SIZE2)
        } else if size > MAX_FILE_SIZE1 {
            Some(MAX_FILE_SIZE1)
        } else {
            None
        }
    }

    fn build(&mut self, free_map: &mut PersistentBitmap, size: usize, device: &Arc<dyn BlockDevice>) {
        self.num_bytes = size as u32;

        let Some(span) = Self::level_span(size) else {
            self.num_sectors = size.div_ceil(SECTOR_SIZE) as u32;
            for slot in 0..self.num_sectors as usize {
                self.data_sectors[slot] = Self::reserve(free_map);
            }
            return;
        };

        self.num_sectors = size.div_ceil(span) as u32;
        let mut remaining = size;
        for slot in 0..self.num_sectors as usize {
            let sector = Self::reserve(free_map);
            self.data_sectors[slot] = sector;

            let mut child = Self::new();
            child.build(free_map, remaining.min(span), device);
            child.write_back(sector as usize, device);
            remaining -= remaining.min(span);
        }
    }

    fn reserve(free_map: &mut PersistentBitmap) -> u32 {
        // 入口处已经确认空间充足
        free_map.find_and_set().expect("free map exhausted") as u32
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_accounting() {
        assert_eq!(FileHeader::total_sectors(0), 0);
        assert_eq!(FileHeader::total_sectors(100), 1);
        assert_eq!(FileHeader::total_sectors(MAX_FILE_SIZE1), NUM_DIRECT);
        // 两层树：32 个数据扇区加 2 个子文件头
        assert_eq!(FileHeader::total_sectors(4000), 34);
        // 恰好填满两层
        assert_eq!(
            FileHeader::total_sectors(MAX_FILE_SIZE2),
            NUM_DIRECT * NUM_DIRECT + NUM_DIRECT
        );
        // 跨入三层，多出一层中间文件头
        assert_eq!(
            FileHeader::total_sectors(MAX_FILE_SIZE2 + 1),
            (NUM_DIRECT * NUM_DIRECT + 1) + (NUM_DIRECT + 1) + 2
        );
    }

    #[test]
    fn tree_heights() {
        assert_eq!(FileHeader::level_span(0), None);
        assert_eq!(FileHeader::level_span(MAX_FILE_SIZE1), None);
        assert_eq!(FileHeader::level_span(MAX_FILE_SIZE1 + 1), Some(MAX_FILE_SIZE1));
        assert_eq!(FileHeader::level_span(MAX_FILE_SIZE2 + 1), Some(MAX_FILE_SIZE2));
        assert_eq!(FileHeader::level_span(MAX_FILE_SIZE3 + 1), Some(MAX_FILE_SIZE3));
    }
}
