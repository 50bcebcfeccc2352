//! # 打开文件层
//!
//! [`OpenFile`] 在打开时读入文件头，并维护一个私有的字节游标。
//! 文件大小在创建时固定，读写都以文件长度为界，不会增长文件。

use alloc::sync::Arc;

use crate::block_cache;
use crate::BlockDevice;
use crate::FileHeader;
use crate::SectorData;
use crate::SECTOR_SIZE;

pub struct OpenFile {
    header: FileHeader,
    header_sector: usize,
    seek_position: usize,
    device: Arc<dyn BlockDevice>,
}

impl OpenFile {
    pub fn new(header_sector: usize, device: Arc<dyn BlockDevice>) -> Self {
        Self {
            header: FileHeader::fetch_from(header_sector, &device),
            header_sector,
            seek_position: 0,
            device,
        }
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.header.length()
    }

    #[inline]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    #[inline]
    pub fn header_sector(&self) -> usize {
        self.header_sector
    }

    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.seek_position = position;
    }

    /// 从游标处读取并推进游标，返回读到的字节数
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let read = self.read_at(buf, self.seek_position);
        self.seek_position += read;
        read
    }

    /// 在游标处写入并推进游标，返回写入的字节数
    pub fn write(&mut self, buf: &[u8]) -> usize {
        let written = self.write_at(buf, self.seek_position);
        self.seek_position += written;
        written
    }

    /// 从指定位置(字节偏移)读出数据填充 `buf`。
    /// 读过文件末尾返回 0。
    pub fn read_at(&self, buf: &mut [u8], offset: usize) -> usize {
        let mut start = offset;
        let end = (offset + buf.len()).min(self.length());

        if start >= end {
            return 0;
        }

        // 已读取多少字节
        let mut read = 0;
        loop {
            // 当前扇区的末地址(字节)
            let sector_end = ((start / SECTOR_SIZE + 1) * SECTOR_SIZE).min(end);
            let count = sector_end - start;

            let sector = self.header.byte_to_sector(start, &self.device) as usize;
            block_cache::get(sector, self.device.clone())
                .lock()
                .map(0, |data: &SectorData| {
                    // 绝对地址 % 扇区大小 = 扇区内偏移
                    let src = &data[start % SECTOR_SIZE..start % SECTOR_SIZE + count];
                    buf[read..read + count].copy_from_slice(src);
                });

            read += count;

            if sector_end == end {
                break;
            }

            start = sector_end;
        }

        read
    }

    /// 把 `buf` 写入指定位置(字节偏移)。
    /// 超出文件末尾的部分被截断；不足一个扇区的写入
    /// 经由扇区缓存自然地完成读-改-写。
    pub fn write_at(&self, buf: &[u8], offset: usize) -> usize {
        let mut start = offset;
        let end = (offset + buf.len()).min(self.length());

        if start >= end {
            return 0;
        }

        let mut written = 0;
        loop {
            let sector_end = ((start / SECTOR_SIZE + 1) * SECTOR_SIZE).min(end);
            let count = sector_end - start;

            let sector = self.header.byte_to_sector(start, &self.device) as usize;
            block_cache::get(sector, self.device.clone())
                .lock()
                .map_mut(0, |data: &mut SectorData| {
                    let dest = &mut data[start % SECTOR_SIZE..start % SECTOR_SIZE + count];
                    dest.copy_from_slice(&buf[written..written + count]);
                });

            written += count;

            if sector_end == end {
                break;
            }

            start = sector_end;
        }

        written
    }
}
