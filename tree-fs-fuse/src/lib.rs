
use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Read, Write};
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use tree_fs::BlockDevice;
use tree_fs::SECTOR_SIZE;

/// 以宿主机上的普通文件为底的块设备
pub struct BlockFile(pub Mutex<File>);

impl BlockDevice for BlockFile {
    fn read_sector(&self, sector: usize, buf: &mut [u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((sector * SECTOR_SIZE) as u64))
            .expect("seeking error");
        assert_eq!(file.read(buf).unwrap(), SECTOR_SIZE, "not a complete sector!");
    }

    fn write_sector(&self, sector: usize, buf: &[u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((sector * SECTOR_SIZE) as u64))
            .expect("seeking error");
        assert_eq!(
            file.write(buf).unwrap(),
            SECTOR_SIZE,
            "not a complete sector!"
        );
    }
}

/// 新建并撑到指定扇区数的磁盘镜像
pub fn create_disk(path: &Path, sectors: usize) -> io::Result<BlockFile> {
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    fd.set_len((sectors * SECTOR_SIZE) as u64)?;

    Ok(BlockFile(Mutex::new(fd)))
}

/// 打开既有的磁盘镜像
pub fn open_disk(path: &Path) -> io::Result<BlockFile> {
    let fd = OpenOptions::new().read(true).write(true).open(path)?;
    Ok(BlockFile(Mutex::new(fd)))
}
