#![no_std]

extern crate alloc;

/* tree-fs 的整体架构，自上而下 */

// 文件系统层：格式化、路径解析，创建、打开、删除文件与目录
mod fs;
pub use fs::FileSystem;
pub use fs::ListEntry;

// 目录层：定长目录表的查找与增删
mod directory;
pub use directory::Directory;

// 打开文件层：文件头与字节游标
mod open_file;
pub use open_file::OpenFile;

// 磁盘数据结构层：文件头树与目录项
mod layout;
pub use layout::{DirEntry, FileHeader};

// 空闲扇区位图层：以文件形式持久化
mod bitmap;
pub use bitmap::PersistentBitmap;

// 扇区缓存层：内存上的磁盘扇区数据缓存
mod block_cache;
pub use block_cache::sync_all;

// 块设备接口层：读写磁盘扇区的接口
mod block_dev;
pub use block_dev::BlockDevice;

mod error;
pub use error::Error;

/// 扇区字节数
pub const SECTOR_SIZE: usize = 128;
/// 文件头的索引槽数量，即文件头树的扇出
pub const NUM_DIRECT: usize =
    (SECTOR_SIZE - 2 * core::mem::size_of::<u32>()) / core::mem::size_of::<u32>();

/// 一层文件头树的容量(字节)
pub const MAX_FILE_SIZE1: usize = NUM_DIRECT * SECTOR_SIZE;
/// 二层文件头树的容量
pub const MAX_FILE_SIZE2: usize = NUM_DIRECT * MAX_FILE_SIZE1;
/// 三层文件头树的容量
pub const MAX_FILE_SIZE3: usize = NUM_DIRECT * MAX_FILE_SIZE2;
/// 四层文件头树的容量，也就是单个文件的大小上限
pub const MAX_FILE_SIZE: usize = NUM_DIRECT * MAX_FILE_SIZE3;

/// 空闲扇区位图文件头所在的扇区
pub const FREE_MAP_SECTOR: usize = 0;
/// 根目录文件头所在的扇区
pub const ROOT_DIR_SECTOR: usize = 1;

/// 文件名长度上限(字节)
pub const NAME_MAX_LEN: usize = 24;
/// 每个目录的目录项数量
pub const NUM_DIR_ENTRIES: usize = 64;
/// 目录文件的大小(字节)
pub const DIRECTORY_FILE_SIZE: usize = NUM_DIR_ENTRIES * DirEntry::SIZE;

type SectorData = [u8; SECTOR_SIZE];
