use std::mem;

use tree_fs::{DirEntry, FileHeader};
use tree_fs::{DIRECTORY_FILE_SIZE, NUM_DIRECT, SECTOR_SIZE};
use tree_fs::{MAX_FILE_SIZE1, MAX_FILE_SIZE2, MAX_FILE_SIZE3};

#[test]
fn on_disk_records() {
    assert_eq!(SECTOR_SIZE, mem::size_of::<FileHeader>());
    assert_eq!(32, mem::size_of::<DirEntry>());
}

#[test]
fn geometry() {
    assert_eq!(NUM_DIRECT, 30);
    assert_eq!(MAX_FILE_SIZE1, 3840);
    assert_eq!(MAX_FILE_SIZE2, 115_200);
    assert_eq!(MAX_FILE_SIZE3, 3_456_000);
    // 目录文件必须落在单层树的容量之内
    assert!(DIRECTORY_FILE_SIZE <= MAX_FILE_SIZE1);
}
