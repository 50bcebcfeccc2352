//! 系统调用面。
//!
//! 打开的文件放进一张每进程 20 槽的句柄表，
//! 句柄就是槽位下标，耗尽或句柄非法一律返回 -1。
//! 控制台输出通过 [`Console`] 特质交由宿主实现。

use log::debug;
use log::info;
use tree_fs::OpenFile;

use crate::kernel::Kernel;

pub const OPEN_FILE_TABLE_LEN: usize = 20;

/// 控制台输出的接缝，宿主提供实现
pub trait Console {
    fn put_int(&mut self, value: i32);
}

pub(crate) struct OpenFileTable {
    slots: [Option<OpenFile>; OPEN_FILE_TABLE_LEN],
}

impl OpenFileTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    fn vacant(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    fn get_mut(&mut self, id: i32) -> Option<&mut OpenFile> {
        usize::try_from(id)
            .ok()
            .and_then(|id| self.slots.get_mut(id))
            .and_then(Option::as_mut)
    }
}

impl Kernel {
    /// 停机。打印统计数字并让宿主收尾。
    pub fn sys_halt(&mut self) {
        info!(
            target: "machine",
            "halting: {} ticks total, {} system, {} user, {} idle",
            self.stats.total_ticks,
            self.stats.system_ticks,
            self.stats.user_ticks,
            self.stats.idle_ticks
        );
        self.halted = true;
    }

    pub fn sys_print_int(&self, console: &mut dyn Console, value: i32) {
        console.put_int(value);
    }

    /// 创建文件，成功返回 1，失败返回 0
    pub fn sys_create(&mut self, path: &str, size: usize) -> i32 {
        let Some(fs) = &self.file_system else {
            return 0;
        };
        match fs.create(path, size) {
            Ok(()) => 1,
            Err(err) => {
                debug!(target: "fs", "create {path} failed: {err:?}");
                0
            }
        }
    }

    /// 打开文件，返回句柄，失败返回 -1
    pub fn sys_open(&mut self, path: &str) -> i32 {
        let Some(fs) = &self.file_system else {
            return -1;
        };
        let Some(id) = self.open_files.vacant() else {
            debug!(target: "fs", "open {path} failed: no vacant handle");
            return -1;
        };

        match fs.open(path) {
            Ok(file) => {
                self.open_files.slots[id] = Some(file);
                id as i32
            }
            Err(err) => {
                debug!(target: "fs", "open {path} failed: {err:?}");
                -1
            }
        }
    }

    /// 从句柄的游标处读取，返回读到的字节数，句柄非法返回 -1
    pub fn sys_read(&mut self, buf: &mut [u8], id: i32) -> i32 {
        match self.open_files.get_mut(id) {
            Some(file) => file.read(buf) as i32,
            None => -1,
        }
    }

    /// 向句柄的游标处写入，返回写入的字节数，句柄非法返回 -1
    pub fn sys_write(&mut self, buf: &[u8], id: i32) -> i32 {
        match self.open_files.get_mut(id) {
            Some(file) => file.write(buf) as i32,
            None => -1,
        }
    }

    /// 关闭句柄，成功返回 1，句柄非法返回 0
    pub fn sys_close(&mut self, id: i32) -> i32 {
        match usize::try_from(id)
            .ok()
            .and_then(|id| self.open_files.slots.get_mut(id))
        {
            Some(slot) if slot.is_some() => {
                *slot = None;
                1
            }
            _ => 0,
        }
    }
}
