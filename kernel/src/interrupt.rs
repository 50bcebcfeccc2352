//! 中断模拟。
//!
//! 单处理器上，调度器数据结构的互斥靠屏蔽中断获得：
//! 每个调度操作都要求中断已关闭，违反即断言失败。
//! 抢占以"中断返回时让出"的一次性挂起位表达。

use core::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntStatus {
    Off,
    On,
}

#[derive(Debug)]
pub struct Interrupt {
    level: IntStatus,
    yield_on_return: bool,
}

impl Interrupt {
    pub const fn new() -> Self {
        Self {
            level: IntStatus::On,
            yield_on_return: false,
        }
    }

    /// 切换中断屏蔽级别，返回先前的级别
    pub fn set_level(&mut self, level: IntStatus) -> IntStatus {
        mem::replace(&mut self.level, level)
    }

    #[inline]
    pub fn level(&self) -> IntStatus {
        self.level
    }

    #[inline]
    pub fn is_off(&self) -> bool {
        self.level == IntStatus::Off
    }

    /// 请求在中断返回时让出处理器
    pub fn yield_on_return(&mut self) {
        assert!(self.is_off());
        self.yield_on_return = true;
    }

    /// 取走挂起的让出请求
    pub fn take_yield_request(&mut self) -> bool {
        mem::take(&mut self.yield_on_return)
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
