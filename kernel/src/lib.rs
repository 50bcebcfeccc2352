//! 模拟单处理器上的内核核心：时钟、中断屏蔽、线程控制块、
//! 三级反馈队列调度器与系统调用面。

#![no_std]

extern crate alloc;

mod context;
mod interrupt;
mod kernel;
mod scheduler;
mod stats;
mod syscall;
mod thread;

pub use context::{Machine, ThreadContext, UserState, NUM_USER_REGS};
pub use interrupt::{IntStatus, Interrupt};
pub use kernel::Kernel;
pub use scheduler::{Layer, Scheduler};
pub use stats::Statistics;
pub use syscall::{Console, OPEN_FILE_TABLE_LEN};
pub use thread::{Thread, ThreadStatus};

/// 定时器间隔(tick)，到点触发老化与时间片检查
pub const TIMER_TICKS: usize = 100;
/// L3 轮转时间片(tick)
pub const RR_QUANTUM: usize = 100;
/// 累积等待达到该值就提升一次优先级
pub const AGING_THRESHOLD: usize = 1500;
/// 每次老化提升的优先级增量
pub const AGING_BOOST: u32 = 10;
/// 优先级上限
pub const PRIORITY_MAX: u32 = 149;
