//! 线程控制块

use alloc::string::String;

use spin::{Mutex, MutexGuard};

use crate::context::{ThreadContext, UserState};
use crate::scheduler::Layer;
use crate::PRIORITY_MAX;

pub struct Thread {
    // immutable
    id: usize,
    name: String,
    // mutable
    inner: Mutex<ThreadInner>,
}

pub struct ThreadInner {
    pub status: ThreadStatus,
    pub(crate) priority: u32,
    /// 近似突发时间：最近几次 CPU 突发的指数平均，L1 的 SJF 键
    pub(crate) approximate_burst_time: f64,
    /// 上一次等待计时的起点
    pub(crate) aging_initial_tick: usize,
    /// 累积的等待 tick
    pub(crate) total_age_tick: usize,
    /// 本次获得处理器的时刻
    pub(crate) run_initial_tick: usize,
    pub context: ThreadContext,
    pub user: Option<UserState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    JustCreated,
    Ready,
    Running,
    Blocked,
    Zombie,
}

impl Thread {
    pub fn new(id: usize, name: &str, priority: u32) -> Self {
        assert!(priority <= PRIORITY_MAX);
        Self {
            id,
            name: String::from(name),
            inner: Mutex::new(ThreadInner {
                status: ThreadStatus::JustCreated,
                priority,
                approximate_burst_time: 0.0,
                aging_initial_tick: 0,
                total_age_tick: 0,
                run_initial_tick: 0,
                context: ThreadContext::empty(),
                user: None,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> MutexGuard<'_, ThreadInner> {
        self.inner.lock()
    }

    pub fn status(&self) -> ThreadStatus {
        self.inner().status
    }

    pub fn priority(&self) -> u32 {
        self.inner().priority
    }

    pub fn approximate_burst_time(&self) -> f64 {
        self.inner().approximate_burst_time
    }

    pub fn total_age_tick(&self) -> usize {
        self.inner().total_age_tick
    }

    pub fn layer(&self) -> Layer {
        self.inner().layer()
    }

    /// 播种突发时间估计，供尚无执行历史的线程使用
    pub fn set_burst_estimate(&self, estimate: f64) {
        self.inner().approximate_burst_time = estimate;
    }

    /// 把线程标记为用户线程，切换时保存与恢复其用户态寄存器
    pub fn set_user_state(&self, user: UserState) {
        self.inner().user = Some(user);
    }
}

impl ThreadInner {
    /// 由当前优先级导出所属的队列层级
    #[inline]
    pub fn layer(&self) -> Layer {
        Layer::of_priority(self.priority)
    }

    /// 把自上个计时起点以来的等待时间计入累积年龄
    pub fn update_total_age(&mut self, now: usize) {
        self.total_age_tick += now - self.aging_initial_tick;
        self.aging_initial_tick = now;
    }

    /// 一次 CPU 突发结束，更新指数平均估计
    pub fn finish_burst(&mut self, now: usize) {
        let last_burst = (now - self.run_initial_tick) as f64;
        self.approximate_burst_time = 0.5 * last_burst + 0.5 * self.approximate_burst_time;
    }
}
