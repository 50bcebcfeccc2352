//! 内核句柄。
//!
//! 中断状态、时钟、调度器、当前线程、文件系统与打开文件表
//! 集中在一个显式传递的结构里，逐层穿过各个子系统。

use alloc::sync::Arc;

use log::debug;
use tree_fs::FileSystem;

use crate::context::Machine;
use crate::interrupt::{IntStatus, Interrupt};
use crate::scheduler::{Layer, Scheduler};
use crate::stats::Statistics;
use crate::syscall::OpenFileTable;
use crate::thread::{Thread, ThreadStatus};
use crate::{RR_QUANTUM, TIMER_TICKS};

pub struct Kernel {
    pub interrupt: Interrupt,
    pub stats: Statistics,
    pub scheduler: Scheduler,
    pub machine: Machine,
    current: Option<Arc<Thread>>,
    pub(crate) file_system: Option<FileSystem>,
    pub(crate) open_files: OpenFileTable,
    pub(crate) halted: bool,
    next_tid: usize,
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            interrupt: Interrupt::new(),
            stats: Statistics::new(),
            scheduler: Scheduler::new(),
            machine: Machine::new(),
            current: None,
            file_system: None,
            open_files: OpenFileTable::new(),
            halted: false,
            next_tid: 0,
        }
    }

    /// 挂载文件系统，系统调用面自此可用
    pub fn mount(&mut self, file_system: FileSystem) {
        self.file_system = Some(file_system);
    }

    pub fn file_system(&self) -> Option<&FileSystem> {
        self.file_system.as_ref()
    }

    pub fn current_thread(&self) -> Option<Arc<Thread>> {
        self.current.clone()
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    /// 创建新线程并使之就绪
    pub fn spawn(&mut self, name: &str, priority: u32) -> Arc<Thread> {
        let thread = Arc::new(Thread::new(self.alloc_tid(), name, priority));
        self.ready_to_run(thread.clone());
        thread
    }

    /// 线程进入就绪队列。
    /// 插入 L1 会对在跑的线程做抢占检查，命中则请求中断返回时让出。
    pub fn ready_to_run(&mut self, thread: Arc<Thread>) {
        let old_level = self.interrupt.set_level(IntStatus::Off);
        let now = self.stats.total_ticks;

        let layer = self.scheduler.ready_to_run(&self.interrupt, thread.clone(), now);

        if layer == Layer::L1 {
            if let Some(current) = &self.current {
                if !Arc::ptr_eq(current, &thread) && Scheduler::check_preempt(current, &thread) {
                    debug!(
                        target: "thread",
                        "tick {now}: thread {} preempts thread {}",
                        thread.id(),
                        current.id()
                    );
                    self.interrupt.yield_on_return();
                }
            }
        }

        self.interrupt.set_level(old_level);
    }

    /// 把处理器交给 `next`。
    ///
    /// 调用者负责把 `next` 移出就绪队列并置为 Running。
    /// 这里先回收上次切换遗留的僵尸线程，再保存出让线程的状态，
    /// `finishing` 置位时将其寄存为僵尸，最后装载 `next` 的上下文。
    pub fn run(&mut self, next: Arc<Thread>, finishing: bool) {
        assert!(self.interrupt.is_off());
        assert_eq!(next.status(), ThreadStatus::Running);

        if let Some(zombie) = self.scheduler.take_finished() {
            debug!(target: "thread", "reclaiming zombie thread {}", zombie.id());
        }

        if let Some(old) = self.current.take() {
            {
                let mut inner = old.inner();
                inner.context = self.machine.context;
                if let Some(user) = inner.user.as_mut() {
                    user.registers = self.machine.user_registers;
                }
                if finishing {
                    inner.status = ThreadStatus::Zombie;
                }
            }
            if finishing {
                self.scheduler.park_finished(old);
            }
        }

        {
            let mut inner = next.inner();
            inner.run_initial_tick = self.stats.total_ticks;
            self.machine.context = inner.context;
            if let Some(user) = inner.user.as_ref() {
                self.machine.user_registers = user.registers;
            }
        }

        debug!(
            target: "thread",
            "tick {}: thread {} selected for execution",
            self.stats.total_ticks,
            next.id()
        );
        self.current = Some(next);
    }

    /// 当前线程主动让出处理器，回到就绪队列尾部
    pub fn yield_current(&mut self) {
        let old_level = self.interrupt.set_level(IntStatus::Off);
        let current = self.current.clone().expect("no running thread to yield");
        let now = self.stats.total_ticks;

        if let Some(next) = self.scheduler.find_next_to_run(&self.interrupt, now) {
            current.inner().finish_burst(now);
            self.ready_to_run(current);
            next.inner().status = ThreadStatus::Running;
            self.run(next, false);
        }

        self.interrupt.set_level(old_level);
    }

    /// 当前线程阻塞，等待他人唤醒
    pub fn block_current(&mut self) {
        let old_level = self.interrupt.set_level(IntStatus::Off);
        let current = self.current.clone().expect("no running thread to block");
        let now = self.stats.total_ticks;

        {
            let mut inner = current.inner();
            inner.finish_burst(now);
            inner.status = ThreadStatus::Blocked;
        }

        if let Some(next) = self.scheduler.find_next_to_run(&self.interrupt, now) {
            next.inner().status = ThreadStatus::Running;
            self.run(next, false);
        } else {
            // 无事可做，处理器空转等待唤醒
            let idle = self.current.take().expect("current thread vanished");
            let mut inner = idle.inner();
            inner.context = self.machine.context;
            if let Some(user) = inner.user.as_mut() {
                user.registers = self.machine.user_registers;
            }
            debug!(target: "thread", "tick {now}: processor idles");
        }

        self.interrupt.set_level(old_level);
    }

    /// 唤醒阻塞中的线程
    pub fn wake(&mut self, thread: Arc<Thread>) {
        assert_eq!(thread.status(), ThreadStatus::Blocked);
        self.ready_to_run(thread);
    }

    /// 当前线程结束。真正的释放推迟到下一次切换。
    pub fn finish_current(&mut self) {
        let old_level = self.interrupt.set_level(IntStatus::Off);
        let current = self.current.clone().expect("no running thread to finish");
        let now = self.stats.total_ticks;
        debug!(target: "thread", "tick {now}: thread {} finishing", current.id());

        current.inner().finish_burst(now);

        if let Some(next) = self.scheduler.find_next_to_run(&self.interrupt, now) {
            next.inner().status = ThreadStatus::Running;
            self.run(next, true);
        } else {
            if let Some(zombie) = self.scheduler.take_finished() {
                debug!(target: "thread", "reclaiming zombie thread {}", zombie.id());
            }
            let finished = self.current.take().expect("current thread vanished");
            finished.inner().status = ThreadStatus::Zombie;
            self.scheduler.park_finished(finished);
        }

        self.interrupt.set_level(old_level);
    }

    /// 处理器空闲时挑选下一个线程，返回随后在跑的线程
    pub fn dispatch(&mut self) -> Option<Arc<Thread>> {
        let old_level = self.interrupt.set_level(IntStatus::Off);

        if self.current.is_none() {
            if let Some(next) = self.scheduler.find_next_to_run(&self.interrupt, self.stats.total_ticks)
            {
                next.inner().status = ThreadStatus::Running;
                self.run(next, false);
            }
        }

        self.interrupt.set_level(old_level);
        self.current.clone()
    }

    /// 模拟时间前进一个 tick。
    /// 到达定时器间隔就执行老化与 L3 时间片检查；
    /// 中断重新打开时兑现挂起的让出请求。
    pub fn one_tick(&mut self, user_mode: bool) {
        if self.current.is_some() {
            self.stats.advance(1, user_mode);
        } else {
            self.stats.advance_idle(1);
        }
        let now = self.stats.total_ticks;

        if now % TIMER_TICKS == 0 {
            let old_level = self.interrupt.set_level(IntStatus::Off);
            self.scheduler.age_all(&self.interrupt, now);

            if let Some(current) = &self.current {
                let expired = {
                    let inner = current.inner();
                    inner.layer() == Layer::L3 && now - inner.run_initial_tick >= RR_QUANTUM
                };
                if expired {
                    debug!(
                        target: "thread",
                        "tick {now}: thread {} exhausted its quantum",
                        current.id()
                    );
                    self.interrupt.yield_on_return();
                }
            }

            self.interrupt.set_level(old_level);
        }

        if self.interrupt.take_yield_request() && self.current.is_some() {
            self.yield_current();
        }
    }

    fn alloc_tid(&mut self) -> usize {
        let tid = self.next_tid;
        self.next_tid += 1;
        tid
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
