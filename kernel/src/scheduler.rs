//! 预备线程调度器。
//!
//! 就绪线程按优先级分住三条队列：
//! L1(优先级 100 以上)按近似突发时间做抢占式 SJF，
//! L2(50 到 99)按优先级非抢占调度，
//! L3(其余)轮转。长等的线程由周期性老化逐级上移，避免饿死。
//!
//! 所有操作都要求中断已关闭。

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::fmt;

use log::debug;

use crate::interrupt::Interrupt;
use crate::thread::{Thread, ThreadStatus};
use crate::{AGING_BOOST, AGING_THRESHOLD, PRIORITY_MAX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    L1,
    L2,
    L3,
}

pub struct Scheduler {
    l1: VecDeque<Arc<Thread>>,
    l2: VecDeque<Arc<Thread>>,
    l3: VecDeque<Arc<Thread>>,
    /// 至多一个等待回收的僵尸线程，下次切换时释放
    to_be_destroyed: Option<Arc<Thread>>,
}

impl Layer {
    pub fn of_priority(priority: u32) -> Self {
        assert!(priority <= PRIORITY_MAX);
        match priority {
            100.. => Self::L1,
            50..=99 => Self::L2,
            _ => Self::L3,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L1 => write!(f, "L1"),
            Self::L2 => write!(f, "L2"),
            Self::L3 => write!(f, "L3"),
        }
    }
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            l1: VecDeque::new(),
            l2: VecDeque::new(),
            l3: VecDeque::new(),
            to_be_destroyed: None,
        }
    }

    /// 把线程标记为就绪并放进其优先级对应队列的尾部
    pub fn ready_to_run(&mut self, interrupt: &Interrupt, thread: Arc<Thread>, now: usize) -> Layer {
        assert!(interrupt.is_off());

        let layer = {
            let mut inner = thread.inner();
            inner.status = ThreadStatus::Ready;
            inner.aging_initial_tick = now;
            inner.layer()
        };

        debug!(
            target: "thread",
            "tick {now}: thread {} inserted into queue {layer}",
            thread.id()
        );
        self.queue_mut(layer).push_back(thread);

        layer
    }

    /// 从最高的非空队列中选出下一个线程并出队。
    /// L1 取近似突发时间最小者，L2 取优先级最高者，L3 取队首；
    /// 平手都按入队先后裁决。
    pub fn find_next_to_run(&mut self, interrupt: &Interrupt, now: usize) -> Option<Arc<Thread>> {
        assert!(interrupt.is_off());

        let (layer, index) = if !self.l1.is_empty() {
            let index = self
                .l1
                .iter()
                .enumerate()
                .map(|(index, thread)| (index, thread.approximate_burst_time()))
                .reduce(|best, cand| if cand.1 < best.1 { cand } else { best })?
                .0;
            (Layer::L1, index)
        } else if !self.l2.is_empty() {
            let index = self
                .l2
                .iter()
                .enumerate()
                .map(|(index, thread)| (index, thread.priority()))
                .reduce(|best, cand| if cand.1 > best.1 { cand } else { best })?
                .0;
            (Layer::L2, index)
        } else if !self.l3.is_empty() {
            (Layer::L3, 0)
        } else {
            return None;
        };

        let thread = self.queue_mut(layer).remove(index)?;
        thread.inner().update_total_age(now);
        debug!(
            target: "thread",
            "tick {now}: thread {} removed from queue {layer}",
            thread.id()
        );

        Some(thread)
    }

    /// L1 有新线程进入时的抢占检查：
    /// 在跑的线程不在 L1，或其突发时间估计大于新线程的，就该让出
    pub fn check_preempt(current: &Arc<Thread>, newcomer: &Arc<Thread>) -> bool {
        match current.layer() {
            Layer::L1 => newcomer.approximate_burst_time() < current.approximate_burst_time(),
            Layer::L2 | Layer::L3 => true,
        }
    }

    /// 周期性老化：累计每个就绪线程的等待时间，
    /// 累积到阈值就提升优先级，并按需在队列间迁移。
    pub fn age_all(&mut self, interrupt: &Interrupt, now: usize) {
        assert!(interrupt.is_off());

        for layer in [Layer::L1, Layer::L2, Layer::L3] {
            let mut index = 0;
            while index < self.queue(layer).len() {
                let thread = self.queue(layer)[index].clone();
                let promotion = {
                    let mut inner = thread.inner();
                    inner.update_total_age(now);

                    if inner.total_age_tick >= AGING_THRESHOLD && inner.priority < PRIORITY_MAX {
                        let from = inner.priority;
                        inner.total_age_tick -= AGING_THRESHOLD;
                        inner.priority = (inner.priority + AGING_BOOST).min(PRIORITY_MAX);
                        debug!(
                            target: "thread",
                            "tick {now}: thread {} priority {from} -> {}",
                            thread.id(),
                            inner.priority
                        );
                        let to = inner.layer();
                        (to != layer).then_some(to)
                    } else {
                        None
                    }
                };

                if let Some(to) = promotion {
                    self.queue_mut(layer).remove(index);
                    debug!(
                        target: "thread",
                        "tick {now}: thread {} migrated from {layer} to {to}",
                        thread.id()
                    );
                    self.queue_mut(to).push_back(thread);
                    // 原位置由后继元素补上，index 原地不动
                } else {
                    index += 1;
                }
            }
        }
    }

    /// 寄存一个等待回收的僵尸线程
    pub fn park_finished(&mut self, thread: Arc<Thread>) {
        assert!(self.to_be_destroyed.is_none());
        assert_eq!(thread.status(), ThreadStatus::Zombie);
        self.to_be_destroyed = Some(thread);
    }

    /// 取走待回收的僵尸线程
    pub fn take_finished(&mut self) -> Option<Arc<Thread>> {
        self.to_be_destroyed.take()
    }

    /// 线程当前所在的队列，不在任何队列时返回空
    pub fn queued_layer(&self, thread: &Arc<Thread>) -> Option<Layer> {
        [Layer::L1, Layer::L2, Layer::L3].into_iter().find(|&layer| {
            self.queue(layer)
                .iter()
                .any(|queued| Arc::ptr_eq(queued, thread))
        })
    }

    pub fn queue_len(&self, layer: Layer) -> usize {
        self.queue(layer).len()
    }

    pub fn is_idle(&self) -> bool {
        self.l1.is_empty() && self.l2.is_empty() && self.l3.is_empty()
    }
}

impl Scheduler {
    fn queue(&self, layer: Layer) -> &VecDeque<Arc<Thread>> {
        match layer {
            Layer::L1 => &self.l1,
            Layer::L2 => &self.l2,
            Layer::L3 => &self.l3,
        }
    }

    fn queue_mut(&mut self, layer: Layer) -> &mut VecDeque<Arc<Thread>> {
        match layer {
            Layer::L1 => &mut self.l1,
            Layer::L2 => &mut self.l2,
            Layer::L3 => &mut self.l3,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
