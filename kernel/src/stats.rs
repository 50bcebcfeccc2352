//! 模拟时钟，内核全程共享的时间源

/// 各类 tick 的累计统计
#[derive(Debug, Default, Clone)]
pub struct Statistics {
    /// 开机以来经过的总 tick 数，只增不减
    pub total_ticks: usize,
    pub idle_ticks: usize,
    pub system_ticks: usize,
    pub user_ticks: usize,
}

impl Statistics {
    pub const fn new() -> Self {
        Self {
            total_ticks: 0,
            idle_ticks: 0,
            system_ticks: 0,
            user_ticks: 0,
        }
    }

    pub fn advance(&mut self, ticks: usize, user_mode: bool) {
        self.total_ticks += ticks;
        if user_mode {
            self.user_ticks += ticks;
        } else {
            self.system_ticks += ticks;
        }
    }

    pub fn advance_idle(&mut self, ticks: usize) {
        self.total_ticks += ticks;
        self.idle_ticks += ticks;
    }
}
