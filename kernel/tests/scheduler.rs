use std::sync::Arc;

use kernel::{Kernel, Layer, Thread, ThreadStatus, UserState};
use kernel::{AGING_THRESHOLD, PRIORITY_MAX, TIMER_TICKS};

fn tick(kernel: &mut Kernel, ticks: usize) {
    for _ in 0..ticks {
        kernel.one_tick(false);
    }
}

#[test]
fn fresh_thread_is_just_created() {
    let thread = Thread::new(0, "fresh", 10);
    assert_eq!(thread.status(), ThreadStatus::JustCreated);
    assert_eq!(thread.layer(), Layer::L3);
}

#[test]
fn ready_threads_land_in_their_priority_band() {
    let mut kernel = Kernel::new();
    let high = kernel.spawn("high", 120);
    let mid = kernel.spawn("mid", 70);
    let low = kernel.spawn("low", 10);

    assert_eq!(kernel.scheduler.queued_layer(&high), Some(Layer::L1));
    assert_eq!(kernel.scheduler.queued_layer(&mid), Some(Layer::L2));
    assert_eq!(kernel.scheduler.queued_layer(&low), Some(Layer::L3));
    assert_eq!(high.status(), ThreadStatus::Ready);
}

#[test]
fn l1_dispatches_shortest_burst_first() {
    let mut kernel = Kernel::new();
    let a = kernel.spawn("a", 120);
    a.set_burst_estimate(50.0);
    let b = kernel.spawn("b", 110);
    b.set_burst_estimate(20.0);

    let running = kernel.dispatch().unwrap();
    assert!(Arc::ptr_eq(&running, &b));
    assert_eq!(b.status(), ThreadStatus::Running);
    // 在跑的线程不在任何队列里
    assert_eq!(kernel.scheduler.queued_layer(&b), None);
    assert_eq!(kernel.scheduler.queued_layer(&a), Some(Layer::L1));
}

#[test]
fn l2_dispatches_highest_priority_first() {
    let mut kernel = Kernel::new();
    let lo = kernel.spawn("lo", 60);
    let hi = kernel.spawn("hi", 90);
    let tied = kernel.spawn("tied", 90);

    let first = kernel.dispatch().unwrap();
    assert!(Arc::ptr_eq(&first, &hi));

    // 平手按入队先后
    kernel.finish_current();
    let second = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&second, &tied));

    kernel.finish_current();
    let third = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&third, &lo));
}

#[test]
fn l3_round_robin_quantum() {
    let mut kernel = Kernel::new();
    let a = kernel.spawn("a", 10);
    let b = kernel.spawn("b", 10);

    let first = kernel.dispatch().unwrap();
    assert!(Arc::ptr_eq(&first, &a));

    // 时间片耗尽后轮转到队首的 b
    tick(&mut kernel, TIMER_TICKS);
    let running = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&running, &b));
    assert_eq!(kernel.scheduler.queued_layer(&a), Some(Layer::L3));

    tick(&mut kernel, TIMER_TICKS);
    let running = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&running, &a));
}

// 调度场景：L1 内按突发时间抢占
#[test]
fn shorter_burst_preempts_running_thread() {
    let mut kernel = Kernel::new();
    let a = kernel.spawn("a", 120);
    a.set_burst_estimate(50.0);
    let b = kernel.spawn("b", 110);
    b.set_burst_estimate(20.0);

    let running = kernel.dispatch().unwrap();
    assert!(Arc::ptr_eq(&running, &b));

    tick(&mut kernel, 3);

    // b 在跑时放入更短的 c，下一次中断返回时让位
    let c = kernel.spawn("c", 130);
    c.set_burst_estimate(10.0);
    kernel.one_tick(false);

    let running = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&running, &c));

    kernel.finish_current();
    let running = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&running, &b));

    kernel.finish_current();
    let running = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&running, &a));
}

// 调度场景：长等线程经老化一路升入 L1
#[test]
fn starving_thread_ages_into_l1() {
    let mut kernel = Kernel::new();
    let d = kernel.spawn("d", 45);
    assert_eq!(kernel.scheduler.queued_layer(&d), Some(Layer::L3));

    tick(&mut kernel, 15_000);

    assert_eq!(d.priority(), 145);
    assert_eq!(kernel.scheduler.queued_layer(&d), Some(Layer::L1));
    assert!(d.total_age_tick() < AGING_THRESHOLD);
}

#[test]
fn aging_clamps_at_priority_ceiling() {
    let mut kernel = Kernel::new();
    let d = kernel.spawn("d", 45);

    // (149 - 45) / 10 次提升之后到顶，之后不再变
    tick(&mut kernel, 30_000);

    assert_eq!(d.priority(), PRIORITY_MAX);
    assert_eq!(kernel.scheduler.queued_layer(&d), Some(Layer::L1));
}

#[test]
fn burst_estimate_is_an_exponential_average() {
    let mut kernel = Kernel::new();
    let a = kernel.spawn("a", 120);
    a.set_burst_estimate(40.0);
    let b = kernel.spawn("b", 120);
    b.set_burst_estimate(90.0);

    let running = kernel.dispatch().unwrap();
    assert!(Arc::ptr_eq(&running, &a));

    // a 跑了 20 tick 后让出：估计值折半混合
    tick(&mut kernel, 20);
    kernel.yield_current();

    assert_eq!(a.approximate_burst_time(), 0.5 * 20.0 + 0.5 * 40.0);
    assert_eq!(a.status(), ThreadStatus::Ready);
}

#[test]
fn blocked_thread_wakes_into_ready_queue() {
    let mut kernel = Kernel::new();
    let a = kernel.spawn("a", 120);
    let b = kernel.spawn("b", 120);
    a.set_burst_estimate(1.0);
    b.set_burst_estimate(2.0);

    let running = kernel.dispatch().unwrap();
    assert!(Arc::ptr_eq(&running, &a));

    kernel.block_current();
    assert_eq!(a.status(), ThreadStatus::Blocked);
    assert_eq!(kernel.scheduler.queued_layer(&a), None);
    let running = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&running, &b));

    kernel.wake(a.clone());
    assert_eq!(a.status(), ThreadStatus::Ready);
    assert_eq!(kernel.scheduler.queued_layer(&a), Some(Layer::L1));
}

#[test]
fn finished_thread_is_reclaimed_on_next_dispatch() {
    let mut kernel = Kernel::new();
    let a = kernel.spawn("a", 120);
    let b = kernel.spawn("b", 120);
    a.set_burst_estimate(1.0);
    b.set_burst_estimate(2.0);

    kernel.dispatch().unwrap();
    kernel.finish_current();

    // a 成为僵尸，等待下一次切换回收
    assert_eq!(a.status(), ThreadStatus::Zombie);
    let running = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&running, &b));

    kernel.finish_current();
    assert_eq!(b.status(), ThreadStatus::Zombie);
    assert!(kernel.current_thread().is_none());
    assert!(kernel.scheduler.is_idle());
}

#[test]
fn user_state_follows_context_switch() {
    let mut kernel = Kernel::new();
    let a = kernel.spawn("a", 120);
    a.set_user_state(UserState::new());
    a.set_burst_estimate(1.0);
    let b = kernel.spawn("b", 120);
    b.set_burst_estimate(9.0);

    let running = kernel.dispatch().unwrap();
    assert!(Arc::ptr_eq(&running, &a));

    // 用户程序改写了寄存器，切换时应随线程保存
    kernel.machine.user_registers[0] = 42;
    kernel.yield_current();
    let running = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&running, &b));
    assert_eq!(a.inner().user.unwrap().registers[0], 42);

    // b 不是用户线程，寄存器组不归它管
    kernel.machine.user_registers[0] = 7;
    kernel.yield_current();
    let running = kernel.current_thread().unwrap();
    assert!(Arc::ptr_eq(&running, &a));
    assert_eq!(kernel.machine.user_registers[0], 42);
}

#[test]
fn idle_processor_counts_idle_ticks() {
    let mut kernel = Kernel::new();
    tick(&mut kernel, 7);
    assert_eq!(kernel.stats.total_ticks, 7);
    assert_eq!(kernel.stats.idle_ticks, 7);
}
