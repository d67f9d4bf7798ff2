//! 临界区能力：环形块缓冲唯一依赖的同步原语。
//!
//! # 模块定位（Why）
//! - 环形块缓冲需要在中断上下文（DMA 完成中断中 `alloc`/`put`）与任务上下文（消费者 `get`/`free`）
//!   之间共享待处理链表，却不能依赖调度器级别的阻塞原语；
//! - 因此同步能力以注入方式提供：MCU 上屏蔽中断、通用操作系统上自旋锁、单线程协作式调度下什么也不做。
//!
//! # 设计概要（How）
//! - [`CriticalSection`] 以“进入返回令牌、退出归还令牌”的形式建模，与硬件的
//!   “关中断返回旧状态 / 恢复旧状态”一一对应；
//! - [`CriticalSection::with`] 用 RAII 守卫包裹闭包，保证即使闭包 unwind 也会调用 `exit`。

use core::{cell::Cell, marker::PhantomData};

/// 注入式临界区。
///
/// # Safety
/// - 若实现类型满足 `Sync`，则同一实例上任意两个 `enter..exit` 窗口必须互斥；
///   环形块缓冲依赖这一点把内部可变状态暴露为 `&mut`。
/// - 非 `Sync` 的实现只会在单线程内被调用，可以是空操作。
/// - `exit` 只会以同一实例 `enter` 返回的令牌调用，且调用顺序与进入顺序严格嵌套。
pub unsafe trait CriticalSection {
    /// 进入临界区时得到的恢复令牌。
    type Token<'a>
    where
        Self: 'a;

    /// 进入临界区。
    fn enter(&self) -> Self::Token<'_>;

    /// 以进入时的令牌退出临界区。
    fn exit<'a>(&'a self, token: Self::Token<'a>);

    /// 在临界区内执行闭包，返回闭包结果。
    #[inline]
    fn with<R>(&self, f: impl FnOnce() -> R) -> R
    where
        Self: Sized,
    {
        let _guard = CriticalGuard::enter(self);
        f()
    }
}

/// 持有令牌的 RAII 守卫，`Drop` 时退出临界区。
pub(crate) struct CriticalGuard<'a, C: CriticalSection + 'a> {
    section: &'a C,
    token: Option<C::Token<'a>>,
}

impl<'a, C: CriticalSection + 'a> CriticalGuard<'a, C> {
    #[inline]
    pub(crate) fn enter(section: &'a C) -> Self {
        let token = section.enter();
        Self {
            section,
            token: Some(token),
        }
    }
}

impl<'a, C: CriticalSection + 'a> Drop for CriticalGuard<'a, C> {
    #[inline]
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.section.exit(token);
        }
    }
}

/// 基于 `spin::Mutex` 的临界区，默认实现。
///
/// 适用于多线程宿主与 `no_std` 多核场景；不屏蔽中断，因此若生产者运行在中断上下文，
/// 应改用 `InterruptCritical`，否则中断抢占持锁任务时会自旋死锁。
#[derive(Default)]
pub struct SpinCritical {
    lock: spin::Mutex<()>,
}

impl SpinCritical {
    pub const fn new() -> Self {
        Self {
            lock: spin::Mutex::new(()),
        }
    }
}

// SAFETY: `spin::Mutex` 保证同一时刻至多一个守卫存活。
unsafe impl CriticalSection for SpinCritical {
    type Token<'a> = spin::MutexGuard<'a, ()>;

    #[inline]
    fn enter(&self) -> Self::Token<'_> {
        self.lock.lock()
    }

    #[inline]
    fn exit<'a>(&'a self, token: Self::Token<'a>) {
        drop(token);
    }
}

/// 单线程协作式调度使用的空临界区。
///
/// 类型本身 `Send + !Sync`：持有它的环形块缓冲可以整体移交给另一线程，
/// 但无法被多个线程同时引用，从类型层面排除了无锁并发访问。
#[derive(Default)]
pub struct Cooperative {
    _not_sync: PhantomData<Cell<()>>,
}

impl Cooperative {
    pub const fn new() -> Self {
        Self {
            _not_sync: PhantomData,
        }
    }
}

// SAFETY: 类型非 `Sync`，所有调用都来自同一线程，无需互斥。
unsafe impl CriticalSection for Cooperative {
    type Token<'a> = ();

    #[inline]
    fn enter(&self) -> Self::Token<'_> {}

    #[inline]
    fn exit<'a>(&'a self, _token: Self::Token<'a>) {}
}

/// 通过 `critical-section` crate 屏蔽中断（单核）或获取全局锁（多核）的临界区。
///
/// 具体实现由目标平台的 `critical_section::set_impl!` 提供。
#[cfg(feature = "critical-section")]
#[derive(Clone, Copy, Debug, Default)]
pub struct InterruptCritical;

// SAFETY: `critical_section::acquire` 提供进程级互斥；令牌按嵌套顺序交还 `release`。
#[cfg(feature = "critical-section")]
unsafe impl CriticalSection for InterruptCritical {
    type Token<'a> = critical_section::RestoreState;

    #[inline]
    fn enter(&self) -> Self::Token<'_> {
        // SAFETY: 返回的状态仅由配对的 `exit` 消耗一次。
        unsafe { critical_section::acquire() }
    }

    #[inline]
    fn exit<'a>(&'a self, token: Self::Token<'a>) {
        // SAFETY: `token` 来自同一实例最近一次未退出的 `enter`。
        unsafe { critical_section::release(token) }
    }
}
