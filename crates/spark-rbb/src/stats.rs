use core::sync::atomic::{AtomicUsize, Ordering};

/// 环形块缓冲的统计快照。
///
/// # 契约说明（What）
/// - 容量类字段（`used_bytes`、各状态块数、`max_alloc_len` 等）在同一次临界区内采集，彼此一致；
/// - 计数类字段（`allocations`、`alloc_failures` 等）来自宽松原子计数，单调递增，
///   与容量类字段之间不保证同一时刻；
/// - 恒有 `used_bytes <= capacity`，`pending_blocks == inited_blocks + put_blocks + got_blocks`。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RbbStats {
    pub capacity: usize,
    pub used_bytes: usize,
    pub max_alloc_len: usize,
    pub pending_blocks: usize,
    pub inited_blocks: usize,
    pub put_blocks: usize,
    pub got_blocks: usize,
    pub free_descriptors: usize,
    pub allocations: usize,
    pub alloc_failures: usize,
    pub empty_gets: usize,
    pub queue_failures: usize,
}

/// 运行期计数器，在临界区外以 `Relaxed` 更新。
#[derive(Default)]
pub(crate) struct RbbMetrics {
    allocations: AtomicUsize,
    alloc_failures: AtomicUsize,
    empty_gets: AtomicUsize,
    queue_failures: AtomicUsize,
}

impl RbbMetrics {
    #[inline]
    pub(crate) fn record_allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_alloc_failure(&self) {
        self.alloc_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_empty_get(&self) {
        self.empty_gets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_queue_failure(&self) {
        self.queue_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 将计数器写入快照。
    pub(crate) fn fill(&self, stats: &mut RbbStats) {
        stats.allocations = self.allocations.load(Ordering::Relaxed);
        stats.alloc_failures = self.alloc_failures.load(Ordering::Relaxed);
        stats.empty_gets = self.empty_gets.load(Ordering::Relaxed);
        stats.queue_failures = self.queue_failures.load(Ordering::Relaxed);
    }
}
