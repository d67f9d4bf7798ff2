use core::{fmt, marker::PhantomData, ptr};

use tracing::{debug, trace};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::{
    block::{BlockHandle, ReadBlock, WriteBlock},
    config::RbbConfig,
    critical::{CriticalGuard, CriticalSection, SpinCritical},
    error::RbbError,
    layout::{RingLayout, Span, align_up},
    pending::PendingList,
    queue::BlockQueue,
    slot::{BlockSlot, BlockStatus},
    stats::{RbbMetrics, RbbStats},
    storage::RawSlice,
};

/// `RingBlockBuffer` 是由变长块组成的环形缓冲，支持零拷贝的分配、发布、认领与乱序释放。
///
/// # 模块角色（Why）
/// - 作为 DMA 接收环、异步日志、压缩帧队列等流式设备缓冲的后备存储：
///   生产者与消费者速率不同，块长度可变且必须连续，释放顺序不受约束；
/// - 与字节环形缓冲不同，块在竞技场中原地写入、原地读取，全程无拷贝。
///
/// # 核心机制（How）
/// - 竞技场是一段固定长度的字节区，描述符池是固定容量的 [`BlockSlot`] 数组，二者均由调用方提供
///   （[`RingBlockBuffer::init`]）或在 `alloc` 下由本结构持有（`create`）；
/// - 处于 `Inited`/`Put`/`Got` 的块按分配顺序串在侵入式待处理链表上；
///   分配只看链表首尾两块，在尾块之后或回绕到基址处寻找足够的连续空间；
/// - 所有链表与状态的修改都在注入的 [`CriticalSection`] 内完成，日志在退出临界区后输出。
///
/// # 契约说明（What）
/// - **背压**：空间或描述符不足时 `alloc` 返回背压类错误，从不驱逐他人持有的块；
/// - **顺序**：`get` 总是返回链表中最旧的 `Put` 块，生产者按分配顺序发布时即为 FIFO；
/// - **独占**：句柄借用本结构，`WriteBlock`/`ReadBlock`/`BlockQueue` 各自独占其字节区间，
///   `put`/`free`/`Drop` 消耗句柄，重复认领与重复释放在类型层面不可表达；
/// - **容量**：任意时刻所有待处理块长度之和不超过 [`RingBlockBuffer::buffer_size`]。
///
/// # 设计权衡（Trade-offs）
/// - 链表中间因乱序释放产生的空洞不会立即复用，直到其之前的块全部释放；换来的是分配 O(描述符数)
///   且无需维护空闲区索引；
/// - 释放需要在单链表上查找前驱，复杂度与待处理块数成正比，与竞技场大小无关。
pub struct RingBlockBuffer<'a, C: CriticalSection = SpinCritical> {
    core: RbbCore<C>,
    _storage: PhantomData<&'a mut [u8]>,
}

impl<'a, C: CriticalSection> RingBlockBuffer<'a, C> {
    /// 以调用方提供的字节区与描述符数组初始化，不使用堆。
    ///
    /// 所有槽位会被复位为 [`crate::BlockStatus::Unused`]。空字节区或空描述符数组返回
    /// [`RbbError::InvalidConfig`]。
    pub fn init(
        buffer: &'a mut [u8],
        slots: &'a mut [BlockSlot],
        critical: C,
    ) -> Result<Self, RbbError> {
        Self::init_aligned(buffer, slots, 1, critical)
    }

    /// 同 [`RingBlockBuffer::init`]，并要求块长度与偏移按 `alignment` 对齐。
    ///
    /// `buffer` 的起始地址必须满足该对齐，否则返回 [`RbbError::InvalidConfig`]。
    pub fn init_aligned(
        buffer: &'a mut [u8],
        slots: &'a mut [BlockSlot],
        alignment: usize,
        critical: C,
    ) -> Result<Self, RbbError> {
        RbbConfig::new(buffer.len(), slots.len())
            .with_alignment(alignment)
            .validate()?;
        if (buffer.as_ptr() as usize) % alignment != 0 {
            return Err(RbbError::InvalidConfig {
                reason: "buffer base address is not aligned",
            });
        }
        slots.fill(BlockSlot::UNUSED);
        Ok(Self::from_parts(
            RawSlice::borrowed(buffer),
            RawSlice::borrowed(slots),
            alignment,
            critical,
        ))
    }

    fn from_parts(
        bytes: RawSlice<u8>,
        slots: RawSlice<BlockSlot>,
        alignment: usize,
        critical: C,
    ) -> Self {
        let layout = RingLayout::new(bytes.len());
        Self {
            core: RbbCore {
                bytes,
                slots,
                pending: PendingCell::new(PendingList::new()),
                layout,
                alignment,
                metrics: RbbMetrics::default(),
                critical,
            },
            _storage: PhantomData,
        }
    }

    /// 竞技场总容量（字节），初始化后不变。
    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.core.layout.capacity()
    }

    /// 描述符池容量。
    #[inline]
    pub fn max_blocks(&self) -> usize {
        self.core.slots.len()
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.core.alignment
    }

    /// 分配一个长度为 `size`（按对齐向上取整）的块，状态变为 `Inited`。
    ///
    /// # 契约说明
    /// - **前置条件**：`0 < size`，且对齐后不超过 [`RingBlockBuffer::buffer_size`]，否则返回
    ///   [`RbbError::InvalidBlockSize`]；
    /// - **背压**：没有空闲描述符时返回 [`RbbError::DescriptorsExhausted`]；
    ///   游标处与回绕后的基址处都放不下时返回 [`RbbError::NoSpace`]；
    /// - **后置条件**：返回的 [`WriteBlock`] 独占 `[offset, offset + len)`，调用方写入后 `put` 发布。
    pub fn alloc(&self, size: usize) -> Result<WriteBlock<'_, C>, RbbError> {
        let (index, span) = self.core.alloc(size)?;
        Ok(WriteBlock::new(&self.core, index, span))
    }

    /// 认领最旧的已发布块，状态 `Put -> Got`；没有已发布块时返回 `None`。
    pub fn get(&self) -> Option<ReadBlock<'_, C>> {
        let (index, span) = self.core.claim_oldest()?;
        Some(ReadBlock::new(&self.core, index, span))
    }

    /// 认领一组物理相邻的已发布块，总长至少为 `target_length`。
    ///
    /// # 实现策略
    /// 1. 从首个 `Put` 块开始只读扫描，累计物理相邻且同为 `Put` 的后继块，直到总长达到目标；
    /// 2. 未达到目标：不修改任何状态，返回 [`RbbError::InsufficientData`]，其中 `available`
    ///    即当前可组成的最大长度；
    /// 3. 达到目标：在同一临界区内把扫描到的块统一改为 `Got`。
    ///
    /// 扫描与提交分离，因此失败路径无需回滚记录。
    pub fn get_block_queue(&self, target_length: usize) -> Result<BlockQueue<'_, C>, RbbError> {
        let run = self.core.claim_run(target_length)?;
        Ok(BlockQueue::new(&self.core, run.first, run.count, run.span))
    }

    /// 释放块或块队列，状态回到 `Unused` 并离开待处理链表。
    ///
    /// 对未发布的 [`WriteBlock`] 调用即为生产者放弃。句柄属于其它环形块缓冲时返回
    /// [`RbbError::ForeignBlock`]，此时句柄仍会归还到它自己的缓冲。
    pub fn free<B: BlockHandle>(&self, block: B) -> Result<(), RbbError> {
        let owned = ptr::eq(block.owner(), self.core.addr());
        drop(block);
        if owned {
            Ok(())
        } else {
            Err(RbbError::ForeignBlock)
        }
    }

    /// 释放整个块队列，等价于 [`RingBlockBuffer::free`]。
    pub fn free_block_queue(&self, queue: BlockQueue<'_, C>) -> Result<(), RbbError> {
        self.free(queue)
    }

    /// 不认领任何块，返回下一次 `get_block_queue` 最多能得到的连续长度；无已发布块时为 0。
    pub fn next_block_queue_len(&self) -> usize {
        self.core.published_len()
    }

    /// 当前一次 `alloc` 能成功的最大长度（描述符充足的前提下）。
    pub fn max_alloc_len(&self) -> usize {
        self.core.max_alloc_len()
    }

    pub fn stats(&self) -> RbbStats {
        self.core.stats()
    }

    /// 销毁缓冲；堆分配的存储随之释放。句柄借用本结构，因此调用时不可能仍有块在外。
    pub fn destroy(self) {
        drop(self);
    }
}

#[cfg(feature = "alloc")]
impl RingBlockBuffer<'static, SpinCritical> {
    /// 在堆上创建 `buffer_size` 字节、`max_blocks` 个描述符的缓冲，使用默认自旋临界区。
    pub fn create(buffer_size: usize, max_blocks: usize) -> Result<Self, RbbError> {
        Self::create_with(&RbbConfig::new(buffer_size, max_blocks), SpinCritical::new())
    }
}

#[cfg(feature = "alloc")]
impl<C: CriticalSection> RingBlockBuffer<'static, C> {
    /// 按配置在堆上创建缓冲。
    ///
    /// 字节区按 `alignment` 分配并清零；任一分配失败都返回 [`RbbError::OutOfMemory`]，
    /// 已分配的部分随错误路径释放。
    pub fn create_with(config: &RbbConfig, critical: C) -> Result<Self, RbbError> {
        config.validate()?;
        let bytes = RawSlice::allocate_zeroed(config.buffer_size, config.alignment).ok_or(
            RbbError::OutOfMemory {
                bytes: config.buffer_size,
            },
        )?;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(config.max_blocks)
            .map_err(|_| RbbError::OutOfMemory {
                bytes: config.max_blocks.saturating_mul(size_of::<BlockSlot>()),
            })?;
        slots.resize(config.max_blocks, BlockSlot::UNUSED);

        Ok(Self::from_parts(
            bytes,
            RawSlice::boxed(slots.into_boxed_slice()),
            config.alignment,
            critical,
        ))
    }
}

impl<C: CriticalSection> fmt::Debug for RingBlockBuffer<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBlockBuffer")
            .field("buffer_size", &self.buffer_size())
            .field("max_blocks", &self.max_blocks())
            .field("alignment", &self.alignment())
            .finish()
    }
}

/// 连续的一组已发布块。
#[derive(Clone, Copy, Debug)]
pub(crate) struct PublishedRun {
    pub(crate) first: usize,
    pub(crate) count: usize,
    pub(crate) span: Span,
}

//
// 教案级说明：loom 模型检查需要接管链表所在的内部可变单元，才能在交错中发现
// 临界区外的读写；常规构建仍使用 `core::cell::UnsafeCell`，两者经由同一 `with_mut` 访问。
#[cfg(not(all(feature = "loom-model", any(loom, spark_loom))))]
struct PendingCell(core::cell::UnsafeCell<PendingList>);

#[cfg(not(all(feature = "loom-model", any(loom, spark_loom))))]
impl PendingCell {
    fn new(list: PendingList) -> Self {
        Self(core::cell::UnsafeCell::new(list))
    }

    #[inline]
    fn with_mut<R>(&self, f: impl FnOnce(*mut PendingList) -> R) -> R {
        f(self.0.get())
    }
}

#[cfg(all(feature = "loom-model", any(loom, spark_loom)))]
struct PendingCell(loom::cell::UnsafeCell<PendingList>);

#[cfg(all(feature = "loom-model", any(loom, spark_loom)))]
impl PendingCell {
    fn new(list: PendingList) -> Self {
        Self(loom::cell::UnsafeCell::new(list))
    }

    #[inline]
    fn with_mut<R>(&self, f: impl FnOnce(*mut PendingList) -> R) -> R {
        self.0.with_mut(f)
    }
}

/// 句柄共享的内部状态。
///
/// `pending` 与 `slots` 只在 [`RbbCore::locked`] 内访问；字节区按块区间分给各自的句柄。
pub(crate) struct RbbCore<C: CriticalSection> {
    bytes: RawSlice<u8>,
    slots: RawSlice<BlockSlot>,
    pending: PendingCell,
    layout: RingLayout,
    alignment: usize,
    metrics: RbbMetrics,
    critical: C,
}

// SAFETY: 存储由本结构独占（或独占借用），跨线程移动不引入共享。
unsafe impl<C: CriticalSection + Send> Send for RbbCore<C> {}

// SAFETY: 链表与槽位只在互斥的临界区内访问（`Sync` 的 `CriticalSection` 保证互斥）；
// 字节区按互不重叠的块区间分发给独占句柄。
unsafe impl<C: CriticalSection + Sync> Sync for RbbCore<C> {}

impl<C: CriticalSection> RbbCore<C> {
    fn locked<R>(&self, f: impl FnOnce(&mut PendingList, &mut [BlockSlot]) -> R) -> R {
        let _guard = CriticalGuard::enter(&self.critical);
        self.pending.with_mut(|pending| {
            // SAFETY: 临界区内独占访问链表与槽位，且闭包不会再次进入临界区。
            let (pending, slots) = unsafe { (&mut *pending, self.slots.as_mut_slice()) };
            f(pending, slots)
        })
    }

    #[inline]
    pub(crate) fn addr(&self) -> *const () {
        ptr::from_ref(self).cast()
    }

    fn occupied(pending: &PendingList, slots: &[BlockSlot]) -> Option<(Span, Span)> {
        Some((slots[pending.head()?].span(), slots[pending.tail()?].span()))
    }

    fn alloc(&self, requested: usize) -> Result<(usize, Span), RbbError> {
        let capacity = self.layout.capacity();
        let len = match align_up(requested, self.alignment) {
            Some(len) if requested > 0 && len <= capacity => len,
            _ => {
                return Err(RbbError::InvalidBlockSize {
                    requested,
                    capacity,
                });
            }
        };

        let outcome = self.locked(|pending, slots| {
            let Some(index) = slots
                .iter()
                .position(|slot| slot.status == BlockStatus::Unused)
            else {
                return Err(RbbError::DescriptorsExhausted {
                    max_blocks: slots.len(),
                });
            };
            let occupied = Self::occupied(pending, slots);
            let Some(offset) = self.layout.place(occupied, len) else {
                return Err(RbbError::NoSpace {
                    requested: len,
                    contiguous: self.layout.largest_free_run(occupied),
                });
            };
            slots[index] = BlockSlot {
                next: None,
                offset,
                len,
                status: BlockStatus::Inited,
            };
            pending.push_back(slots, index);
            Ok((index, Span::new(offset, len)))
        });

        match &outcome {
            Ok((index, span)) => {
                self.metrics.record_allocation();
                trace!(
                    index = *index,
                    offset = span.offset,
                    len = span.len,
                    "rbb block allocated"
                );
            }
            Err(err) => {
                self.metrics.record_alloc_failure();
                debug!(requested, code = err.code(), error = %err, "rbb allocation rejected");
            }
        }
        outcome
    }

    pub(crate) fn publish(&self, index: usize) {
        self.locked(|_, slots| {
            debug_assert_eq!(slots[index].status, BlockStatus::Inited);
            slots[index].status = BlockStatus::Put;
        });
        trace!(index, "rbb block published");
    }

    fn claim_oldest(&self) -> Option<(usize, Span)> {
        let claimed = self.locked(|pending, slots| {
            let (index, span) = pending
                .iter(slots)
                .find(|(_, slot)| slot.status == BlockStatus::Put)
                .map(|(index, slot)| (index, slot.span()))?;
            slots[index].status = BlockStatus::Got;
            Some((index, span))
        });
        match claimed {
            Some((index, _)) => trace!(index, "rbb block claimed"),
            None => self.metrics.record_empty_get(),
        }
        claimed
    }

    /// 从首个 `Put` 块开始累计物理相邻的 `Put` 块，总长达到 `limit` 即停止。只读。
    fn published_run(
        pending: &PendingList,
        slots: &[BlockSlot],
        limit: usize,
    ) -> Option<PublishedRun> {
        let mut blocks = pending
            .iter(slots)
            .skip_while(|(_, slot)| slot.status != BlockStatus::Put);
        let (first, head) = blocks.next()?;
        let mut run = PublishedRun {
            first,
            count: 1,
            span: head.span(),
        };
        for (_, slot) in blocks {
            if run.span.len >= limit
                || slot.status != BlockStatus::Put
                || !run.span.precedes(&slot.span())
            {
                break;
            }
            run.count += 1;
            run.span.len += slot.len;
        }
        Some(run)
    }

    fn published_len(&self) -> usize {
        self.locked(|pending, slots| {
            Self::published_run(pending, slots, usize::MAX).map_or(0, |run| run.span.len)
        })
    }

    fn claim_run(&self, target: usize) -> Result<PublishedRun, RbbError> {
        if target == 0 {
            return Err(RbbError::InvalidQueueLength);
        }

        let outcome = self.locked(|pending, slots| {
            let run = Self::published_run(pending, slots, target);
            let available = run.map_or(0, |run| run.span.len);
            let Some(run) = run.filter(|run| run.span.len >= target) else {
                return Err(RbbError::InsufficientData {
                    requested: target,
                    available,
                });
            };
            let mut cursor = Some(run.first);
            for _ in 0..run.count {
                let Some(index) = cursor else { break };
                slots[index].status = BlockStatus::Got;
                cursor = slots[index].next;
            }
            Ok(run)
        });

        match &outcome {
            Ok(run) => trace!(
                first = run.first,
                count = run.count,
                len = run.span.len,
                "rbb block queue claimed"
            ),
            Err(err) => {
                self.metrics.record_queue_failure();
                debug!(target_length = target, error = %err, "rbb block queue unavailable");
            }
        }
        outcome
    }

    /// 将从 `first` 起沿链表连续的 `count` 个块复位为 `Unused`。
    pub(crate) fn release(&self, first: usize, count: usize) {
        let removed =
            self.locked(|pending, slots| pending.unlink_run(slots, first, count, BlockSlot::reset));
        debug_assert_eq!(removed, count, "released blocks must be pending");
        trace!(first, count, "rbb blocks released");
    }

    /// 块区间的只读视图。
    ///
    /// # Safety
    /// 调用方必须持有覆盖 `span` 的句柄，且返回引用存活期间不存在该区间的可变引用。
    #[inline]
    pub(crate) unsafe fn region<'s>(&self, span: Span) -> &'s [u8] {
        debug_assert!(span.end() <= self.bytes.len());
        // SAFETY: `span` 位于字节区内，独占性由调用方保证。
        unsafe { core::slice::from_raw_parts(self.bytes.as_ptr().add(span.offset), span.len) }
    }

    /// 块区间的可变视图。
    ///
    /// # Safety
    /// 调用方必须独占持有覆盖 `span` 的句柄，且返回引用存活期间不存在该区间的其它引用。
    #[inline]
    pub(crate) unsafe fn region_mut<'s>(&self, span: Span) -> &'s mut [u8] {
        debug_assert!(span.end() <= self.bytes.len());
        // SAFETY: 同上。
        unsafe { core::slice::from_raw_parts_mut(self.bytes.as_ptr().add(span.offset), span.len) }
    }

    fn max_alloc_len(&self) -> usize {
        self.locked(|pending, slots| {
            self.layout
                .largest_free_run(Self::occupied(pending, slots))
        })
    }

    fn stats(&self) -> RbbStats {
        let mut stats = self.locked(|pending, slots| {
            let mut stats = RbbStats {
                capacity: self.layout.capacity(),
                max_alloc_len: self
                    .layout
                    .largest_free_run(Self::occupied(pending, slots)),
                pending_blocks: pending.len(),
                ..RbbStats::default()
            };
            for (_, slot) in pending.iter(slots) {
                stats.used_bytes += slot.len;
                match slot.status {
                    BlockStatus::Inited => stats.inited_blocks += 1,
                    BlockStatus::Put => stats.put_blocks += 1,
                    BlockStatus::Got => stats.got_blocks += 1,
                    BlockStatus::Unused => {}
                }
            }
            stats.free_descriptors = slots
                .iter()
                .filter(|slot| slot.status == BlockStatus::Unused)
                .count();
            stats
        });
        self.metrics.fill(&mut stats);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical::Cooperative;

    #[test]
    fn alloc_appends_after_tail_then_wraps_to_base() {
        let mut buffer = [0u8; 100];
        let mut slots = [BlockSlot::UNUSED; 4];
        let rbb = RingBlockBuffer::init(&mut buffer, &mut slots, Cooperative::new())
            .expect("初始化失败");

        let first = rbb.alloc(40).expect("首块分配失败");
        let second = rbb.alloc(40).expect("第二块分配失败");
        assert_eq!((first.offset(), second.offset()), (0, 40));
        first.put();
        rbb.get().expect("应认领首块").free();

        // 游标处只剩 20 字节，基址处空出 40 字节。
        let wrapped = rbb.alloc(30).expect("应回绕到基址");
        assert_eq!(wrapped.offset(), 0);
        assert_eq!(rbb.max_alloc_len(), 10);
        drop(second);
        assert_eq!(rbb.max_alloc_len(), 70);
        drop(wrapped);
        assert_eq!(rbb.max_alloc_len(), 100);
    }

    #[test]
    fn alloc_rejects_invalid_sizes() {
        let mut buffer = [0u8; 16];
        let mut slots = [BlockSlot::UNUSED; 2];
        let rbb = RingBlockBuffer::init(&mut buffer, &mut slots, Cooperative::new())
            .expect("初始化失败");
        assert_eq!(
            rbb.alloc(0).unwrap_err(),
            RbbError::InvalidBlockSize {
                requested: 0,
                capacity: 16
            }
        );
        assert!(matches!(
            rbb.alloc(17),
            Err(RbbError::InvalidBlockSize { requested: 17, .. })
        ));
    }

    #[test]
    fn descriptor_exhaustion_is_backpressure() {
        let mut buffer = [0u8; 64];
        let mut slots = [BlockSlot::UNUSED; 2];
        let rbb = RingBlockBuffer::init(&mut buffer, &mut slots, Cooperative::new())
            .expect("初始化失败");
        let _a = rbb.alloc(8).expect("a");
        let _b = rbb.alloc(8).expect("b");
        let err = rbb.alloc(8).unwrap_err();
        assert_eq!(err, RbbError::DescriptorsExhausted { max_blocks: 2 });
        assert!(err.is_backpressure());
        assert_eq!(rbb.stats().alloc_failures, 1);
    }

    #[test]
    fn alignment_rounds_block_lengths() {
        let mut buffer = [0u64; 8];
        let bytes = unsafe {
            // SAFETY: `u64` 数组按 8 字节对齐，按字节重新解释不改变有效性。
            core::slice::from_raw_parts_mut(buffer.as_mut_ptr().cast::<u8>(), 64)
        };
        let mut slots = [BlockSlot::UNUSED; 4];
        let rbb = RingBlockBuffer::init_aligned(bytes, &mut slots, 8, Cooperative::new())
            .expect("初始化失败");
        let a = rbb.alloc(5).expect("a");
        let b = rbb.alloc(9).expect("b");
        assert_eq!((a.len(), b.offset(), b.len()), (8, 8, 16));
    }

    #[test]
    fn init_rejects_empty_storage() {
        let mut slots = [BlockSlot::UNUSED; 1];
        let err = RingBlockBuffer::init(&mut [], &mut slots, Cooperative::new()).unwrap_err();
        assert_eq!(err.code(), "rbb.init.invalid_config");

        let mut buffer = [0u8; 4];
        assert!(RingBlockBuffer::init(&mut buffer, &mut [], Cooperative::new()).is_err());
    }
}
