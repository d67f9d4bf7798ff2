use core::fmt;

use crate::{
    block::BlockHandle,
    critical::{CriticalSection, SpinCritical},
    layout::Span,
    rbb::RbbCore,
};

/// 由若干物理相邻的已发布块拼成的连续区间，整体处于 `Got`。
///
/// # 契约说明（What）
/// - `as_slice` 覆盖 `[offset, offset + len)`，其中 `len` 是各块长度之和，至少为请求的目标长度；
/// - 队列内的块在链表上连续、在竞技场中首尾相接，不跨越回绕点；
/// - `Drop` 或 [`BlockQueue::free`] 一次性释放全部块。
///
/// 典型用法是把多次小 DMA 写入合并为一次大块的压缩或发送：
///
/// ```
/// # #[cfg(feature = "alloc")] {
/// use spark_rbb::RingBlockBuffer;
///
/// let rbb = RingBlockBuffer::create(64, 8).expect("创建失败");
/// for chunk in [b"ab", b"cd", b"ef"] {
///     let mut block = rbb.alloc(2).expect("空间充足");
///     block.as_mut_slice().copy_from_slice(chunk);
///     block.put();
/// }
/// assert_eq!(rbb.next_block_queue_len(), 6);
///
/// let queue = rbb.get_block_queue(3).expect("数据足够");
/// assert_eq!((queue.block_count(), queue.as_slice()), (2, &b"abcd"[..]));
/// rbb.free_block_queue(queue).expect("同一缓冲");
/// # }
/// ```
pub struct BlockQueue<'r, C: CriticalSection = SpinCritical> {
    core: &'r RbbCore<C>,
    first: usize,
    count: usize,
    span: Span,
}

impl<'r, C: CriticalSection> BlockQueue<'r, C> {
    pub(crate) fn new(core: &'r RbbCore<C>, first: usize, count: usize, span: Span) -> Self {
        Self {
            core,
            first,
            count,
            span,
        }
    }

    /// 队列总长度。
    #[inline]
    pub fn len(&self) -> usize {
        self.span.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.span.len == 0
    }

    /// 首块偏移。
    #[inline]
    pub fn offset(&self) -> usize {
        self.span.offset
    }

    /// 队列包含的块数，至少为 1。
    #[inline]
    pub fn block_count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: 队列内的块均处于 `Got` 且由本句柄独占，区间连续。
        unsafe { self.core.region(self.span) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: 同上，`&mut self` 保证引用唯一。
        unsafe { self.core.region_mut(self.span) }
    }

    pub fn free(self) {
        drop(self);
    }
}

impl<C: CriticalSection> Drop for BlockQueue<'_, C> {
    fn drop(&mut self) {
        self.core.release(self.first, self.count);
    }
}

impl<C: CriticalSection> AsRef<[u8]> for BlockQueue<'_, C> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<C: CriticalSection> fmt::Debug for BlockQueue<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockQueue")
            .field("offset", &self.span.offset)
            .field("len", &self.span.len)
            .field("blocks", &self.count)
            .finish()
    }
}

impl<C: CriticalSection> crate::block::sealed::Sealed for BlockQueue<'_, C> {}

impl<C: CriticalSection> BlockHandle for BlockQueue<'_, C> {
    fn owner(&self) -> *const () {
        self.core.addr()
    }
}
