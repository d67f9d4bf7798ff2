//! 单块句柄：生产者侧的 [`WriteBlock`] 与消费者侧的 [`ReadBlock`]。
//!
//! # 设计概要（How）
//! - 句柄借用所属缓冲的内部状态，并缓存块的偏移与长度；读写字节区无需进入临界区；
//! - 句柄不可克隆，`put`/`free` 以值接收，`Drop` 负责兜底释放，
//!   因此“重复释放”“释放后访问”“认领他人块”在类型层面无法表达；
//! - 与 `spark-buffer` 的 `Lease` 一样，回收路径放在 `Drop`，显式 `free` 只是提前触发。

use core::{fmt, mem::ManuallyDrop};

use crate::{
    critical::{CriticalSection, SpinCritical},
    layout::Span,
    rbb::RbbCore,
};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// 可交给 [`crate::RingBlockBuffer::free`] 的句柄。
///
/// 由 [`WriteBlock`]、[`ReadBlock`] 与 [`crate::BlockQueue`] 实现，外部无法扩展。
pub trait BlockHandle: sealed::Sealed {
    /// 句柄所属缓冲的地址标识，仅用于判断归属。
    #[doc(hidden)]
    fn owner(&self) -> *const ();
}

/// 生产者持有的已分配块（`Inited`）。
///
/// 写入完成后调用 [`WriteBlock::put`] 发布给消费者；直接丢弃或调用 [`WriteBlock::free`]
/// 视为放弃，块立即回到 `Unused`。
///
/// ```
/// # #[cfg(feature = "alloc")] {
/// use spark_rbb::RingBlockBuffer;
///
/// let rbb = RingBlockBuffer::create(64, 4).expect("创建失败");
/// let mut block = rbb.alloc(5).expect("空间充足");
/// block.as_mut_slice().copy_from_slice(b"hello");
/// block.put();
///
/// let read = rbb.get().expect("已发布");
/// assert_eq!(read.as_slice(), b"hello");
/// # }
/// ```
pub struct WriteBlock<'r, C: CriticalSection = SpinCritical> {
    core: &'r RbbCore<C>,
    index: usize,
    span: Span,
}

impl<'r, C: CriticalSection> WriteBlock<'r, C> {
    pub(crate) fn new(core: &'r RbbCore<C>, index: usize, span: Span) -> Self {
        Self { core, index, span }
    }

    /// 块长度（已按对齐取整）。
    #[inline]
    pub fn len(&self) -> usize {
        self.span.len
    }

    /// 块长度恒为正，保留此方法以配合 `len`。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.span.len == 0
    }

    /// 块在竞技场中的起始偏移。
    #[inline]
    pub fn offset(&self) -> usize {
        self.span.offset
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: 句柄独占该区间，`&self` 排除了同时存在的可变借用。
        unsafe { self.core.region(self.span) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: 句柄独占该区间，`&mut self` 保证引用唯一。
        unsafe { self.core.region_mut(self.span) }
    }

    /// 发布：`Inited -> Put`，块对消费者可见。
    pub fn put(self) {
        let this = ManuallyDrop::new(self);
        this.core.publish(this.index);
    }

    /// 放弃本块：`Inited -> Unused`。
    pub fn free(self) {
        drop(self);
    }
}

impl<C: CriticalSection> Drop for WriteBlock<'_, C> {
    fn drop(&mut self) {
        self.core.release(self.index, 1);
    }
}

impl<C: CriticalSection> AsRef<[u8]> for WriteBlock<'_, C> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<C: CriticalSection> AsMut<[u8]> for WriteBlock<'_, C> {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl<C: CriticalSection> fmt::Debug for WriteBlock<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBlock")
            .field("index", &self.index)
            .field("offset", &self.span.offset)
            .field("len", &self.span.len)
            .finish()
    }
}

impl<C: CriticalSection> sealed::Sealed for WriteBlock<'_, C> {}

impl<C: CriticalSection> BlockHandle for WriteBlock<'_, C> {
    fn owner(&self) -> *const () {
        self.core.addr()
    }
}

/// 消费者认领的单个块（`Got`），`Drop` 或 [`ReadBlock::free`] 时回到 `Unused`。
///
/// 消费者同样可以原地改写内容（例如就地解密），因此也提供可变视图。
pub struct ReadBlock<'r, C: CriticalSection = SpinCritical> {
    core: &'r RbbCore<C>,
    index: usize,
    span: Span,
}

impl<'r, C: CriticalSection> ReadBlock<'r, C> {
    pub(crate) fn new(core: &'r RbbCore<C>, index: usize, span: Span) -> Self {
        Self { core, index, span }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.span.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.span.len == 0
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.span.offset
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: 同 `WriteBlock::as_slice`。
        unsafe { self.core.region(self.span) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: 同 `WriteBlock::as_mut_slice`。
        unsafe { self.core.region_mut(self.span) }
    }

    pub fn free(self) {
        drop(self);
    }
}

impl<C: CriticalSection> Drop for ReadBlock<'_, C> {
    fn drop(&mut self) {
        self.core.release(self.index, 1);
    }
}

impl<C: CriticalSection> AsRef<[u8]> for ReadBlock<'_, C> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<C: CriticalSection> AsMut<[u8]> for ReadBlock<'_, C> {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl<C: CriticalSection> fmt::Debug for ReadBlock<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadBlock")
            .field("index", &self.index)
            .field("offset", &self.span.offset)
            .field("len", &self.span.len)
            .finish()
    }
}

impl<C: CriticalSection> sealed::Sealed for ReadBlock<'_, C> {}

impl<C: CriticalSection> BlockHandle for ReadBlock<'_, C> {
    fn owner(&self) -> *const () {
        self.core.addr()
    }
}
