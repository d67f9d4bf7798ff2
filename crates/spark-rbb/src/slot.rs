use crate::layout::Span;

/// 块描述符的生命周期状态。
///
/// ```text
/// Unused --alloc--> Inited --put--> Put --get--> Got --free--> Unused
///                     └------------free (生产者放弃)-----------┘
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum BlockStatus {
    /// 初始状态，或 `free` 之后。
    #[default]
    Unused,
    /// `alloc` 之后，由生产者独占写入。
    Inited,
    /// `put` 之后，对消费者可见。
    Put,
    /// `get` / `get_block_queue` 之后，由认领的消费者独占。
    Got,
}

/// 块描述符槽位。
///
/// 调用方通过 `init` 提供固定容量的槽位数组，环形块缓冲只在槽位之间回收复用，
/// 从不单独分配或释放描述符。`UNUSED` 为常量，数组可以在栈上或静态区直接声明：
///
/// ```
/// use spark_rbb::{BlockSlot, BlockStatus};
///
/// let slots = [BlockSlot::UNUSED; 8];
/// assert!(slots.iter().all(|slot| slot.status() == BlockStatus::Unused));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockSlot {
    pub(crate) next: Option<usize>,
    pub(crate) offset: usize,
    pub(crate) len: usize,
    pub(crate) status: BlockStatus,
}

impl BlockSlot {
    pub const UNUSED: BlockSlot = BlockSlot {
        next: None,
        offset: 0,
        len: 0,
        status: BlockStatus::Unused,
    };

    /// 当前状态。
    #[inline]
    pub fn status(&self) -> BlockStatus {
        self.status
    }

    #[inline]
    pub(crate) fn span(&self) -> Span {
        Span::new(self.offset, self.len)
    }

    /// 复位为未使用状态，链接字段一并清空。
    #[inline]
    pub(crate) fn reset(&mut self) {
        *self = BlockSlot::UNUSED;
    }
}
