//! 环形地址算术。
//!
//! # 设计动机（Why）
//! - 所有位置都表示为 `0..capacity` 内的逻辑偏移，不对裸指针做比较或相减；
//!   “游标处连续空闲区”与“回绕后基址处空闲区”的计算集中在一处。
//!
//! # 核心模型（How）
//! - 待处理链表非空时，只有首块（最旧）与尾块（最新）决定可分配区域：
//!   - 未回绕（`head.offset <= tail.offset`）：`[tail.end, capacity)` 与 `[0, head.offset)` 两段空闲；
//!   - 已回绕（`head.offset > tail.offset`）：仅 `[tail.end, head.offset)` 一段空闲。
//! - 链表中间因乱序释放留下的空洞不参与计算，直到它之前的块全部释放、空洞落到首块之前才被回收。

/// 竞技场中的一段连续区间。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Span {
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

impl Span {
    #[inline]
    pub(crate) const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    #[inline]
    pub(crate) const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// `next` 是否紧接在 `self` 之后（物理相邻，不跨越回绕点）。
    #[inline]
    pub(crate) const fn precedes(&self, next: &Span) -> bool {
        self.end() == next.offset
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct RingLayout {
    capacity: usize,
}

impl RingLayout {
    #[inline]
    pub(crate) const fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    #[inline]
    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    /// 沿环前进方向从 `from` 到 `to` 的距离。
    #[inline]
    pub(crate) const fn forward_distance(&self, from: usize, to: usize) -> usize {
        if to >= from {
            to - from
        } else {
            self.capacity - from + to
        }
    }

    /// 返回 `(游标处空闲长度, 基址处空闲长度)`。游标即尾块末端。
    pub(crate) fn free_runs(&self, head: Span, tail: Span) -> (usize, usize) {
        if head.offset <= tail.offset {
            (self.capacity - tail.end(), head.offset)
        } else {
            (self.forward_distance(tail.end(), head.offset), 0)
        }
    }

    /// 为长度 `len` 的新块选择起始偏移；`occupied` 为 `(首块, 尾块)`，空链表时为 `None`。
    ///
    /// 优先紧接游标放置，放不下时尝试回绕到基址。
    pub(crate) fn place(&self, occupied: Option<(Span, Span)>, len: usize) -> Option<usize> {
        match occupied {
            None => (len <= self.capacity).then_some(0),
            Some((head, tail)) => {
                let (at_cursor, at_base) = self.free_runs(head, tail);
                if at_cursor >= len {
                    Some(tail.end())
                } else if at_base >= len {
                    Some(0)
                } else {
                    None
                }
            }
        }
    }

    /// 当前能够一次分配到的最大连续长度。
    pub(crate) fn largest_free_run(&self, occupied: Option<(Span, Span)>) -> usize {
        match occupied {
            None => self.capacity,
            Some((head, tail)) => {
                let (at_cursor, at_base) = self.free_runs(head, tail);
                at_cursor.max(at_base)
            }
        }
    }
}

#[inline]
pub(crate) const fn align_up(len: usize, alignment: usize) -> Option<usize> {
    match len.checked_add(alignment - 1) {
        Some(padded) => Some(padded & !(alignment - 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_places_at_base() {
        let layout = RingLayout::new(100);
        assert_eq!(layout.place(None, 100), Some(0));
        assert_eq!(layout.place(None, 101), None);
        assert_eq!(layout.largest_free_run(None), 100);
    }

    #[test]
    fn unwrapped_ring_prefers_cursor_then_base() {
        let layout = RingLayout::new(100);
        let head = Span::new(30, 20);
        let tail = Span::new(50, 20);
        assert_eq!(layout.free_runs(head, tail), (30, 30));
        assert_eq!(layout.place(Some((head, tail)), 30), Some(70));
        let tail = Span::new(50, 40);
        assert_eq!(layout.place(Some((head, tail)), 25), Some(0));
        assert_eq!(layout.place(Some((head, tail)), 31), None);
    }

    #[test]
    fn wrapped_ring_only_uses_gap_before_head() {
        let layout = RingLayout::new(100);
        let head = Span::new(60, 40);
        let tail = Span::new(0, 20);
        assert_eq!(layout.free_runs(head, tail), (40, 0));
        assert_eq!(layout.place(Some((head, tail)), 40), Some(20));
        assert_eq!(layout.place(Some((head, tail)), 41), None);
        assert_eq!(layout.largest_free_run(Some((head, tail))), 40);
    }

    #[test]
    fn forward_distance_wraps() {
        let layout = RingLayout::new(100);
        assert_eq!(layout.forward_distance(90, 10), 20);
        assert_eq!(layout.forward_distance(10, 90), 80);
        assert_eq!(layout.forward_distance(42, 42), 0);
    }

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(13, 4), Some(16));
        assert_eq!(align_up(16, 4), Some(16));
        assert_eq!(align_up(7, 1), Some(7));
        assert_eq!(align_up(usize::MAX, 8), None);
    }
}
