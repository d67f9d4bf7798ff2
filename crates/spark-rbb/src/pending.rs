//! 待处理链表：以槽位下标串联的侵入式单链表。
//!
//! 节点就是描述符槽位本身（`BlockSlot::next`），插入顺序即分配顺序，也就是竞技场中的地址顺序
//! （至多回绕一次）。链表上的节点处于 `Inited`、`Put` 或 `Got` 状态，热路径上不做任何分配。

use crate::slot::BlockSlot;

#[derive(Debug, Default)]
pub(crate) struct PendingList {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl PendingList {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn head(&self) -> Option<usize> {
        self.head
    }

    #[inline]
    pub(crate) fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub(crate) fn push_back(&mut self, slots: &mut [BlockSlot], index: usize) {
        slots[index].next = None;
        match self.tail {
            Some(tail) => slots[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
    }

    /// 摘除从 `first` 开始、沿链表连续的 `count` 个节点，并对每个节点调用 `release`。
    ///
    /// 返回实际摘除的节点数；`first` 不在链表上时返回 0 且不修改任何状态。
    pub(crate) fn unlink_run(
        &mut self,
        slots: &mut [BlockSlot],
        first: usize,
        count: usize,
        mut release: impl FnMut(&mut BlockSlot),
    ) -> usize {
        if count == 0 {
            return 0;
        }

        let mut prev = None;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            if index == first {
                break;
            }
            prev = Some(index);
            cursor = slots[index].next;
        }
        if cursor.is_none() {
            return 0;
        }

        let mut removed = 0;
        let mut cursor = Some(first);
        while let Some(index) = cursor {
            if removed == count {
                break;
            }
            cursor = slots[index].next;
            release(&mut slots[index]);
            removed += 1;
        }

        match prev {
            Some(prev) => slots[prev].next = cursor,
            None => self.head = cursor,
        }
        if cursor.is_none() {
            self.tail = prev;
        }
        self.len -= removed;
        removed
    }

    pub(crate) fn iter<'s>(&self, slots: &'s [BlockSlot]) -> Iter<'s> {
        Iter {
            slots,
            cursor: self.head,
        }
    }
}

/// 按链表顺序产出 `(下标, 槽位)`。
pub(crate) struct Iter<'s> {
    slots: &'s [BlockSlot],
    cursor: Option<usize>,
}

impl<'s> Iterator for Iter<'s> {
    type Item = (usize, &'s BlockSlot);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let slot = &self.slots[index];
        self.cursor = slot.next;
        Some((index, slot))
    }
}
