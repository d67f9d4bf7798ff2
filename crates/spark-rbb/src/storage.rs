//! 字节竞技场与描述符数组的底层存储。
//!
//! 两类存储统一为 [`RawSlice`]：借用调用方的静态数组，或在 `alloc` 下由本 crate 持有堆内存。
//! 借用情形的生命周期由外层 `RingBlockBuffer<'a, _>` 的 `PhantomData` 约束，此处只保存裸指针，
//! 以便在临界区与块句柄中分别对不同子区间取得 `&mut`，而不触发整段切片的别名冲突。

use core::ptr::NonNull;

#[cfg(feature = "alloc")]
use alloc::{
    alloc::{Layout, alloc_zeroed, dealloc},
    boxed::Box,
};

enum Owner {
    Borrowed,
    #[cfg(feature = "alloc")]
    Boxed,
    #[cfg(feature = "alloc")]
    Aligned { align: usize },
}

pub(crate) struct RawSlice<T> {
    ptr: NonNull<T>,
    len: usize,
    owner: Owner,
}

impl<T> RawSlice<T> {
    /// 记录调用方提供的切片。调用方负责让切片在本结构存活期间保持有效且不被他处访问。
    pub(crate) fn borrowed(slice: &mut [T]) -> Self {
        let len = slice.len();
        Self {
            ptr: NonNull::from(slice).cast(),
            len,
            owner: Owner::Borrowed,
        }
    }

    #[cfg(feature = "alloc")]
    pub(crate) fn boxed(boxed: Box<[T]>) -> Self {
        let len = boxed.len();
        let raw = Box::into_raw(boxed);
        Self {
            // SAFETY: `Box::into_raw` 永不返回空指针。
            ptr: unsafe { NonNull::new_unchecked(raw.cast::<T>()) },
            len,
            owner: Owner::Boxed,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// 取得整段可变切片。
    ///
    /// # Safety
    /// 调用方必须保证返回的引用存活期间没有其它对同一区间的引用。
    #[inline]
    pub(crate) unsafe fn as_mut_slice<'s>(&self) -> &'s mut [T] {
        // SAFETY: 指针与长度来自合法切片或分配，独占性由调用方保证。
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

#[cfg(feature = "alloc")]
impl RawSlice<u8> {
    /// 以给定对齐分配清零的字节区；分配器返回空指针时得到 `None`，不残留任何状态。
    pub(crate) fn allocate_zeroed(len: usize, align: usize) -> Option<Self> {
        let layout = Layout::from_size_align(len, align).ok()?;
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: `layout` 尺寸非零。
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)?;
        Some(Self {
            ptr,
            len,
            owner: Owner::Aligned { align },
        })
    }
}

impl<T> Drop for RawSlice<T> {
    fn drop(&mut self) {
        match self.owner {
            Owner::Borrowed => {}
            #[cfg(feature = "alloc")]
            Owner::Boxed => {
                let raw = core::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
                // SAFETY: 指针来自 `Box::into_raw`，且只在此处回收一次。
                drop(unsafe { Box::from_raw(raw) });
            }
            #[cfg(feature = "alloc")]
            Owner::Aligned { align } => {
                // SAFETY: 与 `allocate_zeroed` 使用同一布局，已在分配时校验过。
                unsafe {
                    let layout = Layout::from_size_align_unchecked(self.len, align);
                    dealloc(self.ptr.as_ptr().cast::<u8>(), layout);
                }
            }
        }
    }
}
