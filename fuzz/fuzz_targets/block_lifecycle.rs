#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spark_rbb::{BlockQueue, ReadBlock, RingBlockBuffer, WriteBlock};

/// Fuzz 输入：缓冲规模与一串块操作。
///
/// - **Why**：回绕、乱序释放与块队列聚合交织时，放置算法最容易算错空闲区；
/// - **How**：所有句柄按分配序号填充内容，每步之后校验存活块内容未被覆写、容量不超限；
/// - **What**：任何 panic 或断言失败都意味着块区间重叠或链表损坏。
#[derive(Debug, Arbitrary)]
struct LifecycleCase {
    buffer_size: u8,
    max_blocks: u8,
    ops: Vec<BlockOp>,
}

#[derive(Debug, Arbitrary)]
enum BlockOp {
    Alloc { size: u8 },
    Put { pick: u8 },
    Abandon { pick: u8 },
    Get,
    Queue { target: u8 },
    FreeRead { pick: u8 },
    FreeQueue { pick: u8 },
}

fuzz_target!(|case: LifecycleCase| {
    let buffer_size = usize::from(case.buffer_size).max(1);
    let max_blocks = usize::from(case.max_blocks % 16).max(1);
    let Ok(rbb) = RingBlockBuffer::create(buffer_size, max_blocks) else {
        return;
    };

    let mut writers: Vec<(u8, WriteBlock<'_>)> = Vec::new();
    let mut readers: Vec<(u8, ReadBlock<'_>)> = Vec::new();
    let mut queues: Vec<BlockQueue<'_>> = Vec::new();
    let mut next_tag = 0u8;

    for op in case.ops {
        match op {
            BlockOp::Alloc { size } => {
                if let Ok(mut block) = rbb.alloc(usize::from(size)) {
                    block.as_mut_slice().fill(next_tag);
                    writers.push((next_tag, block));
                    next_tag = next_tag.wrapping_add(1);
                }
            }
            BlockOp::Put { pick } => {
                if let Some((_, block)) = take(&mut writers, pick) {
                    block.put();
                }
            }
            BlockOp::Abandon { pick } => {
                if let Some((_, block)) = take(&mut writers, pick) {
                    rbb.free(block).expect("句柄属于同一缓冲");
                }
            }
            BlockOp::Get => {
                if let Some(block) = rbb.get() {
                    let tag = block.as_slice()[0];
                    assert!(block.as_slice().iter().all(|&byte| byte == tag));
                    readers.push((tag, block));
                }
            }
            BlockOp::Queue { target } => {
                let expected = rbb.next_block_queue_len();
                match rbb.get_block_queue(usize::from(target)) {
                    Ok(queue) => {
                        assert!(queue.len() >= usize::from(target));
                        assert!(queue.len() <= expected);
                        queues.push(queue);
                    }
                    Err(_) => assert_eq!(rbb.next_block_queue_len(), expected),
                }
            }
            BlockOp::FreeRead { pick } => {
                drop(take(&mut readers, pick));
            }
            BlockOp::FreeQueue { pick } => {
                if let Some(queue) = take(&mut queues, pick) {
                    rbb.free_block_queue(queue).expect("句柄属于同一缓冲");
                }
            }
        }

        let stats = rbb.stats();
        assert!(stats.used_bytes <= buffer_size);
        assert_eq!(
            stats.pending_blocks,
            stats.inited_blocks + stats.put_blocks + stats.got_blocks
        );
        for (tag, block) in &writers {
            assert!(block.as_slice().iter().all(|byte| byte == tag));
        }
        for (tag, block) in &readers {
            assert!(block.as_slice().iter().all(|byte| byte == tag));
        }
    }
});

fn take<T>(items: &mut Vec<T>, pick: u8) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        let index = usize::from(pick) % items.len();
        Some(items.swap_remove(index))
    }
}
