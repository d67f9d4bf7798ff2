//! `block_queue_contract` 集成测试：验证相邻块聚合的原子性与相邻性判定。
//!
//! # 测试目标（Why）
//! - 压缩、发送等消费者依赖“要么拿到足够长的连续区间，要么什么都不变”；
//!   若失败路径残留 `Got` 状态，后续数据会永久卡在链表里。
//!
//! # 合同与边界（What）
//! - 队列只由物理首尾相接的 `Put` 块组成，遇到非 `Put` 块或回绕断点即停止；
//! - 总长达到目标即停止聚合，剩余块留给下一次调用；
//! - 失败返回 `InsufficientData`，其中 `available` 即当前可组成的最大长度。

use spark_rbb::{RbbError, RingBlockBuffer, SpinCritical};

fn publish(rbb: &RingBlockBuffer<'_, SpinCritical>, len: usize, fill: u8) {
    let mut block = rbb.alloc(len).expect("空间充足");
    block.as_mut_slice().fill(fill);
    block.put();
}

/// 数据不足时不产生任何副作用，补齐后可整体认领。
///
/// # 步骤说明（How）
/// 1. 发布三个 10 字节块，请求 40 字节：失败且三块仍为 `Put`；
/// 2. 请求 30 字节：成功，队列含三块且内容依次排列。
#[test]
fn insufficient_data_leaves_blocks_published() {
    let rbb = RingBlockBuffer::create(64, 8).expect("创建失败");
    for fill in 1..=3 {
        publish(&rbb, 10, fill);
    }

    let err = rbb.get_block_queue(40).expect_err("仅 30 字节");
    assert_eq!(
        err,
        RbbError::InsufficientData {
            requested: 40,
            available: 30
        }
    );
    assert!(err.is_backpressure());
    let stats = rbb.stats();
    assert_eq!((stats.put_blocks, stats.got_blocks), (3, 0));
    assert_eq!(stats.queue_failures, 1);

    let queue = rbb.get_block_queue(30).expect("恰好足够");
    assert_eq!(queue.block_count(), 3);
    let expected: Vec<u8> = [1u8, 2, 3].iter().flat_map(|&b| [b; 10]).collect();
    assert_eq!(queue.as_slice(), expected.as_slice());
}

/// 聚合在达到目标后停止，剩余块可被下一次调用取走。
#[test]
fn aggregation_stops_once_target_is_reached() {
    let rbb = RingBlockBuffer::create(64, 8).expect("创建失败");
    for fill in 0..4 {
        publish(&rbb, 10, fill);
    }
    assert_eq!(rbb.next_block_queue_len(), 40);

    let head = rbb.get_block_queue(15).expect("两块即可");
    assert_eq!((head.offset(), head.len(), head.block_count()), (0, 20, 2));
    assert_eq!(rbb.next_block_queue_len(), 20);

    let rest = rbb.get_block_queue(20).expect("剩余两块");
    assert_eq!((rest.offset(), rest.block_count()), (20, 2));
    assert_eq!(rbb.next_block_queue_len(), 0);
}

/// 链表前部仍在写入的块被跳过，但中间出现非 `Put` 块会截断队列。
#[test]
fn non_published_blocks_bound_the_queue() {
    let rbb = RingBlockBuffer::create(64, 8).expect("创建失败");
    let leading = rbb.alloc(8).expect("仍在写入");
    publish(&rbb, 8, 1);
    let middle = rbb.alloc(8).expect("仍在写入");
    publish(&rbb, 8, 2);

    assert_eq!(rbb.next_block_queue_len(), 8, "首个 Put 块之后紧跟 Inited 块");
    assert!(matches!(
        rbb.get_block_queue(9),
        Err(RbbError::InsufficientData { available: 8, .. })
    ));

    middle.put();
    assert_eq!(rbb.next_block_queue_len(), 24);
    let queue = rbb.get_block_queue(24).expect("三块相邻");
    assert_eq!(queue.offset(), 8);
    drop(leading);
}

/// 回绕点两侧的块物理上不相邻，不能拼成一个队列。
#[test]
fn wrap_point_breaks_adjacency() {
    let rbb = RingBlockBuffer::create(100, 4).expect("创建失败");
    let head = rbb.alloc(60).expect("head");
    let mut tail_side = rbb.alloc(30).expect("游标处 60..90");
    tail_side.as_mut_slice().fill(0xAA);
    head.free();
    let mut base_side = rbb.alloc(30).expect("回绕到基址");
    assert_eq!(base_side.offset(), 0);
    base_side.as_mut_slice().fill(0xBB);
    tail_side.put();
    base_side.put();

    assert_eq!(rbb.next_block_queue_len(), 30);
    assert!(rbb.get_block_queue(31).is_err());

    let first = rbb.get_block_queue(30).expect("仅回绕前一块");
    assert_eq!((first.offset(), first.block_count()), (60, 1));
    assert!(first.as_slice().iter().all(|&byte| byte == 0xAA));
    rbb.free_block_queue(first).expect("同一缓冲");

    let second = rbb.get_block_queue(30).expect("回绕后一块");
    assert_eq!(second.offset(), 0);
    assert!(second.as_slice().iter().all(|&byte| byte == 0xBB));
}

/// 单块 `get` 与块队列交替使用时，已被认领的块不会进入队列。
#[test]
fn claimed_block_is_not_aggregated() {
    let rbb = RingBlockBuffer::create(64, 8).expect("创建失败");
    publish(&rbb, 8, 1);
    publish(&rbb, 8, 2);
    publish(&rbb, 8, 3);

    let single = rbb.get().expect("首块");
    assert_eq!(single.offset(), 0);
    let queue = rbb.get_block_queue(16).expect("剩余两块相邻");
    assert_eq!((queue.offset(), queue.len()), (8, 16));
    assert!(rbb.get().is_none());

    drop(queue);
    assert_eq!(rbb.stats().pending_blocks, 1);
    drop(single);
    assert_eq!(rbb.stats().pending_blocks, 0);
}

/// 队列句柄交给其它缓冲释放时报告归属错误。
#[test]
fn foreign_queue_is_reported() {
    let owner = RingBlockBuffer::create(32, 4).expect("owner");
    let other = RingBlockBuffer::create(32, 4).expect("other");
    publish(&owner, 8, 0);
    let queue = owner.get_block_queue(8).expect("queue");
    assert_eq!(other.free_block_queue(queue), Err(RbbError::ForeignBlock));
    assert_eq!(owner.stats().pending_blocks, 0);
}
