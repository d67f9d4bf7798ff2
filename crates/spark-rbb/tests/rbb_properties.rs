//! 环形块缓冲的性质测试。
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：随机交错 `alloc`/`put`/`get`/`get_block_queue`/`free`，在每一步之后断言：
//!   1. 待处理块总长不超过容量，且与统计快照一致；
//!   2. 所有存活块互不重叠，内容未被他人覆写；
//!   3. `get` 总是返回分配顺序中最旧的已发布块；
//!   4. 块队列要么满足目标长度、要么失败且不改变任何状态。
//! - **设计手法 (How)**：影子模型只记录“分配顺序 + 状态 + 区间”，不复刻放置算法；
//!   放置结果只校验“与存活块不重叠”，顺序与聚合结果则与模型逐项比对。
//!
//! # 设计考量 (Trade-offs)
//!
//! - 容量取 128、描述符取 6，使回绕与描述符耗尽在短序列内就会频繁出现；
//! - 每个块以分配序号填充，作为轻量的内容完整性校验。

use proptest::prelude::*;
use spark_rbb::{BlockQueue, ReadBlock, RingBlockBuffer, SpinCritical, WriteBlock};

const CAPACITY: usize = 128;
const MAX_BLOCKS: usize = 6;

#[derive(Clone, Debug)]
enum Op {
    Alloc(usize),
    Put(usize),
    AbandonWriter(usize),
    Get,
    Queue(usize),
    FreeReader(usize),
    FreeQueue(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1..=48usize).prop_map(Op::Alloc),
        3 => any::<usize>().prop_map(Op::Put),
        1 => any::<usize>().prop_map(Op::AbandonWriter),
        2 => Just(Op::Get),
        2 => (1..=96usize).prop_map(Op::Queue),
        2 => any::<usize>().prop_map(Op::FreeReader),
        1 => any::<usize>().prop_map(Op::FreeQueue),
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Inited,
    Put,
    Got,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    id: u8,
    offset: usize,
    len: usize,
    status: Status,
}

/// 按分配顺序记录待处理块的影子模型。
#[derive(Default)]
struct Model {
    entries: Vec<Entry>,
}

impl Model {
    fn position(&self, id: u8) -> usize {
        self.entries
            .iter()
            .position(|entry| entry.id == id)
            .expect("模型中必须存在该块")
    }

    fn set_status(&mut self, id: u8, status: Status) {
        let index = self.position(id);
        self.entries[index].status = status;
    }

    fn remove(&mut self, id: u8) {
        let index = self.position(id);
        self.entries.remove(index);
    }

    fn oldest_published(&self) -> Option<Entry> {
        self.entries
            .iter()
            .copied()
            .find(|entry| entry.status == Status::Put)
    }

    /// 期望的块队列成员；`limit` 达到即停止。
    fn published_run(&self, limit: usize) -> Vec<Entry> {
        let mut run: Vec<Entry> = Vec::new();
        for entry in self
            .entries
            .iter()
            .copied()
            .skip_while(|entry| entry.status != Status::Put)
        {
            let total: usize = run.iter().map(|member| member.len).sum();
            let adjacent = run
                .last()
                .is_none_or(|last| last.offset + last.len == entry.offset);
            if total >= limit || entry.status != Status::Put || !adjacent {
                break;
            }
            run.push(entry);
        }
        run
    }

    fn used_bytes(&self) -> usize {
        self.entries.iter().map(|entry| entry.len).sum()
    }

    fn overlaps(&self, offset: usize, len: usize) -> bool {
        self.entries
            .iter()
            .any(|entry| offset < entry.offset + entry.len && entry.offset < offset + len)
    }
}

fn pick<T>(items: &mut Vec<T>, raw: usize) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items.swap_remove(raw % items.len()))
    }
}

fn run_ops(ops: &[Op]) -> Result<(), TestCaseError> {
    let rbb = RingBlockBuffer::create(CAPACITY, MAX_BLOCKS).expect("创建失败");
    let mut model = Model::default();
    let mut writers: Vec<(u8, WriteBlock<'_, SpinCritical>)> = Vec::new();
    let mut readers: Vec<(u8, ReadBlock<'_, SpinCritical>)> = Vec::new();
    let mut queues: Vec<(Vec<u8>, BlockQueue<'_, SpinCritical>)> = Vec::new();
    let mut next_id = 0u8;

    for op in ops {
        match *op {
            Op::Alloc(size) => match rbb.alloc(size) {
                Ok(mut block) => {
                    prop_assert!(block.offset() + block.len() <= CAPACITY);
                    prop_assert!(!model.overlaps(block.offset(), block.len()));
                    let id = next_id;
                    next_id = next_id.wrapping_add(1);
                    block.as_mut_slice().fill(id);
                    model.entries.push(Entry {
                        id,
                        offset: block.offset(),
                        len: block.len(),
                        status: Status::Inited,
                    });
                    writers.push((id, block));
                }
                Err(err) => prop_assert!(err.is_backpressure(), "意外错误: {err}"),
            },
            Op::Put(raw) => {
                if let Some((id, block)) = pick(&mut writers, raw) {
                    block.put();
                    model.set_status(id, Status::Put);
                }
            }
            Op::AbandonWriter(raw) => {
                if let Some((id, block)) = pick(&mut writers, raw) {
                    rbb.free(block).expect("同一缓冲");
                    model.remove(id);
                }
            }
            Op::Get => {
                let expected = model.oldest_published();
                match (rbb.get(), expected) {
                    (Some(block), Some(entry)) => {
                        prop_assert_eq!(block.offset(), entry.offset);
                        prop_assert!(block.as_slice().iter().all(|&byte| byte == entry.id));
                        model.set_status(entry.id, Status::Got);
                        readers.push((entry.id, block));
                    }
                    (None, None) => {}
                    (actual, expected) => {
                        return Err(TestCaseError::fail(format!(
                            "get 结果与模型不符: actual={actual:?} expected={expected:?}"
                        )));
                    }
                }
            }
            Op::Queue(target) => {
                let run = model.published_run(target);
                let available: usize = run.iter().map(|entry| entry.len).sum();
                match rbb.get_block_queue(target) {
                    Ok(queue) => {
                        prop_assert!(available >= target);
                        prop_assert_eq!(queue.len(), available);
                        prop_assert_eq!(queue.block_count(), run.len());
                        prop_assert_eq!(queue.offset(), run[0].offset);
                        let mut cursor = 0;
                        for entry in &run {
                            let bytes = &queue.as_slice()[cursor..cursor + entry.len];
                            prop_assert!(bytes.iter().all(|&byte| byte == entry.id));
                            cursor += entry.len;
                            model.set_status(entry.id, Status::Got);
                        }
                        queues.push((run.iter().map(|entry| entry.id).collect(), queue));
                    }
                    Err(err) => {
                        prop_assert!(available < target, "模型可组成 {available} 字节");
                        prop_assert_eq!(
                            err,
                            spark_rbb::RbbError::InsufficientData {
                                requested: target,
                                available
                            }
                        );
                    }
                }
            }
            Op::FreeReader(raw) => {
                if let Some((id, block)) = pick(&mut readers, raw) {
                    block.free();
                    model.remove(id);
                }
            }
            Op::FreeQueue(raw) => {
                if let Some((ids, queue)) = pick(&mut queues, raw) {
                    rbb.free_block_queue(queue).expect("同一缓冲");
                    for id in ids {
                        model.remove(id);
                    }
                }
            }
        }

        let stats = rbb.stats();
        prop_assert!(stats.used_bytes <= CAPACITY);
        prop_assert_eq!(stats.used_bytes, model.used_bytes());
        prop_assert_eq!(stats.pending_blocks, model.entries.len());
        prop_assert_eq!(
            stats.put_blocks,
            model
                .entries
                .iter()
                .filter(|entry| entry.status == Status::Put)
                .count()
        );
        prop_assert_eq!(
            rbb.next_block_queue_len(),
            model
                .published_run(usize::MAX)
                .iter()
                .map(|entry| entry.len)
                .sum::<usize>()
        );
    }

    for (id, block) in &writers {
        prop_assert!(block.as_slice().iter().all(|byte| byte == id));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_random_operations_respect_contract(ops in prop::collection::vec(op(), 1..64)) {
        run_ops(&ops)?;
    }
}
