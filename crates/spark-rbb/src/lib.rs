#![cfg_attr(not(any(feature = "std", test)), no_std)]

//! `spark-rbb` 提供零拷贝的环形块缓冲（Ring Block Buffer，RBB）。
//!
//! # 模块定位（Why）
//! - 面向 DMA 接收、异步日志、压缩帧流水线等“生产者写入变长块、消费者批量取走”的设备缓冲；
//! - 块在固定竞技场中原地分配与读取，描述符来自固定容量的槽位池，热路径上不访问堆。
//!
//! # 设计概要（How）
//! - [`RingBlockBuffer`] 维护按分配顺序串联的待处理链表，只依据首尾两块决定新块落在游标处
//!   还是回绕到基址；
//! - 块生命周期 `Unused -> Inited -> Put -> Got -> Unused` 由句柄类型表达：
//!   [`WriteBlock`]（生产者）、[`ReadBlock`]（单块消费者）、[`BlockQueue`]（相邻多块消费者）；
//! - 同步由注入的 [`CriticalSection`] 提供：[`SpinCritical`]（默认）、[`Cooperative`]（单线程），
//!   以及开启 `critical-section` 特性后的 `InterruptCritical`（屏蔽中断）。
//!
//! # 特性开关
//! - `std`（默认）：启用 `thiserror` 派生的错误实现与 TOML 配置解析，隐含 `alloc`；
//! - `alloc`：启用堆分配的 `create`/`create_with`；
//! - `critical-section`：启用 `InterruptCritical`；
//! - `loom-model`：供 loom 模型测试使用。
//!
//! ```
//! # #[cfg(feature = "alloc")] {
//! use spark_rbb::RingBlockBuffer;
//!
//! let rbb = RingBlockBuffer::create(128, 8).expect("创建失败");
//! let mut block = rbb.alloc(4).expect("空间充足");
//! block.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
//! block.put();
//!
//! let read = rbb.get().expect("存在已发布块");
//! assert_eq!(read.as_slice(), &[1, 2, 3, 4]);
//! read.free();
//! assert_eq!(rbb.stats().pending_blocks, 0);
//! # }
//! ```

#[cfg(feature = "alloc")]
extern crate alloc;

mod block;
mod config;
mod critical;
mod error;
mod layout;
mod pending;
mod queue;
mod rbb;
mod slot;
mod stats;
mod storage;

pub use block::{BlockHandle, ReadBlock, WriteBlock};
pub use config::RbbConfig;
#[cfg(feature = "critical-section")]
pub use critical::InterruptCritical;
pub use critical::{Cooperative, CriticalSection, SpinCritical};
pub use error::{ErrorKind, RbbError};
pub use queue::BlockQueue;
pub use rbb::RingBlockBuffer;
pub use slot::{BlockSlot, BlockStatus};
pub use stats::RbbStats;
