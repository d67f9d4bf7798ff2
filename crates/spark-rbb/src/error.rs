//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为环形块缓冲对外暴露的失败语义提供集中定义；
//! - 区分“背压”（正常负载下可预期、调用方应退避或丢弃）与“契约违规”（调用方编程错误），
//!   便于上层驱动选择重试、丢包或直接告警。
//!
//! ## 设计要求（What）
//! - 启用 `std` 时派生 `thiserror::Error`，无 `std` 时手写 `Display`，保持 `no_std` 可用；
//! - 每个变体都有稳定的点分错误码（`rbb.*`），便于日志检索与跨语言对齐；
//! - 任何可恢复条件都以返回值传播，库内部不 panic。

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(feature = "std")]
use thiserror::Error;

/// 错误的处理类别。
///
/// - `Backpressure`：容量暂时不足，稍后重试或缩小请求即可恢复；
/// - `Contract`：调用方违反前置条件，重试无意义；
/// - `Resource`：构造阶段的堆内存耗尽。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Backpressure,
    Contract,
    Resource,
}

/// 环形块缓冲错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：断言处理参数错误、空指针表达容量不足时，两类情形在调用点无法区分；
///   此处都提升为带上下文的枚举，调用方可通过 [`RbbError::kind`] 直接决策。
/// - **契约 (What)**：
///   - 所有变体均满足 `Send + Sync + 'static`；
///   - 背压类变体携带“请求量 / 当前可用量”，供调用方估算退避策略；
///   - [`RbbError::code`] 返回的字符串在版本间保持稳定。
/// - **设计权衡 (Trade-offs)**：`ConfigParse` 需要保存解析器给出的文本，仅在 `std` 下存在；
///   其余变体均不分配，以便在中断上下文中构造。
#[cfg_attr(feature = "std", derive(Error))]
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RbbError {
    /// 初始化参数不合法（空缓冲、空描述符数组、非 2 的幂对齐、缓冲基址未对齐等）。
    #[cfg_attr(feature = "std", error("invalid ring block buffer configuration: {reason}"))]
    InvalidConfig { reason: &'static str },

    /// 申请长度为 0，或按对齐取整后超过缓冲总容量。
    #[cfg_attr(
        feature = "std",
        error("block size {requested} is outside 1..={capacity}")
    )]
    InvalidBlockSize { requested: usize, capacity: usize },

    /// `get_block_queue` 的目标长度为 0。
    #[cfg_attr(feature = "std", error("block queue target length must be non-zero"))]
    InvalidQueueLength,

    /// 游标处的连续空闲区不足以容纳请求。
    #[cfg_attr(
        feature = "std",
        error("no contiguous space for {requested} bytes, largest free run is {contiguous}")
    )]
    NoSpace { requested: usize, contiguous: usize },

    /// 描述符池已全部处于占用状态。
    #[cfg_attr(
        feature = "std",
        error("all {max_blocks} block descriptors are in use")
    )]
    DescriptorsExhausted { max_blocks: usize },

    /// 连续的已发布块总长不足以组成目标长度的块队列，未产生任何副作用。
    #[cfg_attr(
        feature = "std",
        error("block queue needs {requested} bytes, only {available} contiguous bytes are published")
    )]
    InsufficientData { requested: usize, available: usize },

    /// 传入的块句柄属于另一个环形块缓冲。
    #[cfg_attr(feature = "std", error("block handle belongs to another ring block buffer"))]
    ForeignBlock,

    /// `create` 过程中堆分配失败，已申请的部分全部归还。
    #[cfg_attr(feature = "std", error("out of memory while allocating {bytes} bytes"))]
    OutOfMemory { bytes: usize },

    /// TOML 配置解析失败。
    #[cfg(feature = "std")]
    #[error("failed to parse ring block buffer config: {detail}")]
    ConfigParse { detail: String },
}

impl RbbError {
    /// 返回错误所属的处理类别。
    pub fn kind(&self) -> ErrorKind {
        match self {
            RbbError::NoSpace { .. }
            | RbbError::DescriptorsExhausted { .. }
            | RbbError::InsufficientData { .. } => ErrorKind::Backpressure,
            RbbError::OutOfMemory { .. } => ErrorKind::Resource,
            RbbError::InvalidConfig { .. }
            | RbbError::InvalidBlockSize { .. }
            | RbbError::InvalidQueueLength
            | RbbError::ForeignBlock => ErrorKind::Contract,
            #[cfg(feature = "std")]
            RbbError::ConfigParse { .. } => ErrorKind::Contract,
        }
    }

    /// 是否为背压类错误。
    #[inline]
    pub fn is_backpressure(&self) -> bool {
        self.kind() == ErrorKind::Backpressure
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            RbbError::InvalidConfig { .. } => "rbb.init.invalid_config",
            RbbError::InvalidBlockSize { .. } => "rbb.alloc.invalid_size",
            RbbError::InvalidQueueLength => "rbb.queue.invalid_length",
            RbbError::NoSpace { .. } => "rbb.alloc.no_space",
            RbbError::DescriptorsExhausted { .. } => "rbb.alloc.no_descriptor",
            RbbError::InsufficientData { .. } => "rbb.queue.insufficient",
            RbbError::ForeignBlock => "rbb.block.foreign",
            RbbError::OutOfMemory { .. } => "rbb.create.out_of_memory",
            #[cfg(feature = "std")]
            RbbError::ConfigParse { .. } => "rbb.config.parse",
        }
    }
}

#[cfg(not(feature = "std"))]
impl fmt::Display for RbbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RbbError::InvalidConfig { reason } => {
                write!(f, "invalid ring block buffer configuration: {reason}")
            }
            RbbError::InvalidBlockSize {
                requested,
                capacity,
            } => write!(f, "block size {requested} is outside 1..={capacity}"),
            RbbError::InvalidQueueLength => {
                f.write_str("block queue target length must be non-zero")
            }
            RbbError::NoSpace {
                requested,
                contiguous,
            } => write!(
                f,
                "no contiguous space for {requested} bytes, largest free run is {contiguous}"
            ),
            RbbError::DescriptorsExhausted { max_blocks } => {
                write!(f, "all {max_blocks} block descriptors are in use")
            }
            RbbError::InsufficientData {
                requested,
                available,
            } => write!(
                f,
                "block queue needs {requested} bytes, only {available} contiguous bytes are published"
            ),
            RbbError::ForeignBlock => {
                f.write_str("block handle belongs to another ring block buffer")
            }
            RbbError::OutOfMemory { bytes } => {
                write!(f, "out of memory while allocating {bytes} bytes")
            }
        }
    }
}
