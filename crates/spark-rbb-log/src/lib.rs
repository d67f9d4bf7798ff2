//! `spark-rbb-log` 把日志输出从调用点解耦为“编码入队 + 异步排空”两步。
//!
//! # 模块定位（Why）
//! - 嵌入式与低延迟服务中，日志后端（串口、闪存、网络）往往比日志调用慢几个数量级；
//!   直接同步输出会让高优先级路径被慢设备拖住；
//! - 本 crate 以 `spark-rbb` 的环形块缓冲为队列：每条记录一个块，块内即帧，全程不再二次拷贝。
//!
//! # 设计概要（How）
//! - [`AsyncLogger::submit`]：把标签与消息截断到行长、按帧长分配块、编码、发布；背压时丢弃并计数；
//! - [`AsyncLogger::drain`]/[`AsyncLogger::flush`]：按入队顺序取出、解码、交给 [`LogBackend`]；
//! - [`TracingBackend`] 把记录桥接为 `tracing` 事件，便于接入已有订阅者。
//!
//! ```
//! use spark_rbb_log::{AsyncLogConfig, AsyncLogger, Level, LogBackend, LogRecord};
//!
//! struct Lines(Vec<String>);
//!
//! impl LogBackend for Lines {
//!     fn output(&mut self, record: &LogRecord<'_>) {
//!         self.0.push(record.to_string());
//!     }
//! }
//!
//! let logger = AsyncLogger::new(&AsyncLogConfig::default()).expect("缺省配置合法");
//! logger.submit(Level::Info, "boot", false, "ready").expect("入队");
//!
//! let mut lines = Lines(Vec::new());
//! assert_eq!(logger.flush(&mut lines), 1);
//! assert_eq!(lines.0, ["I/boot: ready"]);
//! ```

mod backend;
mod config;
mod error;
mod frame;
mod logger;

pub use backend::{LogBackend, TracingBackend};
pub use config::AsyncLogConfig;
pub use error::{FrameError, LogError};
pub use frame::{HEADER_LEN, Level, LogRecord};
pub use logger::{AsyncLogger, SubmitOutcome};
