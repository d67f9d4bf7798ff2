use crate::frame::{Level, LogRecord};

/// 日志输出后端，由排空方按入队顺序逐条调用。
///
/// # 契约说明（What）
/// - `output` 收到的记录借用队列内存，调用返回后即失效，需要保留时自行拷贝；
/// - `flush` 在 [`crate::AsyncLogger::flush`] 排空之后调用，缺省为空操作。
pub trait LogBackend {
    fn output(&mut self, record: &LogRecord<'_>);

    fn flush(&mut self) {}
}

impl<B: LogBackend + ?Sized> LogBackend for &mut B {
    fn output(&mut self, record: &LogRecord<'_>) {
        (**self).output(record);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// 把排队记录转发为 `tracing` 事件的后端。
///
/// 级别映射：`Emerg`..`Error` 为 `ERROR`，`Warning` 为 `WARN`，`Notice`/`Info` 为 `INFO`，
/// `Debug` 为 `DEBUG`。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingBackend;

impl LogBackend for TracingBackend {
    fn output(&mut self, record: &LogRecord<'_>) {
        let (tag, raw, message) = (record.tag, record.raw, record.message);
        match record.level {
            Level::Emerg | Level::Alert | Level::Crit | Level::Error => {
                tracing::error!(target: "spark_rbb_log", tag, raw, prefix = record.level.prefix(), "{message}");
            }
            Level::Warning => tracing::warn!(target: "spark_rbb_log", tag, raw, "{message}"),
            Level::Notice | Level::Info => {
                tracing::info!(target: "spark_rbb_log", tag, raw, "{message}");
            }
            Level::Debug => tracing::debug!(target: "spark_rbb_log", tag, raw, "{message}"),
        }
    }
}
