use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use spark_rbb::{RbbStats, RingBlockBuffer, SpinCritical};
use tracing::{debug, warn};

use crate::{
    backend::LogBackend,
    config::AsyncLogConfig,
    error::LogError,
    frame::{Level, LogRecord, truncate_str},
};

/// `submit` 的结果。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    /// 记录已发布，等待排空。
    Queued,
    /// 队列背压，记录被丢弃。
    Dropped,
}

/// 以环形块缓冲为队列的异步日志输出。
///
/// # 模块角色（Why）
/// - 日志调用点（包括中断或高优先级任务）只做一次编码拷贝即返回，真正的后端输出
///   （串口、文件、网络）推迟到低优先级上下文中由 [`AsyncLogger::drain`] 完成；
/// - 每条记录占用一个块，块内就是编码后的帧，排空时原地解码，不再拷贝。
///
/// # 契约说明（What）
/// - **顺序**：单个生产者提交的记录按提交顺序输出；
/// - **背压**：队列满时记录被丢弃并计数，整个生命周期内只告警一次，避免告警本身刷屏；
/// - **截断**：标签与消息合计不超过 `line_size` 字节；标签先占额度，消息取剩余部分，
///   均在字符边界处截断。因此 `validate` 通过的配置下，每次提交只会入队或被丢弃。
///
/// # 设计权衡（Trade-offs）
/// - 等待与唤醒（信号量、后台任务）不在本结构内，调用方按自身调度模型决定何时排空。
#[derive(Debug)]
pub struct AsyncLogger {
    queue: RingBlockBuffer<'static>,
    line_size: usize,
    dropped: AtomicUsize,
    overflow_reported: AtomicBool,
}

impl AsyncLogger {
    pub fn new(config: &AsyncLogConfig) -> Result<Self, LogError> {
        config.validate()?;
        let queue = RingBlockBuffer::create_with(&config.rbb_config()?, SpinCritical::new())?;
        Ok(Self {
            queue,
            line_size: config.line_size,
            dropped: AtomicUsize::new(0),
            overflow_reported: AtomicBool::new(false),
        })
    }

    /// 编码并发布一条记录。
    ///
    /// 队列背压时返回 `Ok(SubmitOutcome::Dropped)`。帧长受 `line_size` 约束，
    /// 底层的其它错误只会在缓冲自身状态异常时出现，原样返回。
    pub fn submit(
        &self,
        level: Level,
        tag: &str,
        raw: bool,
        message: &str,
    ) -> Result<SubmitOutcome, LogError> {
        let tag = truncate_str(tag, self.line_size.min(usize::from(u16::MAX)));
        let record = LogRecord {
            level,
            tag,
            raw,
            message: truncate_str(message, self.line_size - tag.len()),
        };

        match self.queue.alloc(record.encoded_len()) {
            Ok(mut block) => {
                record.encode(block.as_mut_slice());
                block.put();
                Ok(SubmitOutcome::Queued)
            }
            Err(err) if err.is_backpressure() => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if !self.overflow_reported.swap(true, Ordering::Relaxed) {
                    warn!(
                        dropped,
                        code = err.code(),
                        "async log buffer is full, records are being dropped; consider a larger buffer_size"
                    );
                }
                Ok(SubmitOutcome::Dropped)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// 依次取出已发布的记录交给后端，返回成功输出的条数。
    ///
    /// 帧头损坏的块被跳过并释放，不会阻塞后续记录。
    pub fn drain<B: LogBackend>(&self, mut backend: B) -> usize {
        let mut delivered = 0;
        while let Some(block) = self.queue.get() {
            match LogRecord::decode(block.as_slice()) {
                Ok(record) => {
                    backend.output(&record);
                    delivered += 1;
                }
                Err(err) => debug!(code = err.code(), error = %err, "skipping damaged log frame"),
            }
        }
        delivered
    }

    /// 排空后调用后端 `flush`。
    pub fn flush<B: LogBackend>(&self, mut backend: B) -> usize {
        let delivered = self.drain(&mut backend);
        backend.flush();
        delivered
    }

    /// 因背压被丢弃的记录数。
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 底层队列的统计快照。
    pub fn stats(&self) -> RbbStats {
        self.queue.stats()
    }
}
