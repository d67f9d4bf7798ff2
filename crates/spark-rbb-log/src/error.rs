use spark_rbb::RbbError;
use thiserror::Error;

/// 异步日志队列的错误。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“配置不合法”“底层环形块缓冲拒绝”“帧无法解码”三类问题，
///   调用方据此决定是修正配置、丢弃记录还是跳过坏帧；
/// - **契约 (What)**：`code()` 返回稳定的点分错误码，与 `spark-rbb` 的 `rbb.*` 码并列；
/// - **执行 (How)**：底层错误以 `#[from]` 透传，保留原始错误码。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LogError {
    #[error("invalid async log configuration: {reason}")]
    InvalidConfig { reason: &'static str },
    #[error("failed to parse async log configuration: {detail}")]
    ConfigParse { detail: String },
    #[error(transparent)]
    Buffer(#[from] RbbError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl LogError {
    pub fn code(&self) -> &'static str {
        match self {
            LogError::InvalidConfig { .. } => "rbb_log.config.invalid",
            LogError::ConfigParse { .. } => "rbb_log.config.parse",
            LogError::Buffer(err) => err.code(),
            LogError::Frame(err) => err.code(),
        }
    }
}

/// 日志帧解码失败的原因。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame magic {found:#04x} does not match")]
    BadMagic { found: u8 },
    #[error("frame needs {needed} bytes but block holds {available}")]
    Truncated { needed: usize, available: usize },
    #[error("unknown log level {0}")]
    UnknownLevel(u16),
    #[error("frame text is not valid UTF-8")]
    InvalidUtf8,
}

impl FrameError {
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::BadMagic { .. } => "rbb_log.frame.bad_magic",
            FrameError::Truncated { .. } => "rbb_log.frame.truncated",
            FrameError::UnknownLevel(_) => "rbb_log.frame.unknown_level",
            FrameError::InvalidUtf8 => "rbb_log.frame.invalid_utf8",
        }
    }
}
