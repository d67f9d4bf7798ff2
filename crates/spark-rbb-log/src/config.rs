use serde::Deserialize;
use spark_rbb::RbbConfig;

use crate::{error::LogError, frame::HEADER_LEN};

/// 异步日志队列的规模参数。
///
/// # 教案式说明
/// - **意图 (Why)**：日志生产频率远高于后端输出速率时，队列规模决定了能吸收多大的突发；
/// - **契约 (What)**：
///   - `buffer_size`：竞技场字节数，缺省 2048，构造时按 `alignment` 向上取整；
///   - `line_size`：单条记录标签加消息的最大字节数，缺省 256，超出部分被截断；
///   - `store_lines`：描述符数，即最多同时排队的记录数；缺省按
///     `buffer_size * 3 / 2 / line_size` 推算，必须不小于 2；
///   - `alignment`：每帧占用长度的对齐，缺省 4；
/// - **执行 (How)**：[`AsyncLogConfig::rbb_config`] 把以上参数折算为底层 [`RbbConfig`]。
///
/// ```
/// use spark_rbb_log::AsyncLogConfig;
///
/// let config = AsyncLogConfig::from_toml_str("buffer_size = 4096\nline_size = 128")
///     .expect("合法配置");
/// assert_eq!(config.store_lines(), 48);
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AsyncLogConfig {
    pub buffer_size: usize,
    pub line_size: usize,
    pub store_lines: Option<usize>,
    pub alignment: usize,
}

impl Default for AsyncLogConfig {
    fn default() -> Self {
        Self {
            buffer_size: 2048,
            line_size: 256,
            store_lines: None,
            alignment: 4,
        }
    }
}

impl AsyncLogConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, LogError> {
        let config: AsyncLogConfig = toml::from_str(text).map_err(|err| LogError::ConfigParse {
            detail: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 排队记录数上限；`line_size` 为 0 或推算溢出时按 0 处理，由 `validate` 拒绝。
    pub fn store_lines(&self) -> usize {
        self.store_lines.unwrap_or_else(|| {
            self.line_size
                .checked_mul(2)
                .and_then(|divisor| self.buffer_size.saturating_mul(3).checked_div(divisor))
                .unwrap_or(0)
        })
    }

    pub fn validate(&self) -> Result<(), LogError> {
        if self.line_size == 0 {
            return Err(LogError::InvalidConfig {
                reason: "line size must not be zero",
            });
        }
        if self.store_lines() < 2 {
            return Err(LogError::InvalidConfig {
                reason: "at least two log lines must fit in the queue",
            });
        }
        if HEADER_LEN
            .checked_add(self.line_size)
            .is_none_or(|frame| frame > self.buffer_size)
        {
            return Err(LogError::InvalidConfig {
                reason: "a full log line must fit in the buffer",
            });
        }
        self.rbb_config()?.validate()?;
        Ok(())
    }

    pub(crate) fn rbb_config(&self) -> Result<RbbConfig, LogError> {
        let buffer_size = match self.alignment {
            0 => Some(self.buffer_size),
            alignment => self.buffer_size.checked_next_multiple_of(alignment),
        }
        .ok_or(LogError::InvalidConfig {
            reason: "buffer size overflows when rounded to alignment",
        })?;
        Ok(RbbConfig::new(buffer_size, self.store_lines()).with_alignment(self.alignment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_store_lines() {
        let config = AsyncLogConfig::default();
        assert_eq!(config.store_lines(), 12);
        config.validate().expect("缺省配置必须合法");
    }

    #[test]
    fn buffer_size_is_rounded_to_alignment() {
        let config = AsyncLogConfig {
            buffer_size: 1022,
            line_size: 64,
            store_lines: Some(4),
            alignment: 8,
        };
        assert_eq!(
            config.rbb_config().expect("未溢出"),
            RbbConfig::new(1024, 4).with_alignment(8)
        );
    }

    #[test]
    fn oversized_fields_are_rejected_instead_of_overflowing() {
        let huge_line = AsyncLogConfig {
            line_size: usize::MAX,
            ..AsyncLogConfig::default()
        };
        assert_eq!(huge_line.store_lines(), 0);
        assert_eq!(
            huge_line.validate().unwrap_err().code(),
            "rbb_log.config.invalid"
        );

        let unroundable = AsyncLogConfig {
            buffer_size: usize::MAX,
            line_size: 64,
            store_lines: Some(4),
            alignment: 8,
        };
        assert!(matches!(
            unroundable.rbb_config(),
            Err(LogError::InvalidConfig { .. })
        ));
        assert_eq!(
            unroundable.validate().unwrap_err().code(),
            "rbb_log.config.invalid"
        );
    }

    #[test]
    fn rejects_tiny_queues() {
        let config = AsyncLogConfig {
            buffer_size: 256,
            line_size: 256,
            ..AsyncLogConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err().code(),
            "rbb_log.config.invalid"
        );

        let err = AsyncLogConfig::from_toml_str("alignment = 3").unwrap_err();
        assert_eq!(err.code(), "rbb.init.invalid_config");
    }
}
