use serde::Deserialize;

use crate::error::RbbError;

/// 堆分配环形块缓冲的构造参数。
///
/// # 教案式说明
/// - **意图 (Why)**：驱动或日志子系统通常在启动配置中声明缓冲规模，以结构体 + serde 反序列化承载，
///   避免在各处散落魔数；
/// - **契约 (What)**：
///   - `buffer_size`：竞技场字节数，必须大于 0；
///   - `max_blocks`：描述符槽位数，即同时处于待处理状态的块数上限，必须大于 0；
///   - `alignment`：块长度与块起始偏移的对齐，必须为 2 的幂，缺省为 1；
/// - **执行 (How)**：[`RbbConfig::validate`] 在 `create_with` 入口统一调用，非法配置返回
///   [`RbbError::InvalidConfig`]，不会分配任何内存。
///
/// ```
/// # #[cfg(feature = "std")] {
/// use spark_rbb::RbbConfig;
///
/// let config = RbbConfig::from_toml_str("buffer_size = 1024\nmax_blocks = 16\nalignment = 4")
///     .expect("合法配置");
/// assert_eq!(config, RbbConfig::new(1024, 16).with_alignment(4));
/// # }
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RbbConfig {
    pub buffer_size: usize,
    pub max_blocks: usize,
    #[serde(default = "default_alignment")]
    pub alignment: usize,
}

const fn default_alignment() -> usize {
    1
}

impl RbbConfig {
    pub const fn new(buffer_size: usize, max_blocks: usize) -> Self {
        Self {
            buffer_size,
            max_blocks,
            alignment: default_alignment(),
        }
    }

    pub const fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// 校验参数，返回首个不满足的约束。
    pub fn validate(&self) -> Result<(), RbbError> {
        if self.buffer_size == 0 {
            return Err(RbbError::InvalidConfig {
                reason: "buffer must not be empty",
            });
        }
        if self.max_blocks == 0 {
            return Err(RbbError::InvalidConfig {
                reason: "block descriptor pool must not be empty",
            });
        }
        if !self.alignment.is_power_of_two() {
            return Err(RbbError::InvalidConfig {
                reason: "alignment must be a power of two",
            });
        }
        Ok(())
    }

    /// 从 TOML 文本解析并校验。
    #[cfg(feature = "std")]
    pub fn from_toml_str(text: &str) -> Result<Self, RbbError> {
        let config: RbbConfig = toml::from_str(text).map_err(|err| RbbError::ConfigParse {
            detail: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}
