//! 日志帧编解码。
//!
//! # 帧布局（What）
//! ```text
//! +-------+-----+-------------+---------------+----------------+---------+-------------+
//! | magic | raw | level u16LE | tag_len u16LE | msg_len u32LE  | tag ... | message ... |
//! +-------+-----+-------------+---------------+----------------+---------+-------------+
//! ```
//! - `magic` 固定为 `0x10`，用来识别未被完整写入的块；
//! - 块长度按对齐取整，帧之后的填充字节在解码时忽略。

use core::fmt;

use bytes::{Buf, BufMut};

use crate::error::FrameError;

pub(crate) const FRAME_MAGIC: u8 = 0x10;

/// 帧头长度（字节）。
pub const HEADER_LEN: usize = 1 + 1 + 2 + 2 + 4;

/// 日志级别，数值越小越严重。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u16)]
pub enum Level {
    Emerg = 0,
    Alert = 1,
    Crit = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Level {
    /// 输出行前缀，如 `E/`。
    pub const fn prefix(self) -> &'static str {
        match self {
            Level::Emerg => "EM/",
            Level::Alert => "A/",
            Level::Crit => "C/",
            Level::Error => "E/",
            Level::Warning => "W/",
            Level::Notice => "N/",
            Level::Info => "I/",
            Level::Debug => "D/",
        }
    }

    pub const fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => Level::Emerg,
            1 => Level::Alert,
            2 => Level::Crit,
            3 => Level::Error,
            4 => Level::Warning,
            5 => Level::Notice,
            6 => Level::Info,
            7 => Level::Debug,
            _ => return None,
        })
    }
}

/// 一条日志记录。解码得到的记录借用块内存，输出完毕后块才会释放。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LogRecord<'a> {
    pub level: Level,
    pub tag: &'a str,
    pub raw: bool,
    pub message: &'a str,
}

impl LogRecord<'_> {
    /// 编码后的帧长度。
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.tag.len() + self.message.len()
    }

    /// 编码到 `dst` 开头；`dst` 长度至少为 [`LogRecord::encoded_len`]。
    ///
    /// 标签长度超过 `u16::MAX` 时由调用方预先截断。
    pub(crate) fn encode(&self, mut dst: &mut [u8]) {
        debug_assert!(dst.len() >= self.encoded_len());
        dst.put_u8(FRAME_MAGIC);
        dst.put_u8(u8::from(self.raw));
        dst.put_u16_le(self.level as u16);
        dst.put_u16_le(self.tag.len() as u16);
        dst.put_u32_le(self.message.len() as u32);
        dst.put_slice(self.tag.as_bytes());
        dst.put_slice(self.message.as_bytes());
    }

    /// 从块内容解码一帧。
    pub fn decode(mut src: &[u8]) -> Result<LogRecord<'_>, FrameError> {
        if src.remaining() < HEADER_LEN {
            return Err(FrameError::Truncated {
                needed: HEADER_LEN,
                available: src.remaining(),
            });
        }
        let magic = src.get_u8();
        if magic != FRAME_MAGIC {
            return Err(FrameError::BadMagic { found: magic });
        }
        let raw = src.get_u8() != 0;
        let level = src.get_u16_le();
        let level = Level::from_u16(level).ok_or(FrameError::UnknownLevel(level))?;
        let tag_len = usize::from(src.get_u16_le());
        let message_len = src.get_u32_le() as usize;

        let body = tag_len + message_len;
        if src.len() < body {
            return Err(FrameError::Truncated {
                needed: HEADER_LEN + body,
                available: HEADER_LEN + src.len(),
            });
        }
        let (tag, rest) = src.split_at(tag_len);
        let message = &rest[..message_len];
        Ok(LogRecord {
            level,
            tag: core::str::from_utf8(tag).map_err(|_| FrameError::InvalidUtf8)?,
            raw,
            message: core::str::from_utf8(message).map_err(|_| FrameError::InvalidUtf8)?,
        })
    }
}

/// 非原始记录输出为 `<前缀><标签>: <消息>`，原始记录只输出消息本身。
impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw {
            f.write_str(self.message)
        } else {
            write!(f, "{}{}: {}", self.level.prefix(), self.tag, self.message)
        }
    }
}

/// 把 `text` 截断到不超过 `max` 字节的最近字符边界。
pub(crate) fn truncate_str(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
