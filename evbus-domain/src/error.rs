//! 事件总线统一错误定义
//!
//! 覆盖发布入参、存储后端、传输、加解密与配置等最小必要集合，
//! 便于各后端实现统一转换为 `BusError`。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BusError {
    // --- 调用方入参 ---
    #[error("event id is required")]
    EventIdRequired,

    // --- 存储/传输 ---
    #[error("event store error: {reason}")]
    Store { reason: String },
    #[error("transport error: {reason}")]
    Transport { reason: String },
    #[error("http error: status={status}, message={message}")]
    Http { status: u16, message: String },

    // --- 序列化/加解密 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("cipher error: {reason}")]
    Cipher { reason: String },

    // --- 配置 ---
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl BusError {
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn cipher(reason: impl Into<String>) -> Self {
        Self::Cipher {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type BusResult<T> = Result<T, BusError>;
