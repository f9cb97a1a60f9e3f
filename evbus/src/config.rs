//! 总线配置
//!
//! 两类后端各有一组选项，均可由 builder 构造或经 serde 反序列化；
//! 远端选项另支持从环境变量读取（会先加载当前目录下的 `.env`）。
//!
use bon::Builder;
use evbus_domain::error::{BusError, BusResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://nixbus.com/api/v1";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 日志级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "error" => Ok(LogLevel::Error),
            other => Err(BusError::config(format!("unknown log level: {other}"))),
        }
    }
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

/// 内存总线选项
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct InMemoryBusOptions {
    #[builder(default)]
    #[serde(default)]
    pub log: LogLevel,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl Default for InMemoryBusOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// 远端总线选项
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct RemoteBusOptions {
    #[builder(into)]
    pub token: String,
    /// 启用客户端加密时必填
    #[builder(into)]
    #[serde(default)]
    pub passphrase: Option<String>,
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub client_encryption: bool,
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[builder(default)]
    #[serde(default)]
    pub log: LogLevel,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl RemoteBusOptions {
    /// 从环境变量读取：`EVBUS_TOKEN`（必填）、`EVBUS_PASSPHRASE`、`EVBUS_BASE_URL`、
    /// `EVBUS_CLIENT_ENCRYPTION`、`EVBUS_LOG`
    pub fn from_env() -> BusResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BusResult<Self> {
        let token = lookup("EVBUS_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BusError::config("EVBUS_TOKEN must be set"))?;

        let client_encryption = match lookup("EVBUS_CLIENT_ENCRYPTION") {
            Some(raw) => parse_bool(&raw)?,
            None => true,
        };
        let log = match lookup("EVBUS_LOG") {
            Some(raw) => raw.parse()?,
            None => LogLevel::default(),
        };

        Ok(Self::builder()
            .token(token)
            .maybe_passphrase(lookup("EVBUS_PASSPHRASE"))
            .client_encryption(client_encryption)
            .base_url(lookup("EVBUS_BASE_URL").unwrap_or_else(default_base_url))
            .log(log)
            .build())
    }

    /// 构造前的校验：token 必填，启用加密时 passphrase 必填
    pub fn validate(&self) -> BusResult<()> {
        if self.token.trim().is_empty() {
            return Err(BusError::config("token is required"));
        }
        if self.client_encryption
            && self.passphrase.as_deref().is_none_or(|p| p.is_empty())
        {
            return Err(BusError::config(
                "passphrase is required when client encryption is enabled",
            ));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> BusResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BusError::config(format!("invalid boolean: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn builder_defaults() {
        let opts = RemoteBusOptions::builder().token("t").build();
        assert!(opts.client_encryption);
        assert_eq!(opts.base_url, DEFAULT_BASE_URL);
        assert_eq!(opts.log, LogLevel::Info);
        assert_eq!(opts.poll_interval, Duration::from_secs(1));
        assert_eq!(opts.passphrase, None);
    }

    #[test]
    fn env_requires_token() {
        let err = RemoteBusOptions::from_lookup(env(&[])).unwrap_err();
        assert!(matches!(err, BusError::Config { .. }));
    }

    #[test]
    fn env_reads_every_key() {
        let opts = RemoteBusOptions::from_lookup(env(&[
            ("EVBUS_TOKEN", "tok"),
            ("EVBUS_PASSPHRASE", "pass"),
            ("EVBUS_BASE_URL", "http://localhost:8080/api/v1"),
            ("EVBUS_CLIENT_ENCRYPTION", "false"),
            ("EVBUS_LOG", "DEBUG"),
        ]))
        .unwrap();

        assert_eq!(opts.token, "tok");
        assert_eq!(opts.passphrase.as_deref(), Some("pass"));
        assert_eq!(opts.base_url, "http://localhost:8080/api/v1");
        assert!(!opts.client_encryption);
        assert_eq!(opts.log, LogLevel::Debug);
    }

    #[test]
    fn env_rejects_bad_values() {
        assert!(
            RemoteBusOptions::from_lookup(env(&[
                ("EVBUS_TOKEN", "tok"),
                ("EVBUS_CLIENT_ENCRYPTION", "maybe"),
            ]))
            .is_err()
        );
        assert!(
            RemoteBusOptions::from_lookup(env(&[("EVBUS_TOKEN", "tok"), ("EVBUS_LOG", "trace")]))
                .is_err()
        );
    }

    #[test]
    fn encryption_without_passphrase_is_invalid() {
        let opts = RemoteBusOptions::builder().token("t").build();
        assert!(opts.validate().is_err());

        let opts = RemoteBusOptions::builder()
            .token("t")
            .client_encryption(false)
            .build();
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let opts: RemoteBusOptions =
            serde_json::from_value(serde_json::json!({"token": "t", "log": "error"})).unwrap();
        assert!(opts.client_encryption);
        assert_eq!(opts.log, LogLevel::Error);
        assert_eq!(opts.base_url, DEFAULT_BASE_URL);

        let opts: InMemoryBusOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(opts, InMemoryBusOptions::default());
    }
}
