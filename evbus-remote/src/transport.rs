//! 传输层（Transport）
//!
//! 将一次协议调用映射为带 Bearer 认证的 JSON POST 请求；
//! 连接类瞬时错误按固定间隔重试有限次数，重试耗尽后作为普通错误返回。
//!
use async_trait::async_trait;
use evbus_domain::error::{BusError, BusResult};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;

/// 协议调用通道
#[async_trait]
pub trait Transport: Send + Sync {
    /// 向 `path` 发送 JSON 请求体（可为空），返回 JSON 响应；空响应体返回 `Value::Null`
    async fn post(&self, path: &str, body: Option<Value>) -> BusResult<Value>;
}

/// 瞬时错误重试策略
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// 基于 reqwest 的 HTTP 传输
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// 创建传输；`token` 为空时报配置错误
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> BusResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(BusError::config("token is required"));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn is_transient(err: &reqwest::Error) -> bool {
        err.is_connect() || err.is_timeout()
    }

    async fn read(url: &str, response: reqwest::Response) -> BusResult<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BusError::transport(format!("{url}: {e}")))?;

        if !status.is_success() {
            let message = if text.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                text
            };
            return Err(BusError::Http {
                status: status.as_u16(),
                message: format!("{url} - {message}"),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, path: &str, body: Option<Value>) -> BusResult<Value> {
        let url = format!("{}/{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .header(CONTENT_TYPE, "application/json");
            if let Some(body) = &body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => return Self::read(&url, response).await,
                Err(err) if Self::is_transient(&err) && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        url = %url,
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %err,
                        "transient transport error, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    tracing::error!(url = %url, error = %err, "request failed");
                    return Err(BusError::transport(format!("{url}: {err}")));
                }
            }
        }
    }
}
