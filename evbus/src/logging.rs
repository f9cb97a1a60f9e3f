use crate::config::LogLevel;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 安装全局 fmt 订阅器。
///
/// `RUST_LOG` 存在时优先，否则使用 `level`；已安装过订阅器时静默忽略。
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_harmless() {
        init_tracing(LogLevel::Debug);
        init_tracing(LogLevel::Error);
        tracing::info!("still logging");
    }
}
