use std::env;
use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter used when `RUST_LOG` is not set (e.g. "debug", "warn")
    pub level: String,
    /// Whether to use structured JSON format for logs
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Directive in effect: `RUST_LOG` wins over the configured level.
    pub fn directive(&self) -> String {
        env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.level.clone())
    }
}

/// Initialize logging. Logs go to stderr; stdout is reserved for decoded responses.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_new(config.directive()).or_else(|_| EnvFilter::try_new("warn"))?;
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.json_format {
        let stderr_layer = fmt::layer().json().with_writer(io::stderr).with_ansi(false);
        subscriber.with(stderr_layer).try_init()?;
    } else {
        let stderr_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_line_number(true);
        subscriber.with(stderr_layer).try_init()?;
    }

    Ok(())
}
