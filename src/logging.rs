//! # Structured Logging
//!
//! One-time `tracing` subscriber setup for hosts embedding the runners and
//! sweepers. The environment (`ORCHESTRATOR_ENV`, then `APP_ENV`) picks the
//! default filter and format; `RUST_LOG` and `ORCHESTRATOR_LOG_FORMAT`
//! override them.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<LogFormat> = OnceLock::new();

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `ORCHESTRATOR_LOG_FORMAT` when set, otherwise JSON in production
    fn resolve(environment: &str, requested: Option<&str>) -> Self {
        match requested.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some(_) => Self::Pretty,
            None if environment == "production" => Self::Json,
            None => Self::Pretty,
        }
    }
}

/// Install the global subscriber once and return the format in use.
///
/// Later calls return the first call's format. A subscriber installed by
/// someone else is kept.
pub fn init_structured_logging() -> LogFormat {
    *LOGGER_INITIALIZED.get_or_init(|| {
        let environment = crate::config::ConfigManager::detect_environment();
        let requested = std::env::var("ORCHESTRATOR_LOG_FORMAT").ok();
        let format = LogFormat::resolve(&environment, requested.as_deref());
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(&environment)));

        let console = match format {
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already set, keeping it");
        }

        tracing::info!(
            environment = %environment,
            format = ?format,
            "🔧 LOGGING: Structured logging ready"
        );
        format
    })
}

fn default_directive(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}
