//! Logging setup shared by the server and the one-shot evaluator.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 給終端機看的精簡格式
    Compact,
    /// 一行一個 JSON 事件，給 log shipper
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

/// Directives used when `RUST_LOG` is not set.
///
/// Provider HTTP traffic stays at warn unless explicitly requested.
pub fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("flowco={level},flowco_evaluate={level},hyper=warn,reqwest=warn")
}

pub fn init_logger(format: LogFormat, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(false)
                    .flatten_event(true),
            )
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_follow_verbosity() {
        assert!(default_directives(false).starts_with("flowco=info"));
        assert!(default_directives(true).contains("flowco_evaluate=debug"));
        assert!(default_directives(true).contains("reqwest=warn"));
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
    }
}
