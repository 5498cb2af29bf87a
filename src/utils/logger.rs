use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Filter used when `RUST_LOG` is unset. `--verbose` wins over a configured level.
pub fn filter_directive(verbose: bool, level: Option<&str>) -> String {
    match (verbose, level) {
        (true, _) => "ocr_etl=debug,info".to_string(),
        (false, Some(level)) => format!("ocr_etl={},info", level.to_ascii_lowercase()),
        (false, None) => "ocr_etl=info".to_string(),
    }
}

fn default_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose, level)))
}

pub fn init_logger(verbose: bool, level: Option<&str>, format: LogFormat) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(default_filter(verbose, level));
    match format {
        LogFormat::Compact => registry.with(fmt_layer.compact()).init(),
        // One JSON object per event, for log shippers.
        LogFormat::Json => registry.with(fmt_layer.json()).init(),
    }
}
