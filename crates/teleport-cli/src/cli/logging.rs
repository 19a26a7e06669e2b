use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "teleport_core=info,teleport_cli=info,warn";

/// Install the stderr subscriber, honoring `RUST_LOG`.
///
/// When `TELEPORT_LOG_FILE` is set, debug-level output is also appended to
/// that file.
pub fn init_logging() {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    );

    let file_layer = std::env::var("TELEPORT_LOG_FILE").ok().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                eprintln!("File logging enabled: {}", log_path);
                Some(
                    fmt::layer()
                        .with_writer(std::sync::Mutex::new(file))
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_filter(EnvFilter::new("teleport_core=debug,teleport_cli=debug,info")),
                )
            }
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", log_path, e);
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}
