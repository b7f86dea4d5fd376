//! Logging Infrastructure

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize the logger
///
/// `level` is an env-filter directive; `RUST_LOG` wins when set. With
/// `log_dir` pointing at an existing directory, output goes to a daily
/// rolling file instead of stdout.
pub fn init_logger(level: &str, json: bool, log_dir: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir.map(Path::new).filter(|p| p.is_dir()) {
        let file_appender = tracing_appender::rolling::daily(dir, "vitrine-relay");
        if json {
            subscriber.json().with_writer(file_appender).init();
        } else {
            subscriber.with_ansi(false).with_writer(file_appender).init();
        }
        return;
    }

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
