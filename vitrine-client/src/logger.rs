//! Logging for the vitrine binary

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize the logger
///
/// `level` is an env-filter directive and `RUST_LOG` overrides it. When
/// `log_dir` names an existing directory, output goes to a daily rolling
/// file there instead of stdout.
pub fn init_logger(level: &str, json: bool, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    match log_dir.filter(|dir| dir.is_dir()) {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "vitrine");
            if json {
                subscriber.json().with_writer(file_appender).init();
            } else {
                subscriber.with_ansi(false).with_writer(file_appender).init();
            }
        }
        None if json => subscriber.json().init(),
        None => subscriber.init(),
    }
}
