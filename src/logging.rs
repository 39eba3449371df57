/*!
 * Tracing subscriber setup
 *
 * Applications embedding the client call [`init_logging`] once at startup.
 * Without a `log_file` events go to stdout in compact form; with one they
 * are appended to that file as JSON lines, including span close timings
 * for `submit_order` and `list_orders_for_account`.
 */

use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::ClientConfig;
use crate::error::{OrderClientError, Result};

/// `RUST_LOG` when set, otherwise `order_client=<configured level>`
fn env_filter(config: &ClientConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = format!("order_client={}", config.log_level.to_tracing_level());
    EnvFilter::try_new(&directive)
        .map_err(|e| OrderClientError::Config(format!("Invalid log filter {:?}: {}", directive, e)))
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| OrderClientError::Config(format!("Failed to open log file {}: {}", path.display(), e)))
}

fn json_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .json()
        .with_writer(file)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
}

/// Install the global subscriber described by `config`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &ClientConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config)?);

    let installed = match config.log_file.as_deref() {
        Some(path) => registry.with(json_layer(open_log_file(path)?)).try_init(),
        None => registry.with(fmt::layer().compact().with_target(true)).try_init(),
    };

    installed.map_err(|e| OrderClientError::Config(format!("Failed to install subscriber: {}", e)))
}

/// Route events through the test harness's captured output
#[cfg(test)]
pub fn init_test_logging() {
    // A second call finds the subscriber already set; that's fine
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("order_client=debug")))
        .with_test_writer()
        .compact()
        .try_init();
}
