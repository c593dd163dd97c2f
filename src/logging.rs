//! Tracing setup and request-payload logging.

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Target for incoming payloads. Off unless enabled, e.g. `RUST_LOG=crudkit::incoming=debug`.
pub const INCOMING_TARGET: &str = "crudkit::incoming";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default_directives`.
pub fn init_tracing(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn log_incoming<T: Serialize>(value: &T) {
    if tracing::enabled!(target: INCOMING_TARGET, tracing::Level::DEBUG) {
        match serde_json::to_string_pretty(value) {
            Ok(body) => tracing::debug!(target: INCOMING_TARGET, "request value: {}", body),
            Err(e) => tracing::debug!(target: INCOMING_TARGET, error = %e, "request value not serializable"),
        }
    }
}
