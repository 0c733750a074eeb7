//! Logging and tracing utilities.
//!
//! Structured logging goes through the `tracing` ecosystem. All logs are
//! written to **stderr**: the plugin host owns stdout.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`, `stackit_provider=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Show what the provider sends to the STACKIT APIs
//! RUST_LOG=stackit_provider=debug terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the default logging subscriber.
///
/// This sets up a `tracing` subscriber that:
/// - Writes to **stderr** (stdout belongs to the plugin host)
/// - Respects the `RUST_LOG` environment variable for filtering
/// - Defaults to `info` level if `RUST_LOG` is not set
/// - Tags each line with its target, so resource logs read as
///   `stackit_provider::resources::...`
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```ignore
/// use stackit_provider::init_logging;
///
/// fn main() {
///     init_logging();
///     tracing::info!("STACKIT provider starting");
/// }
/// ```
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but uses `default_level` when `RUST_LOG` is not set.
///
/// # Arguments
///
/// * `default_level` - The default filter directive (e.g., "debug", "warn",
///   "stackit_provider::resources=trace")
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```ignore
/// use stackit_provider::init_logging_with_default;
///
/// fn main() {
///     // Trace the API calls of every resource unless RUST_LOG says otherwise
///     init_logging_with_default("stackit_provider::resources=debug");
/// }
/// ```
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this does not panic if a subscriber has already
/// been set. Useful in tests, where several cases may race to install one.
///
/// # Returns
///
/// - `true` if the subscriber was successfully set
/// - `false` if a subscriber was already set
///
/// # Example
///
/// ```
/// use stackit_provider::try_init_logging;
///
/// let _ = try_init_logging();
/// // a second call finds the subscriber in place
/// assert!(!try_init_logging());
/// ```
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so these tests
    // stick to filter parsing.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("stackit_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,stackit_provider::resources=trace").is_ok());
    }

    #[test]
    fn test_try_init_twice() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
