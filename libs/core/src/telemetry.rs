//! Tracing subscriber initialization for the frontier binaries.
//!
//! # Usage
//!
//! ```no_run
//! use hopper_core::telemetry;
//!
//! fn main() {
//!     telemetry::init_dev_subscriber_with_env_filter();
//!     tracing::info!("Application started");
//! }
//! ```

use tracing::Level;
use tracing_subscriber::fmt;

/// Initialize a simple stderr subscriber for development.
///
/// This sets up a tracing subscriber that:
/// - Outputs to stderr
/// - Shows INFO level and above
/// - Includes target (module path), file, and line number
///
/// Call this at application startup (not in the library).
///
/// # Panics
/// Panics if a global subscriber has already been set.
pub fn init_dev_subscriber() {
    let subscriber = fmt::Subscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Initialize a stderr subscriber that respects the `RUST_LOG` environment
/// variable for filtering. If `RUST_LOG` is not set, defaults to INFO level.
///
/// # Example
/// ```no_run
/// use hopper_core::telemetry;
///
/// fn main() {
///     // Set RUST_LOG=hopper_db=debug,info to see debug for hopper_db only
///     telemetry::init_dev_subscriber_with_env_filter();
/// }
/// ```
pub fn init_dev_subscriber_with_env_filter() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
