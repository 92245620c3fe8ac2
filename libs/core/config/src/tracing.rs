use crate::Environment;
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install color-eyre with a project-standard configuration.
///
/// Call this early in main() before any fallible operations. Safe to call
/// multiple times.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

fn default_filter(environment: &Environment) -> &'static str {
    match environment {
        Environment::Production | Environment::Staging => "info",
        Environment::Test => "warn",
        Environment::Development => "debug",
    }
}

/// Initialize tracing for the given run mode.
///
/// - **Staging / Production**: flattened JSON events without module targets.
/// - **Test**: compact output routed through the test writer so `cargo test`
///   captures it per test.
/// - **Development**: pretty, human readable output.
///
/// Every mode installs `tracing_error::ErrorLayer` so eyre reports carry span
/// traces. `RUST_LOG` overrides the default level
/// (e.g. `RUST_LOG=mail=trace`).
///
/// Calling this more than once is harmless; later calls are no-ops.
pub fn init_tracing(environment: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(environment)));

    let result = if environment.structured_logs() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else if environment.is_test() {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().compact().with_test_writer())
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(_) => info!(environment = ?environment, "Tracing initialized"),
        Err(_) => debug!("Tracing already initialized, skipping re-initialization"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_per_environment() {
        assert_eq!(default_filter(&Environment::Production), "info");
        assert_eq!(default_filter(&Environment::Test), "warn");
        assert_eq!(default_filter(&Environment::Development), "debug");
    }

    #[test]
    fn test_init_tracing_multiple_calls() {
        init_tracing(&Environment::Test);
        init_tracing(&Environment::Development);
        init_tracing(&Environment::Production);
    }
}
