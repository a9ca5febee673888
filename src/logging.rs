//! Tracing subscriber setup shared by the desktop shell and the CLI.
//!
//! Filter priority: `ACCIDENT_INTAKE_LOG`, then `RUST_LOG`, then the caller's
//! default level (`warn` for the desktop shell).

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "ACCIDENT_INTAKE_LOG";

fn filter_directives(app_env: Option<String>, rust_log: Option<String>, default: Level) -> String {
    app_env
        .filter(|s| !s.trim().is_empty())
        .or_else(|| rust_log.filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| default.as_str().to_ascii_lowercase())
}

pub fn build_env_filter(default: Level) -> EnvFilter {
    let directives = filter_directives(
        std::env::var(LOG_ENV_VAR).ok(),
        std::env::var("RUST_LOG").ok(),
        default,
    );
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(default.as_str()))
}

/// Installs the stderr subscriber. A second call is a no-op.
pub fn init(default: Level) {
    let ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(true);
    let _ = tracing_subscriber::registry()
        .with(build_env_filter(default))
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_variable_wins() {
        let d = filter_directives(Some("accident_intake_lib=debug".into()), Some("info".into()), Level::WARN);
        assert_eq!(d, "accident_intake_lib=debug");
    }

    #[test]
    fn blank_values_fall_through() {
        assert_eq!(filter_directives(Some("  ".into()), Some("info".into()), Level::WARN), "info");
        assert_eq!(filter_directives(None, None, Level::WARN), "warn");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(Level::WARN);
        init(Level::DEBUG);
    }
}
