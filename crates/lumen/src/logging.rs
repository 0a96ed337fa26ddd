//! Logging setup.
//!
//! The engine logs through the [`log`] facade. Binaries pick a backend; this
//! module installs `env_logger` for the common case.

use std::sync::Once;

static INIT: Once = Once::new();

/// Where the log filter comes from, in priority order.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Explicit filter (`"lumen=debug,wgpu_core=warn"`). Overrides `RUST_LOG`.
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn from_filter(filter: Option<&str>) -> Self {
        Self {
            filter: filter.map(str::to_owned),
        }
    }
}

/// Install `env_logger`. Safe to call more than once; later calls do nothing.
///
/// A logger installed by someone else first is left alone.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        let mut builder = env_logger::Builder::from_env(env);
        if let Some(filter) = &config.filter {
            builder.parse_filters(filter);
        }
        if builder.try_init().is_err() {
            log::debug!("logger already installed, keeping it");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init_logging(&LoggingConfig::from_filter(Some("lumen=trace")));
        init_logging(&LoggingConfig::default());
        log::trace!("still alive");
    }
}
