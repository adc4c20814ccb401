//! Logging bootstrap, grounded on the reference implementation's
//! `utils/logger.rs`: an `EnvFilter` with a sane default plus a fmt layer,
//! installed once via a `OnceCell` guard.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_DIRECTIVES: &str = "info";

/// Installs a process-wide tracing subscriber. Safe to call more than once;
/// only the first call takes effect.
pub fn init() {
    LOGGER_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init();
    });
}
