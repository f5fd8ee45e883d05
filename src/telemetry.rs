use crate::config::LogSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level; tract's own logging is capped at `warn`.
///
/// Records from the `log` facade (actix's request logger) are forwarded too.
pub fn init_tracing(settings: &LogSettings) {
    let default_filter = format!("{},tract_core=warn,tract_onnx=warn", settings.level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_level(true)
            .with_thread_names(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
