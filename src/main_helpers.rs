//! Startup helpers for the binary entry point.

use tracing_subscriber::EnvFilter;

/// Loads a `.env` file when present, so API credentials can live next to
/// the project instead of the shell profile.
pub(crate) fn load_environment() {
    let _ = dotenvy::dotenv();
}

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence; the
/// default keeps engine warnings visible without drowning the progress
/// display.
pub(crate) fn initialize_tracing(quiet: bool) {
    let default_directive = if quiet {
        "subrecon=error,subrecon_core=error"
    } else {
        "subrecon=warn,subrecon_core=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = init_result {
        tracing::warn!(error = %err, "tracing already initialized; skipping setup");
    }
}
