//! Tracing bootstrap for the CLI.
//!
//! Diagnostics go to stderr; stdout is reserved for the per-file
//! confirmation lines. `RUST_LOG` overrides the default directives.

use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "warn,wfexport=info";

pub fn init() {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVES))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}
