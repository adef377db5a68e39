//! Diagnostics go to stderr through `tracing`; stdout carries only the reply.

use tracing_subscriber::EnvFilter;

const DEBUG_DIRECTIVES: &str = "plexctl=debug,perplexity_api=debug,thread_store=debug";
const DEFAULT_DIRECTIVES: &str = "warn";

/// Filter used when `RUST_LOG` is not set.
pub fn default_directives(debug: bool) -> &'static str {
    if debug {
        DEBUG_DIRECTIVES
    } else {
        DEFAULT_DIRECTIVES
    }
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .try_init()
        .ok();
}
