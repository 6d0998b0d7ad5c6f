//! Diagnostic logging setup.
//!
//! Progress for humans goes through `autolife_sdk::ui` on stdout. This
//! subscriber carries the `tracing` events (spawned commands, exit codes,
//! skipped stages) to stderr. `RUST_LOG` overrides the default filter.

use std::io;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "autolife=debug,autolife_sdk=debug"
    } else {
        "autolife=info,autolife_sdk=info"
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(verbose),
            )
            .try_init();
    });
}
