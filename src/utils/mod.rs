pub mod persistence;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber. `RUST_LOG` directives still apply.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = "money_manager_core=info".parse() {
            filter = filter.add_directive(directive);
        }
        // another subscriber may already be installed by the host
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
