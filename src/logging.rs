use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,hoopslab=debug";

static INIT: OnceCell<()> = OnceCell::new();

/// Install the fmt subscriber once; `RUST_LOG` overrides the default filter.
/// Later calls (and a subscriber someone else already set) are no-ops.
pub fn init_logging() {
    INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
