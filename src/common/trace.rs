use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honoring `RUST_LOG`, for embedders that do not
/// bring their own. Safe to call more than once; later calls lose.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
