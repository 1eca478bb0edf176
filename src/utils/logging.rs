use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,ort=warn";

/// Install the global fmt subscriber. `RUST_LOG` overrides the default
/// filter; ONNX Runtime's own chatter is kept at warn otherwise.
pub fn init() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_ansi(false);
    fmt.init();
}
