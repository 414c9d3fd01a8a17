use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Initialize tracing
pub async fn init(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or(EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Setup tracing layers
    let collector = Registry::default().with(env_filter);
    let result = if json {
        tracing::subscriber::set_global_default(collector.with(tracing_subscriber::fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(collector.with(tracing_subscriber::fmt::layer().compact()))
    };

    // Initialize tracing
    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {e}");
    }
}
