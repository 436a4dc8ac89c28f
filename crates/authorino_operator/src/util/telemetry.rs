use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Initialize tracing
///
/// Filtering follows `RUST_LOG` and falls back to `info`.
pub fn init(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("valid default filter");

    let collector = Registry::default().with(env_filter);
    let result = if json {
        let logger = tracing_subscriber::fmt::layer().json().with_current_span(false);
        tracing::subscriber::set_global_default(collector.with(logger))
    } else {
        let logger = tracing_subscriber::fmt::layer().compact();
        tracing::subscriber::set_global_default(collector.with(logger))
    };

    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}
