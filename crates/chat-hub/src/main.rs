//! Chat Hub Server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p chat-hub
//! ```
//!
//! Configuration is loaded from environment variables.

use chat_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Tracing level depends on the environment, so load configuration first
    let config = AppConfig::from_env();

    let tracing_config = config
        .as_ref()
        .map_or_else(|_| TracingConfig::default(), |c| TracingConfig::for_environment(c.app.env));
    if let Err(e) = try_init_tracing_with_config(&tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    info!(
        env = ?config.app.env,
        port = config.gateway.port,
        internal_routes = config.hub.internal_token.is_some(),
        "Configuration loaded"
    );

    if let Err(e) = chat_hub::run(config).await {
        error!(error = %e, "Hub failed to start");
        std::process::exit(1);
    }
}
