//! Room coordinator server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin voltroom-server
//! cargo run --bin voltroom-server -- --host 0.0.0.0 --port 3000 --max-participants 4
//! ```

use std::sync::Arc;

use clap::Parser;
use voltroom_server::{
    config::ServerConfig,
    ui::{AppState, Server},
};
use voltroom_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    let state = AppState::new(
        config.challenge_settings(),
        config.runtime_settings(),
        Arc::new(SystemClock),
    );
    tracing::info!(
        max_participants = config.max_participants,
        time_limit_seconds = config.time_limit_seconds,
        "Starting room coordinator"
    );

    let server = Server::new(state);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
