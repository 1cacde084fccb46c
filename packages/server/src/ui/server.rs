//! Server execution logic.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{
        challenge_room_handler, circuit_room_handler, get_rooms, health_check, start_challenge,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Room coordinator server
///
/// # Example
///
/// ```ignore
/// let state = AppState::new(config.challenge_settings(), config.runtime_settings(), clock);
/// Server::new(state).run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Build the router without binding a socket.
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント（通常の GET ではスナップショットを返す）
            .route("/rooms/circuits/{circuit_id}", get(circuit_room_handler))
            .route("/rooms/challenges/{session_id}", get(challenge_room_handler))
            .route(
                "/rooms/challenges/{session_id}/start",
                post(start_challenge),
            )
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .with_state(Arc::clone(&self.state))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Connect to: ws://{}/rooms/circuits/{{circuit_id}}", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener).await?;
        Ok(())
    }

    /// Serve on an already bound listener until a shutdown signal arrives.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!("Room coordinator listening on {}", listener.local_addr()?);

        let app = self.router();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        self.state.shutdown();
        tracing::info!("Server shutdown complete");
        result
    }
}
