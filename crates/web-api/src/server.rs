use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/api/health", get(handlers::health))
            .route("/api/coins", get(handlers::list_coins))
            .route("/api/coins/:coin/candles", get(handlers::get_candles))
            .route("/api/coins/:coin/metrics", get(handlers::get_metrics))
            .route("/api/coins/:coin/summary", get(handlers::get_summary))
            .route("/api/coins/:coin/anomalies", get(handlers::get_anomalies))
            .route(
                "/api/coins/:coin/anomalies/trends",
                get(handlers::anomaly_trends),
            )
            .route("/api/anomalies/summary", get(handlers::anomaly_summary))
            .route("/api/etl-logs", get(handlers::etl_logs))
            .route("/api/stats", get(handlers::stats))
            .route("/api/coins/:coin/refresh", post(handlers::refresh_coin))
            .route("/api/coins/:coin/analyze", post(handlers::analyze_coin))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve
    /// requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Dashboard API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
