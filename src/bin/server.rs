//! stylelearn HTTP server binary.
//!
//! Starts the axum server for the style-learning engine and the recurring
//! buffer sweep.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 8080)
//! - `STYLE_DB_PATH` — SQLite database file (default: "stylelearn.db")
//! - `ANALYZER_URL` — Base URL of the text-analyzer service
//!   (default: "http://127.0.0.1:8090")
//! - `STYLE_BUFFER_THRESHOLD`, `STYLE_N_CLUSTERS`, `STYLE_RECLUSTER_TRIGGER`,
//!   `STYLE_SWEEP_INTERVAL_SECS` — engine tuning (see `StyleConfig`)
//! - `RUST_LOG` — Tracing filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::Arc;

use stylelearn::analyzer::HttpTextAnalyzer;
use stylelearn::config::StyleConfig;
use stylelearn::scheduler::spawn_buffer_sweep;
use stylelearn::server::{app_router, AppState};
use stylelearn::storage::SqliteStyleStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stylelearn=debug".into()),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_addr = format!("0.0.0.0:{}", port);
    let db_path =
        std::env::var("STYLE_DB_PATH").unwrap_or_else(|_| "stylelearn.db".to_string());
    let analyzer_url =
        std::env::var("ANALYZER_URL").unwrap_or_else(|_| "http://127.0.0.1:8090".to_string());

    let config = StyleConfig::from_env();
    let store = Arc::new(SqliteStyleStore::new(db_path).expect("Failed to open style store"));
    let analyzer = Arc::new(HttpTextAnalyzer::new(analyzer_url));
    let state = AppState::new(store.clone(), analyzer, &config);

    let sweep = spawn_buffer_sweep(store, state.ingestion.clone(), config.sweep_interval);

    let app = app_router(state);

    tracing::info!("stylelearn server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health          — liveness probe");
    tracing::info!("  POST /style/init      — bulk-learn general style");
    tracing::info!("  POST /style/update    — incremental style update");
    tracing::info!("  POST /style/get       — current derived labels");
    tracing::info!("  POST /buffer/add      — enqueue a style sample");
    tracing::info!("  POST /reply/init      — bulk-learn reply clusters");
    tracing::info!("  POST /reply/update    — online reply-style update");
    tracing::info!("  POST /reply/get-style — nearest reply-style labels");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .await
        .expect("Server failed");

    sweep.abort();
}
