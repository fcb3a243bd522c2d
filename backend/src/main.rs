use std::net::SocketAddr;

use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};

mod config;
mod db;
mod domain;
mod error;
mod response;
mod rest;
mod validation;

use crate::config::Config;
use crate::db::DbConnection;
use crate::rest::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = Config::from_env();
    config::init_runtime_mode(&config);

    info!("Setting up database");
    let db = DbConnection::new(&config.database_url).await?;

    let state = AppState::new(db);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = rest::router(state).layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("Starting server on {} in {} mode", addr, config.env);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
