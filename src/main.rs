use std::path::PathBuf;

use diabetes_predictor::dataset::DATA_FILE;
use diabetes_predictor::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Model and dataset are resolved relative to the working directory, the
    // same place the trainer writes them.
    let state = AppState::new(PathBuf::from("."), PathBuf::from(DATA_FILE));
    match state.try_load() {
        Ok(path) => tracing::info!("loaded model from {}", path.display()),
        Err(e) => tracing::warn!("model not loaded on startup: {}", e),
    }

    let app = server::router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 5000));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
