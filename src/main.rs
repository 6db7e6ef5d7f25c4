use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use imskos_backend::core::config::AppPaths;
use imskos_backend::core::logging;
use imskos_backend::server;
use imskos_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = AppState::initialize_with_paths(paths)
        .await
        .context("Failed to initialize application state")?;

    let bind_addr = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!(
        "{} v{} ({}) listening on {}",
        state.settings.app.name,
        state.settings.app.version,
        state.settings.app.environment,
        addr
    );

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
