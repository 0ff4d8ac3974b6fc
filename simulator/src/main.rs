use std::{net::SocketAddr, sync::Arc};

use simulator::{AppState, create_router, error::ServerError, routes::RouteCatalog};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ROUTES_DIR: &str = "simulator/data/routes";
const DEFAULT_PORT: &str = "3000";

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simulator=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let routes_dir =
        std::env::var("ROUTES_DIR").unwrap_or_else(|_| DEFAULT_ROUTES_DIR.to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());

    let catalog = RouteCatalog::new(routes_dir);
    let root = catalog.root().display();
    match catalog.list() {
        Ok(routes) => tracing::info!("serving {} routes from {root}", routes.len()),
        Err(err) => tracing::warn!("route directory {root} is not readable yet: {err}"),
    }

    let state = AppState {
        catalog: Arc::new(catalog),
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    tracing::info!("starting route server on http://{addr}");
    tracing::info!("  GET /api/routes - general route data");
    tracing::info!("  GET /api/routes/dijkstra - Dijkstra walkthrough data");
    tracing::info!("  GET /api/routes/kruskal - Kruskal walkthrough data");
    tracing::info!("  GET /api/routes/catalog - available route files");
    tracing::info!("  GET /api/routes/file/:name - one validated route");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
