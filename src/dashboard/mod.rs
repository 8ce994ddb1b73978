//! Dashboard: axum web server for read-only monitoring.
//!
//! Serves a JSON API and a self-contained HTML status page.
//! CORS is open for local development.

pub mod routes;

use axum::{
    http::{header, Method},
    response::Html,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use routes::AppState;

/// The embedded status page (compiled into the binary).
const DASHBOARD_HTML: &str = include_str!("templates/index.html");

/// Start the dashboard web server as a background task. Never blocks;
/// a bind failure disables monitoring, not the engine.
pub fn spawn_dashboard(state: AppState, port: u16) {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(port, error = %e, "Dashboard failed to bind; monitoring disabled");
                return;
            }
        };
        info!(port, "Dashboard listening on http://localhost:{port}");
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server exited");
        }
    });
}

/// Build the axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // API routes
        .route("/api/status", get(routes::get_status))
        .route("/api/hotspots", get(routes::get_hotspots))
        .route("/api/auctions", get(routes::get_auctions))
        .route("/api/rates/recent", get(routes::get_recent_rates))
        .route("/api/cycles", get(routes::get_cycles))
        .route("/health", get(routes::health))
        // Status page
        .route("/", get(serve_dashboard))
        .layer(cors)
        .with_state(state)
}

/// Serve the embedded status page.
async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
