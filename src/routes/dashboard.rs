use crate::{AppState, gate::Gate, handlers};
use axum::{Router, routing::get};

/// The outer dashboard layout admits any authenticated, active principal.
pub fn gate() -> Gate {
    Gate::authenticated("dashboard")
}

/// Dashboard Router Module
///
/// Pages shared by every role. Role sections are nested under this router by
/// `create_router`, each with its own gate chained below this one.
pub fn routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard
        .route("/", get(handlers::dashboard_home))
        // GET /dashboard/profile
        .route("/profile", get(handlers::dashboard_profile))
}
