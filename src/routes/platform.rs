use crate::{AppState, gate::Gate, handlers, models::Role};
use axum::{Router, routing::get};

pub fn gate() -> Gate {
    Gate::with_roles("platform", Role::SuperAdmin, &[])
}

/// Platform Router Module
///
/// Platform-wide configuration, reachable only by principals that pass the
/// dashboard, admin and platform gates in turn.
pub fn routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/admin/platform/settings
        .route("/settings", get(handlers::platform_settings))
}
