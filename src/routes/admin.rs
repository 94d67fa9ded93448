use crate::{AppState, gate::Gate, handlers, models::Role};
use axum::{Router, routing::get};

/// Admin layout gate. `SUPER_ADMIN` is listed explicitly: roles do not imply
/// each other.
pub fn gate() -> Gate {
    Gate::with_roles("admin", Role::Admin, &[Role::SuperAdmin])
}

/// Admin Router Module
///
/// Moderation and oversight pages. The platform section is nested below this one
/// in `create_router` and carries its own, narrower gate.
pub fn routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/admin
        .route("/", get(handlers::admin_overview))
        // GET /dashboard/admin/users
        .route("/users", get(handlers::admin_users))
        // GET /dashboard/admin/vendors
        // Vendor onboarding approvals.
        .route("/vendors", get(handlers::admin_vendors))
}
