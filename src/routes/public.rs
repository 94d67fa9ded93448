use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Pages and endpoints reachable without passing a gate. The denial destinations
/// live here, which keeps a denied caller from being redirected into another gate.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /sign-in
        // Destination for callers without a principal.
        .route("/sign-in", get(handlers::sign_in_page))
        // GET /unauthorized?reason=...
        // Destination for principals with the wrong roles or a non-active account.
        .route("/unauthorized", get(handlers::unauthorized_page))
        // POST /auth/intent
        // Marks the sign-in intent right before the sign-in form hands off to the
        // identity provider.
        .route("/auth/intent", post(handlers::mark_sign_in_intent))
        // GET /session
        .route("/session", get(handlers::get_session))
        // POST /session/sync
        // Manual retry after a failed backend user sync.
        .route("/session/sync", post(handlers::retry_sync))
}
