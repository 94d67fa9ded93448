use crate::{
    bootstrap::SyncTrigger,
    error::AppError,
    models::{AuthState, AuthStatus, PageView, Viewer},
    registry::CurrentSession,
};
use axum::{Json, extract::Query, http::StatusCode};
use serde::Deserialize;

// --- Query Structs ---

/// UnauthorizedQuery
///
/// Set by the gates when an account exists but is not active, so the page can tell
/// a blocked account from an inactive one.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct UnauthorizedQuery {
    /// `blocked` or `inactive`.
    pub reason: Option<String>,
}

// --- Helpers ---

/// Viewer of a gated page. The gate has already admitted the principal, but pages
/// still read it from the store instead of assuming one exists.
fn viewer(session: &CurrentSession) -> Result<Viewer, AppError> {
    session
        .store
        .get_auth_state()
        .principal
        .as_ref()
        .map(Viewer::from)
        .ok_or(AppError::Unauthorized)
}

/// Gated pages also deliver a pending welcome notice, which is then cleared.
fn gated_page(
    session: &CurrentSession,
    page: &str,
    title: &str,
) -> Result<Json<PageView>, AppError> {
    let mut view = PageView::new(page, title, Some(viewer(session)?));
    view.welcome = session.store.take_welcome();
    Ok(Json(view))
}

// --- Public & Session Handlers ---

/// sign_in_page
///
/// [Public Route] Landing page for callers without a principal.
#[utoipa::path(
    get,
    path = "/sign-in",
    responses((status = 200, description = "Sign-in page", body = PageView))
)]
pub async fn sign_in_page(session: CurrentSession) -> Json<PageView> {
    let viewer = session.store.get_auth_state().principal.as_ref().map(Viewer::from);
    Json(PageView::new("sign-in", "Sign in", viewer))
}

/// unauthorized_page
///
/// [Public Route] Destination for principals whose roles or account status keep
/// them out of a section.
#[utoipa::path(
    get,
    path = "/unauthorized",
    params(UnauthorizedQuery),
    responses((status = 200, description = "Unauthorized page", body = PageView))
)]
pub async fn unauthorized_page(
    session: CurrentSession,
    Query(query): Query<UnauthorizedQuery>,
) -> Json<PageView> {
    let viewer = session.store.get_auth_state().principal.as_ref().map(Viewer::from);
    let notice = match query.reason.as_deref() {
        Some("blocked") => "Your account has been blocked. Contact support to restore access.",
        Some("inactive") => "Your account is inactive. Reactivate it to continue.",
        _ => "You do not have access to this section.",
    };
    let mut page = PageView::new("unauthorized", "Access denied", viewer);
    page.notice = Some(notice.to_string());
    Json(page)
}

/// mark_sign_in_intent
///
/// [Session Route] Called by the sign-in form when the user submits, for both
/// credential and federated sign-in. The next successful sync fires the welcome
/// reaction once.
#[utoipa::path(
    post,
    path = "/auth/intent",
    responses((status = 204, description = "Intent recorded"))
)]
pub async fn mark_sign_in_intent(session: CurrentSession) -> StatusCode {
    session.store.mark_intent();
    StatusCode::NO_CONTENT
}

/// get_session
///
/// [Session Route] Snapshot of the caller's auth state. A pending welcome notice
/// is included once and cleared from the session.
#[utoipa::path(
    get,
    path = "/session",
    responses((status = 200, description = "Session state", body = AuthState))
)]
pub async fn get_session(session: CurrentSession) -> Json<AuthState> {
    let welcome = session.store.take_welcome();
    let mut state = session.store.get_auth_state();
    state.welcome = welcome;
    Json(state)
}

/// retry_sync
///
/// [Session Route] Re-issues the backend user sync after a failure. Returns 202 when
/// a new request went out and 200 with the unchanged state otherwise.
#[utoipa::path(
    post,
    path = "/session/sync",
    responses(
        (status = 202, description = "Sync re-issued", body = AuthState),
        (status = 200, description = "Nothing to retry", body = AuthState),
        (status = 401, description = "No identity to sync")
    )
)]
pub async fn retry_sync(
    session: CurrentSession,
) -> Result<(StatusCode, Json<AuthState>), AppError> {
    let status = session.store.get_auth_state().status;
    if matches!(status, AuthStatus::SignedOut | AuthStatus::Unresolved) {
        return Err(AppError::IdentityUnresolved(
            "no identity to sync".to_string(),
        ));
    }

    let code = match session.bootstrap.retry().await {
        SyncTrigger::Started => StatusCode::ACCEPTED,
        SyncTrigger::AlreadyAttempted => StatusCode::OK,
    };
    Ok((code, Json(session.store.get_auth_state())))
}

// --- Dashboard (any authenticated principal) ---

/// dashboard_home
///
/// [Dashboard Route] Overview shown to every signed-in principal.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = PageView),
        (status = 303, description = "Redirect to sign-in")
    )
)]
pub async fn dashboard_home(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "dashboard", "Dashboard")
}

#[utoipa::path(
    get,
    path = "/dashboard/profile",
    responses((status = 200, description = "Profile", body = PageView))
)]
pub async fn dashboard_profile(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "dashboard/profile", "Profile")
}

// --- Customer Section ---

#[utoipa::path(
    get,
    path = "/dashboard/customer/orders",
    responses((status = 200, description = "Customer orders", body = PageView))
)]
pub async fn customer_orders(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "customer/orders", "My orders")
}

#[utoipa::path(
    get,
    path = "/dashboard/customer/wishlist",
    responses((status = 200, description = "Wishlist", body = PageView))
)]
pub async fn customer_wishlist(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "customer/wishlist", "Wishlist")
}

// --- Vendor Section ---

#[utoipa::path(
    get,
    path = "/dashboard/vendor/products",
    responses((status = 200, description = "Vendor catalogue", body = PageView))
)]
pub async fn vendor_products(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "vendor/products", "Products")
}

#[utoipa::path(
    get,
    path = "/dashboard/vendor/orders",
    responses((status = 200, description = "Vendor orders", body = PageView))
)]
pub async fn vendor_orders(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "vendor/orders", "Incoming orders")
}

// --- Admin Section ---

/// admin_overview
///
/// [Admin Route] Moderation overview for `ADMIN` and `SUPER_ADMIN`.
#[utoipa::path(
    get,
    path = "/dashboard/admin",
    responses(
        (status = 200, description = "Admin overview", body = PageView),
        (status = 303, description = "Redirect to sign-in or unauthorized")
    )
)]
pub async fn admin_overview(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "admin", "Administration")
}

#[utoipa::path(
    get,
    path = "/dashboard/admin/users",
    responses((status = 200, description = "User management", body = PageView))
)]
pub async fn admin_users(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "admin/users", "Users")
}

#[utoipa::path(
    get,
    path = "/dashboard/admin/vendors",
    responses((status = 200, description = "Vendor approvals", body = PageView))
)]
pub async fn admin_vendors(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "admin/vendors", "Vendors")
}

// --- Platform Section (super admins) ---

/// platform_settings
///
/// [Platform Route] Platform-wide settings. Nested inside the admin section, so a
/// caller must pass both the admin gate and the super-admin gate.
#[utoipa::path(
    get,
    path = "/dashboard/admin/platform/settings",
    responses((status = 200, description = "Platform settings", body = PageView))
)]
pub async fn platform_settings(session: CurrentSession) -> Result<Json<PageView>, AppError> {
    gated_page(&session, "admin/platform/settings", "Platform settings")
}
