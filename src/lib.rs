use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
    routing::get,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod gate;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod registry;
pub mod session;
pub mod sync;

// Route modules, one per layout level.
pub mod routes;
use routes::{DASHBOARD_PREFIX, admin, customer, dashboard, platform, public, vendor};

use crate::guard::{GateGuard, gate_middleware, session_middleware};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use gate::{Destinations, Gate, GateChain, GateState};
pub use identity::{IdentityState, JwtIdentityProvider};
pub use registry::{RegistryState, SessionRegistry, spawn_sweeper};
pub use session::SessionStore;
pub use sync::{HttpUserSync, MockUserSync, SyncState};

/// ApiDoc
///
/// OpenAPI description of the gateway, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::sign_in_page, handlers::unauthorized_page, handlers::mark_sign_in_intent,
        handlers::get_session, handlers::retry_sync, handlers::dashboard_home,
        handlers::dashboard_profile, handlers::customer_orders, handlers::customer_wishlist,
        handlers::vendor_products, handlers::vendor_orders, handlers::admin_overview,
        handlers::admin_users, handlers::admin_vendors, handlers::platform_settings
    ),
    components(
        schemas(
            models::Role, models::UserStatus, models::BackendUser, models::AuthStatus,
            models::AuthState, models::WelcomeNotice, models::Viewer, models::PageView,
        )
    ),
    tags(
        (name = "storefront-gateway", description = "Storefront dashboard gateway")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Live browser sessions, each with its auth store and bootstrap.
    pub sessions: RegistryState,
    /// Resolves the ambient principal of a request.
    pub identity: IdentityState,
    pub config: AppConfig,
    /// Validated denial destinations, shared by every gate.
    pub destinations: Arc<Destinations>,
}

impl AppState {
    /// new
    ///
    /// Assembles the state and validates the denial destinations against the gated
    /// route tree. Fails with `AppError::RedirectLoopRisk` if a destination is gated.
    pub fn new(
        config: AppConfig,
        identity: IdentityState,
        sync: SyncState,
    ) -> Result<Self, AppError> {
        let destinations = Destinations::new(
            &config.sign_in_path,
            &config.unauthorized_path,
            &[DASHBOARD_PREFIX],
        )?;
        Ok(Self {
            sessions: Arc::new(SessionRegistry::new(
                sync,
                config.session_ttl,
                config.session_capacity,
            )),
            identity,
            config,
            destinations: Arc::new(destinations),
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RegistryState {
    fn from_ref(app_state: &AppState) -> RegistryState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// dashboard_router
///
/// Builds the gated route tree. Each section gets one gate layer holding the full
/// chain from the dashboard root down to that section, so a request for a nested
/// page is checked against every level above it, not only the innermost one.
fn dashboard_router(state: &AppState) -> Router<AppState> {
    let guard_for = |chain: &GateChain| {
        GateGuard::new(
            chain.clone(),
            state.destinations.clone(),
            state.config.gate_wait,
        )
    };

    let dashboard_chain = GateChain::root(dashboard::gate());
    let customer_chain = dashboard_chain.child(customer::gate());
    let vendor_chain = dashboard_chain.child(vendor::gate());
    let admin_chain = dashboard_chain.child(admin::gate());
    let platform_chain = admin_chain.child(platform::gate());

    let platform_section = platform::routes().route_layer(middleware::from_fn_with_state(
        guard_for(&platform_chain),
        gate_middleware,
    ));

    let admin_section = admin::routes()
        .route_layer(middleware::from_fn_with_state(
            guard_for(&admin_chain),
            gate_middleware,
        ))
        .nest("/platform", platform_section);

    let customer_section = customer::routes().route_layer(middleware::from_fn_with_state(
        guard_for(&customer_chain),
        gate_middleware,
    ));

    let vendor_section = vendor::routes().route_layer(middleware::from_fn_with_state(
        guard_for(&vendor_chain),
        gate_middleware,
    ));

    dashboard::routes()
        .route_layer(middleware::from_fn_with_state(
            guard_for(&dashboard_chain),
            gate_middleware,
        ))
        .nest("/customer", customer_section)
        .nest("/vendor", vendor_section)
        .nest("/admin", admin_section)
}

/// create_router
///
/// Assembles the routing structure, applies the session layer and the
/// observability stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(public::public_routes())
        .nest(DASHBOARD_PREFIX, dashboard_router(&state))
        // Session layer: wraps every route registered above, before any gate runs.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        // Registered after the session layer, so health checks and docs never create sessions.
        .route("/health", get(|| async { "ok" }))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for each request, carrying the request id so all log lines of one request
/// correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
