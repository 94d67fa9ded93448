use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::{sync::Arc, time::Duration};

use crate::{
    AppState,
    gate::{ChainOutcome, Denial, Destinations, GateChain, GateState},
    models::PageView,
    registry::{CurrentSession, session_cookie, session_id_from_headers},
};

/// session_middleware
///
/// Root-level layer, run for every page and session route before any gate.
///
/// *Mechanism*: attaches the caller's browser session (issuing a cookie for new
/// ones), resolves the ambient identity and hands it to the session bootstrap.
/// The bootstrap only starts a sync for an identity it has not attempted yet, so
/// repeated requests do not repeat the backend call. The sync itself runs in the
/// background; this layer never waits for it.
pub async fn session_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let session_id = session_id_from_headers(&parts.headers);
    let (session, created) = state.sessions.get_or_create(session_id).await;

    match state.identity.resolve(&parts).await {
        Ok(Some(identity)) => {
            session.bootstrap.ensure(&identity).await;
        }
        Ok(None) => session.bootstrap.sign_out().await,
        Err(e) => {
            // A rejected credential is the same as no credential for the gates.
            tracing::warn!(session_id = %session.id, error = %e, "rejected session credential");
            session.bootstrap.sign_out().await;
        }
    }

    parts.extensions.insert(session.clone());
    let mut response = next.run(Request::from_parts(parts, body)).await;

    if created {
        if let Ok(cookie) = HeaderValue::from_str(&session_cookie(session.id)) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}

/// GateGuard
///
/// State of one gate layer: the chain from the dashboard root down to the section
/// it protects, and where to send denied callers.
#[derive(Clone)]
pub struct GateGuard {
    chain: Arc<GateChain>,
    destinations: Arc<Destinations>,
    wait: Duration,
}

impl GateGuard {
    pub fn new(chain: GateChain, destinations: Arc<Destinations>, wait: Duration) -> Self {
        Self {
            chain: Arc::new(chain),
            destinations,
            wait,
        }
    }

    /// Evaluates the chain, waiting up to `wait` for a pending session to resolve.
    async fn decide(&self, session: &CurrentSession) -> ChainOutcome {
        let mut updates = session.store.subscribe();
        let initial = self.chain.evaluate(&updates.borrow_and_update());
        if !initial.state.is_pending() {
            return initial;
        }

        let resolved = tokio::time::timeout(
            self.wait,
            updates.wait_for(|state| !self.chain.evaluate(state).state.is_pending()),
        )
        .await;

        match resolved {
            Ok(Ok(state)) => self.chain.evaluate(&state),
            // Timed out, or the store went away.
            _ => initial,
        }
    }
}

/// gate_middleware
///
/// Protects a dashboard section. Pending sessions get a neutral loading page and
/// no navigation; denied callers are silently redirected (sign-in when there is no
/// principal, unauthorized otherwise); authorized callers reach the section's
/// handler untouched.
pub async fn gate_middleware(
    State(guard): State<GateGuard>,
    session: CurrentSession,
    request: Request,
    next: Next,
) -> Response {
    let outcome = guard.decide(&session).await;

    match outcome.state {
        GateState::Authorized => next.run(request).await,
        GateState::Pending => (
            StatusCode::ACCEPTED,
            [(header::CACHE_CONTROL, "no-store")],
            Json(PageView::new("loading", "Loading", None)),
        )
            .into_response(),
        GateState::Denied(reason) => {
            let path = request.uri().path();
            tracing::debug!(
                session_id = %session.id,
                gate = outcome.decided_by.unwrap_or("unknown"),
                ?reason,
                path,
                "gate denied request"
            );
            match guard.destinations.resolve(reason, path) {
                Denial::Redirect(target) => Redirect::to(&target).into_response(),
                Denial::Render(status) => status.into_response(),
            }
        }
    }
}
