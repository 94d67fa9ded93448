use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::models::{AuthState, AuthStatus, BackendUser, WelcomeNotice};

/// Capacity of the per-session event channel. Events are tiny and consumers are
/// expected to keep up; a lagging subscriber only loses old notifications.
const EVENT_CAPACITY: usize = 32;

/// SessionEvent
///
/// One-time reactions published by the session store, consumed by the UI layer
/// (toasts) and by telemetry.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// An explicit sign-in completed and the backend user is synced.
    Welcome { user_id: Uuid, email: Option<String> },
    SyncFailed { identity: String, reason: String },
    SignedOut,
}

/// AuthStatePatch
///
/// Partial update for `AuthState`. Every present field replaces the stored value
/// wholesale; nothing is incremented or merged.
#[derive(Debug, Clone, Default)]
pub struct AuthStatePatch {
    pub principal: Option<Option<BackendUser>>,
    pub identity: Option<Option<String>>,
    pub status: Option<AuthStatus>,
    pub sign_in_intent: Option<bool>,
    pub synced_at: Option<Option<DateTime<Utc>>>,
    pub welcome: Option<Option<WelcomeNotice>>,
}

impl AuthStatePatch {
    /// Identity is known, principal unknown until the sync for it lands.
    pub fn syncing(identity: &str) -> Self {
        Self {
            principal: Some(None),
            identity: Some(Some(identity.to_string())),
            status: Some(AuthStatus::Syncing),
            synced_at: Some(None),
            welcome: Some(None),
            ..Default::default()
        }
    }

    pub fn synced(user: BackendUser) -> Self {
        Self {
            principal: Some(Some(user)),
            status: Some(AuthStatus::Synced),
            synced_at: Some(Some(Utc::now())),
            ..Default::default()
        }
    }

    pub fn sync_failed() -> Self {
        Self {
            principal: Some(None),
            status: Some(AuthStatus::SyncFailed),
            synced_at: Some(None),
            welcome: Some(None),
            ..Default::default()
        }
    }

    pub fn signed_out() -> Self {
        Self {
            principal: Some(None),
            identity: Some(None),
            status: Some(AuthStatus::SignedOut),
            synced_at: Some(None),
            welcome: Some(None),
            ..Default::default()
        }
    }

    fn apply(self, state: &mut AuthState) {
        if let Some(principal) = self.principal {
            state.principal = principal;
        }
        if let Some(identity) = self.identity {
            state.identity = identity;
        }
        if let Some(status) = self.status {
            state.status = status;
        }
        if let Some(intent) = self.sign_in_intent {
            state.sign_in_intent = intent;
        }
        if let Some(synced_at) = self.synced_at {
            state.synced_at = synced_at;
        }
        if let Some(welcome) = self.welcome {
            state.welcome = welcome;
        }
    }
}

/// SessionStore
///
/// Single-writer container for one browser session's `AuthState`. Reads are
/// snapshots; every write goes through the watch channel's own lock, so writers are
/// serialized and readers never observe a half-applied patch.
#[derive(Debug)]
pub struct SessionStore {
    state: watch::Sender<AuthState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { state, events }
    }

    /// get_auth_state
    ///
    /// Returns a snapshot of the current state.
    pub fn get_auth_state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// set_auth_state
    ///
    /// Applies a partial replacement as one atomic write.
    pub fn set_auth_state(&self, patch: AuthStatePatch) {
        self.state.send_modify(|state| patch.apply(state));
    }

    /// Applies `patch` only while the stored identity still equals `identity`.
    /// Returns whether the write happened and, if so, whether a pending sign-in
    /// intent was consumed by it.
    pub(crate) fn apply_for_identity(
        &self,
        identity: &str,
        patch: AuthStatePatch,
        consume_intent: bool,
    ) -> Option<bool> {
        let mut outcome = None;
        self.state.send_if_modified(|state| {
            if state.identity.as_deref() != Some(identity) {
                return false;
            }
            patch.apply(state);
            let consumed = consume_intent && consume_into_welcome(state);
            outcome = Some(consumed);
            true
        });
        outcome
    }

    /// Consumes a sign-in intent raised after `identity` had already synced.
    /// The principal is unchanged, so no sync runs; the welcome is queued directly.
    pub(crate) fn consume_intent_for(&self, identity: &str) -> Option<WelcomeNotice> {
        let mut welcome = None;
        self.state.send_if_modified(|state| {
            if state.status != AuthStatus::Synced || state.identity.as_deref() != Some(identity)
            {
                return false;
            }
            if !consume_into_welcome(state) {
                return false;
            }
            welcome = state.welcome.clone();
            true
        });
        welcome
    }

    /// take_welcome
    ///
    /// Hands out the pending welcome notice, if any, and clears it. Concurrent
    /// callers race on one write, so exactly one of them receives it.
    pub fn take_welcome(&self) -> Option<WelcomeNotice> {
        let mut taken = None;
        self.state.send_if_modified(|state| {
            taken = state.welcome.take();
            taken.is_some()
        });
        taken
    }

    /// Subscribe to state changes. The receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is the common case outside of tests and UI streams.
        let _ = self.events.send(event);
    }

    // --- Auth Intent Flag ---

    /// mark_intent
    ///
    /// Records that the user just submitted an explicit sign-in (credential or
    /// federated). Idempotent. Clearing is left to whoever reacts to the flag, so
    /// the flag is still set when the resulting sync lands.
    pub fn mark_intent(&self) {
        self.state.send_if_modified(|state| {
            if state.sign_in_intent {
                return false;
            }
            state.sign_in_intent = true;
            true
        });
        tracing::debug!("sign-in intent marked");
    }

    pub fn sign_in_intent(&self) -> bool {
        self.state.borrow().sign_in_intent
    }

    pub fn set_sign_in_intent(&self, value: bool) {
        self.set_auth_state(AuthStatePatch {
            sign_in_intent: Some(value),
            ..Default::default()
        });
    }
}

/// Clears a set intent and queues the welcome for the stored principal.
fn consume_into_welcome(state: &mut AuthState) -> bool {
    let Some(user) = state.principal.as_ref().filter(|_| state.sign_in_intent) else {
        return false;
    };
    state.welcome = Some(WelcomeNotice::for_user(user));
    state.sign_in_intent = false;
    true
}
