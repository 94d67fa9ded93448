use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    identity::Identity,
    models::AuthStatus,
    session::{AuthStatePatch, SessionEvent, SessionStore},
    sync::SyncState,
};

/// SyncTrigger
///
/// What a call to `SessionBootstrap::ensure` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// A sync request was issued for a newly observed identity.
    Started,
    /// This identity was already attempted; no request was issued.
    AlreadyAttempted,
}

#[derive(Default)]
struct BootstrapInner {
    // Idempotency key: subject of the last identity a sync was issued for.
    attempted: Option<String>,
    identity: Option<Identity>,
    in_flight: Option<JoinHandle<()>>,
}

/// SessionBootstrap
///
/// Makes sure a backend user record exists for the session's identity, issuing the
/// sync at most once per identity change. The sync runs in the background: callers
/// never wait for it, and its outcome only ever lands in the session store.
///
/// Dropping the bootstrap aborts an in-flight sync, so nothing is written to the
/// store after its owner is gone.
pub struct SessionBootstrap {
    store: Arc<SessionStore>,
    sync: SyncState,
    inner: Mutex<BootstrapInner>,
}

impl SessionBootstrap {
    pub fn new(store: Arc<SessionStore>, sync: SyncState) -> Self {
        Self {
            store,
            sync,
            inner: Mutex::new(BootstrapInner::default()),
        }
    }

    /// ensure
    ///
    /// Issues one sync for `identity` unless it is the identity already attempted.
    /// A different identity supersedes the previous one: its in-flight request is
    /// aborted and the store restarts from `SYNCING`.
    ///
    /// An intent marked after this identity already synced is consumed here, since
    /// no further sync will run for it.
    pub async fn ensure(&self, identity: &Identity) -> SyncTrigger {
        let mut inner = self.inner.lock().await;
        if inner.attempted.as_deref() == Some(identity.subject.as_str()) {
            if let Some(welcome) = self.store.consume_intent_for(&identity.subject) {
                tracing::info!(user_id = %welcome.user_id, "signed in again, welcome reaction fired");
                self.store.emit(SessionEvent::Welcome {
                    user_id: welcome.user_id,
                    email: welcome.email,
                });
            }
            return SyncTrigger::AlreadyAttempted;
        }

        if let Some(previous) = inner.in_flight.take() {
            previous.abort();
        }
        inner.attempted = Some(identity.subject.clone());
        inner.identity = Some(identity.clone());
        self.store
            .set_auth_state(AuthStatePatch::syncing(&identity.subject));

        tracing::info!(identity = %identity.subject, "syncing backend user");
        let handle = tokio::spawn(run_sync(
            self.store.clone(),
            self.sync.clone(),
            identity.clone(),
        ));
        inner.in_flight = Some(handle);

        SyncTrigger::Started
    }

    /// sign_out
    ///
    /// The identity provider no longer reports a principal. Drops the principal,
    /// resets the idempotency key and leaves the sign-in intent alone (a user may
    /// have just pressed "sign in" and be on the way to the provider).
    pub async fn sign_out(&self) {
        let mut inner = self.inner.lock().await;
        let was_signed_in = inner.attempted.take().is_some();
        inner.identity = None;
        if let Some(previous) = inner.in_flight.take() {
            previous.abort();
        }

        if was_signed_in || self.store.get_auth_state().status != AuthStatus::SignedOut {
            self.store.set_auth_state(AuthStatePatch::signed_out());
        }
        if was_signed_in {
            tracing::info!("session signed out");
            self.store.emit(SessionEvent::SignedOut);
        }
    }

    /// retry
    ///
    /// Re-issues the sync for the current identity after a failure. Any other
    /// state is left alone and reported as `AlreadyAttempted`.
    pub async fn retry(&self) -> SyncTrigger {
        if self.store.get_auth_state().status != AuthStatus::SyncFailed {
            return SyncTrigger::AlreadyAttempted;
        }
        let identity = {
            let mut inner = self.inner.lock().await;
            inner.attempted = None;
            inner.identity.clone()
        };
        match identity {
            Some(identity) => self.ensure(&identity).await,
            None => SyncTrigger::AlreadyAttempted,
        }
    }
}

impl Drop for SessionBootstrap {
    fn drop(&mut self) {
        if let Some(in_flight) = self.inner.get_mut().in_flight.take() {
            in_flight.abort();
        }
    }
}

/// Runs one sync and records the outcome, unless the store has moved on to another
/// identity in the meantime.
async fn run_sync(store: Arc<SessionStore>, sync: SyncState, identity: Identity) {
    match sync.sync_user(&identity).await {
        Ok(user) => {
            let user_id = user.id;
            let email = user.email.clone();
            match store.apply_for_identity(&identity.subject, AuthStatePatch::synced(user), true)
            {
                Some(true) => {
                    tracing::info!(%user_id, "signed in, welcome reaction fired");
                    store.emit(SessionEvent::Welcome { user_id, email });
                }
                Some(false) => tracing::debug!(%user_id, "session restored"),
                None => tracing::debug!(identity = %identity.subject, "discarding stale sync result"),
            }
        }
        Err(e) => {
            tracing::error!(identity = %identity.subject, error = %e, "backend user sync failed");
            if store
                .apply_for_identity(&identity.subject, AuthStatePatch::sync_failed(), false)
                .is_some()
            {
                store.emit(SessionEvent::SyncFailed {
                    identity: identity.subject,
                    reason: e.to_string(),
                });
            }
        }
    }
}
