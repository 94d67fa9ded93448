use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use std::{
    collections::HashMap,
    ops::Deref,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use uuid::Uuid;

use crate::{bootstrap::SessionBootstrap, error::AppError, session::SessionStore, sync::SyncState};

/// Cookie carrying the gateway's browser-session id.
pub const SESSION_ID_COOKIE: &str = "sf_sid";

/// Session
///
/// Everything the gateway keeps for one browser session: its auth store and the
/// bootstrap that feeds it.
pub struct Session {
    pub id: Uuid,
    pub store: Arc<SessionStore>,
    pub bootstrap: SessionBootstrap,
}

impl Session {
    pub fn new(id: Uuid, sync: SyncState) -> Self {
        let store = Arc::new(SessionStore::new());
        Self {
            id,
            bootstrap: SessionBootstrap::new(store.clone(), sync),
            store,
        }
    }
}

struct Entry {
    session: Arc<Session>,
    last_seen: Instant,
}

/// SessionRegistry
///
/// Live sessions keyed by the session cookie. Sessions idle for longer than `ttl`
/// are pruned whenever a new one is created and by the periodic sweeper; at
/// `capacity` the least recently seen session makes room for the new one.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Entry>>,
    sync: SyncState,
    ttl: Duration,
    capacity: usize,
}

pub type RegistryState = Arc<SessionRegistry>;

impl SessionRegistry {
    pub fn new(sync: SyncState, ttl: Duration, capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            sync,
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// get_or_create
    ///
    /// Returns the session for `id`, creating a fresh one (with a new id) when the
    /// cookie is missing or names a session this process does not know. The flag
    /// tells the caller whether a cookie must be issued.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Arc<Session>, bool) {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = id.and_then(|id| sessions.get_mut(&id)) {
            entry.last_seen = Instant::now();
            return (entry.session.clone(), false);
        }

        prune(&mut sessions, self.ttl);
        if sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                tracing::debug!(session_id = %oldest, "session capacity reached, evicted oldest");
            }
        }

        let session = Arc::new(Session::new(Uuid::new_v4(), self.sync.clone()));
        sessions.insert(
            session.id,
            Entry {
                session: session.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::debug!(session_id = %session.id, "session created");
        (session, true)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .map(|entry| entry.session.clone())
    }

    /// Forgets a session. Once the last request holding it finishes, its bootstrap
    /// is dropped and any in-flight sync is aborted.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .await
            .remove(&id)
            .map(|entry| entry.session)
    }

    /// Drops every session idle for longer than the ttl. Returns how many went.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        prune(&mut sessions, self.ttl);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

fn prune(sessions: &mut HashMap<Uuid, Entry>, ttl: Duration) {
    let now = Instant::now();
    sessions.retain(|_, entry| now.duration_since(entry.last_seen) <= ttl);
}

/// spawn_sweeper
///
/// Evicts idle sessions every `period`. The task holds only a weak reference and
/// ends once the registry is dropped.
pub fn spawn_sweeper(registry: &RegistryState, period: Duration) -> JoinHandle<()> {
    let registry: Weak<SessionRegistry> = Arc::downgrade(registry);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(live) = registry.upgrade() else {
                break;
            };
            if live.is_empty().await {
                continue;
            }
            let evicted = live.evict_idle().await;
            if evicted > 0 {
                let remaining = live.len().await;
                tracing::debug!(evicted, remaining, "evicted idle sessions");
            }
        }
    })
}

/// Looks up a cookie by name in the request's `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    cookie_value(headers, SESSION_ID_COOKIE).and_then(|raw| Uuid::parse_str(raw).ok())
}

pub fn session_cookie(id: Uuid) -> String {
    format!("{SESSION_ID_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

/// CurrentSession Extractor
///
/// The session attached to the request by the root session middleware. Handlers
/// take it as an argument the same way they would take an authenticated user.
///
/// Rejection: `AppError::SessionMissing` if the route is mounted outside the
/// session middleware.
#[derive(Clone)]
pub struct CurrentSession(pub Arc<Session>);

impl Deref for CurrentSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<Session>>()
            .cloned()
            .map(CurrentSession)
            .ok_or(AppError::SessionMissing)
    }
}
