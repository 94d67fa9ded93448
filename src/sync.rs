use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::AppError,
    identity::Identity,
    models::{ApiResponse, BackendUser, Role, UserStatus},
};

// 1. UserSync Contract
/// UserSync
///
/// The backend "synchronize user" operation: given the ambient credential of the
/// resolved identity, the backend creates or reconciles the matching user record
/// and returns it. Swappable so the bootstrap can run against the mock in tests.
#[async_trait]
pub trait UserSync: Send + Sync {
    async fn sync_user(&self, identity: &Identity) -> Result<BackendUser, AppError>;
}

/// SyncState
///
/// Shared handle to the configured sync client.
pub type SyncState = Arc<dyn UserSync>;

// 2. The Real Implementation (Commerce Backend over HTTP)
/// HttpUserSync
///
/// Calls `POST {base_url}/api/users/sync`, forwarding the identity's bearer
/// credential. The body is empty; the backend derives everything from the token.
#[derive(Clone)]
pub struct HttpUserSync {
    client: reqwest::Client,
    sync_url: String,
}

impl HttpUserSync {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            sync_url: format!("{}/api/users/sync", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl UserSync for HttpUserSync {
    async fn sync_user(&self, identity: &Identity) -> Result<BackendUser, AppError> {
        let mut request = self.client.post(&self.sync_url);
        if let Some(token) = &identity.credential {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::SyncFailed(format!("request error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SyncFailed(format!("backend returned {status}")));
        }

        let envelope = response
            .json::<ApiResponse<BackendUser>>()
            .await
            .map_err(|e| AppError::SyncFailed(format!("malformed payload: {e}")))?;

        let user = match envelope {
            ApiResponse {
                success: true,
                data: Some(user),
                ..
            } => user,
            ApiResponse { message, .. } => {
                return Err(AppError::SyncFailed(
                    message.unwrap_or_else(|| "backend reported failure".to_string()),
                ));
            }
        };

        // The record must belong to the identity we synced for.
        if user.identity_id != identity.subject {
            return Err(AppError::SyncFailed(format!(
                "backend returned user for `{}`, expected `{}`",
                user.identity_id, identity.subject
            )));
        }
        user.validate().map_err(AppError::SyncFailed)?;

        Ok(user)
    }
}

// 3. The Mock Implementation (For Testing and Local Development)
/// MockUserSync
///
/// In-memory stand-in for the backend. Answers every sync with a user for the
/// requesting identity, carrying the configured roles and status. Counts calls so
/// tests can assert on request de-duplication.
pub struct MockUserSync {
    roles: Vec<Role>,
    status: UserStatus,
    should_fail: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockUserSync {
    pub fn new(roles: Vec<Role>) -> Self {
        Self {
            roles,
            status: UserStatus::Active,
            should_fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    /// Holds each response for `delay`, simulating a slow backend.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserSync for MockUserSync {
    async fn sync_user(&self, identity: &Identity) -> Result<BackendUser, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.should_fail {
            return Err(AppError::SyncFailed("mock backend unavailable".to_string()));
        }
        Ok(BackendUser {
            id: Uuid::new_v4(),
            identity_id: identity.subject.clone(),
            email: identity.email.clone(),
            status: self.status,
            roles: self.roles.clone(),
        })
    }
}
