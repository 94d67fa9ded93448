use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles & Backend User (Mirrored from the Commerce Backend) ---

/// Role
///
/// The fixed set of permission groups a principal can hold. Roles are flat: holding
/// `ADMIN` does not imply `CUSTOMER`, and `SUPER_ADMIN` does not imply `ADMIN`.
/// Every gate tests membership, never rank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    Customer,
    Vendor,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Customer, Role::Vendor, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Vendor => "VENDOR",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown role `{s}`"))
    }
}

/// UserStatus
///
/// Lifecycle status of a backend account. Only `ACTIVE` users can pass a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum UserStatus {
    Active,
    Inactive,
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
            UserStatus::Blocked => "BLOCKED",
        }
    }
}

/// BackendUser
///
/// The backend-side record of the authenticated principal, as returned by the
/// "synchronize user" endpoint. The gateway never creates one; it only holds a
/// read-only snapshot per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BackendUser {
    pub id: Uuid,
    // Subject issued by the federated identity provider.
    pub identity_id: String,
    pub email: Option<String>,
    pub status: UserStatus,
    pub roles: Vec<Role>,
}

impl BackendUser {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// validate
    ///
    /// An `ACTIVE` account must carry at least one role. A payload breaking that rule
    /// is rejected at the sync boundary rather than handed to the gates.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_active() && self.roles.is_empty() {
            return Err(format!("active user {} has no roles", self.id));
        }
        Ok(())
    }
}

/// ApiResponse
///
/// Envelope used by every commerce backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    // Absent fields read as `None`; no `default` here, it would demand `T: Default`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

// --- Session Schemas ---

/// AuthStatus
///
/// Where the session is in resolving its principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum AuthStatus {
    /// No identity resolution has happened for this session yet.
    #[default]
    Unresolved,
    /// Identity is known and the backend sync is in flight.
    Syncing,
    Synced,
    /// The backend sync errored. The principal is treated as unauthenticated.
    SyncFailed,
    SignedOut,
}

/// AuthState
///
/// Snapshot of a browser session's authentication state. Returned by `GET /session`
/// and read by every gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthState {
    pub principal: Option<BackendUser>,
    // Identity the current principal (or in-flight sync) belongs to.
    pub identity: Option<String>,
    pub status: AuthStatus,
    pub sign_in_intent: bool,
    #[ts(type = "string | null")]
    pub synced_at: Option<DateTime<Utc>>,
    /// Pending welcome for an explicit sign-in. Handed out once, then cleared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome: Option<WelcomeNotice>,
}

/// WelcomeNotice
///
/// The one-time reaction to an explicit sign-in, delivered with the first
/// `GET /session` or page response after the sync lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WelcomeNotice {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub message: String,
}

impl WelcomeNotice {
    pub fn for_user(user: &BackendUser) -> Self {
        let message = match &user.email {
            Some(email) => format!("Welcome back, {email}!"),
            None => "Welcome back!".to_string(),
        };
        Self {
            user_id: user.id,
            email: user.email.clone(),
            message,
        }
    }
}

// --- Page Schemas (Output) ---

/// Viewer
///
/// The slice of the principal a page needs to render its header.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Viewer {
    pub id: Uuid,
    pub email: Option<String>,
    pub roles: Vec<Role>,
}

impl From<&BackendUser> for Viewer {
    fn from(user: &BackendUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            roles: user.roles.clone(),
        }
    }
}

/// PageView
///
/// Descriptor of a rendered page. Visual composition happens in the browser bundle;
/// the gateway only decides which page the caller may see.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PageView {
    pub page: String,
    pub title: String,
    pub viewer: Option<Viewer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome: Option<WelcomeNotice>,
}

impl PageView {
    pub fn new(page: &str, title: &str, viewer: Option<Viewer>) -> Self {
        Self {
            page: page.to_string(),
            title: title.to_string(),
            viewer,
            notice: None,
            welcome: None,
        }
    }
}
