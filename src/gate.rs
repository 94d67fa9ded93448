use axum::http::StatusCode;
use std::collections::BTreeSet;

use crate::{
    error::AppError,
    models::{AuthState, AuthStatus, BackendUser, Role, UserStatus},
};

/// RoleSet
///
/// A non-empty set of acceptable roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Result<Self, AppError> {
        let roles: BTreeSet<Role> = roles.into_iter().collect();
        if roles.is_empty() {
            return Err(AppError::EmptyRequirement);
        }
        Ok(Self(roles))
    }

    /// Infallible constructor: the signature guarantees at least one role.
    pub fn of(first: Role, rest: &[Role]) -> Self {
        let mut roles = BTreeSet::from([first]);
        roles.extend(rest.iter().copied());
        Self(roles)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Flat membership test: true if the principal holds at least one listed role.
    pub fn admits(&self, user: &BackendUser) -> bool {
        user.roles.iter().any(|role| self.0.contains(role))
    }
}

/// Requirement
///
/// What a gate asks of an active principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any authenticated, active principal.
    Any,
    AnyOf(RoleSet),
}

impl Requirement {
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Result<Self, AppError> {
        RoleSet::new(roles).map(Requirement::AnyOf)
    }
}

/// DenyReason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No principal: signed out, never signed in, or the backend sync failed.
    NoPrincipal,
    /// The account exists but is not `ACTIVE`.
    Inactive(UserStatus),
    RoleMismatch,
}

/// GateState
///
/// `Pending` resolves once to `Authorized` or `Denied`. A new identity puts the
/// session back into `SYNCING`, which every gate reads as a fresh `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Authorized,
    Denied(DenyReason),
}

impl GateState {
    pub fn is_pending(&self) -> bool {
        matches!(self, GateState::Pending)
    }
}

/// Gate
///
/// A guard for one layout level of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    name: &'static str,
    requirement: Requirement,
}

impl Gate {
    pub fn new(name: &'static str, requirement: Requirement) -> Self {
        Self { name, requirement }
    }

    pub fn authenticated(name: &'static str) -> Self {
        Self::new(name, Requirement::Any)
    }

    pub fn with_roles(name: &'static str, first: Role, rest: &[Role]) -> Self {
        Self::new(name, Requirement::AnyOf(RoleSet::of(first, rest)))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// evaluate
    ///
    /// Authorized iff the session is synced, the principal is `ACTIVE`, and the
    /// requirement is `Any` or shares at least one role with the principal.
    pub fn evaluate(&self, state: &AuthState) -> GateState {
        match state.status {
            AuthStatus::Unresolved | AuthStatus::Syncing => return GateState::Pending,
            AuthStatus::SignedOut | AuthStatus::SyncFailed => {
                return GateState::Denied(DenyReason::NoPrincipal);
            }
            AuthStatus::Synced => {}
        }

        let Some(user) = &state.principal else {
            return GateState::Denied(DenyReason::NoPrincipal);
        };
        if !user.is_active() {
            return GateState::Denied(DenyReason::Inactive(user.status));
        }

        match &self.requirement {
            Requirement::Any => GateState::Authorized,
            Requirement::AnyOf(roles) if roles.admits(user) => GateState::Authorized,
            Requirement::AnyOf(_) => GateState::Denied(DenyReason::RoleMismatch),
        }
    }
}

/// ChainOutcome
///
/// Result of a chain evaluation, with the gate that decided a non-authorized result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainOutcome {
    pub state: GateState,
    pub decided_by: Option<&'static str>,
}

/// GateChain
///
/// Ordered gates from the route root down to a section. Every gate is evaluated
/// on its own and the results are AND-ed, so a leaf is reachable only by roles
/// every ancestor admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateChain {
    gates: Vec<Gate>,
}

impl GateChain {
    pub fn root(gate: Gate) -> Self {
        Self { gates: vec![gate] }
    }

    /// Returns a new chain that extends this one with a nested gate.
    pub fn child(&self, gate: Gate) -> Self {
        let mut gates = self.gates.clone();
        gates.push(gate);
        Self { gates }
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn evaluate(&self, state: &AuthState) -> ChainOutcome {
        for gate in &self.gates {
            match gate.evaluate(state) {
                GateState::Authorized => continue,
                other => {
                    return ChainOutcome {
                        state: other,
                        decided_by: Some(gate.name()),
                    };
                }
            }
        }
        ChainOutcome {
            state: GateState::Authorized,
            decided_by: None,
        }
    }

    /// The roles that can reach the end of this chain: the intersection of every
    /// gate's role set, `Any` gates leaving it untouched.
    pub fn allowed_roles(&self) -> BTreeSet<Role> {
        self.gates
            .iter()
            .fold(Role::ALL.into_iter().collect::<BTreeSet<Role>>(), |allowed, gate| {
                match gate.requirement() {
                    Requirement::Any => allowed,
                    Requirement::AnyOf(roles) => {
                        allowed.into_iter().filter(|r| roles.contains(*r)).collect()
                    }
                }
            })
    }
}

/// Denial
///
/// How a denied request leaves the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Redirect(String),
    /// Already at the destination: render a plain status instead of redirecting.
    Render(StatusCode),
}

/// Destinations
///
/// Where denied principals are sent: no principal goes to sign-in, a present but
/// unfit principal goes to the unauthorized page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    sign_in: String,
    unauthorized: String,
}

/// Segment-aware prefix test: `/dashboard` covers `/dashboard/admin` but not `/dashboards`.
fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl Destinations {
    /// new
    ///
    /// Rejects a destination that lives under one of the gated prefixes; a gate
    /// denying access to its own redirect target would loop.
    pub fn new(
        sign_in: &str,
        unauthorized: &str,
        gated_prefixes: &[&str],
    ) -> Result<Self, AppError> {
        for destination in [sign_in, unauthorized] {
            if !destination.starts_with('/') {
                return Err(AppError::RedirectLoopRisk(destination.to_string()));
            }
            if gated_prefixes.iter().any(|prefix| is_under(destination, prefix)) {
                return Err(AppError::RedirectLoopRisk(destination.to_string()));
            }
        }
        Ok(Self {
            sign_in: sign_in.to_string(),
            unauthorized: unauthorized.to_string(),
        })
    }

    pub fn sign_in(&self) -> &str {
        &self.sign_in
    }

    pub fn unauthorized(&self) -> &str {
        &self.unauthorized
    }

    /// The redirect target for a denial. Inactive accounts carry their status so
    /// the unauthorized page can word its message.
    pub fn target(&self, reason: DenyReason) -> String {
        match reason {
            DenyReason::NoPrincipal => self.sign_in.clone(),
            DenyReason::RoleMismatch => self.unauthorized.clone(),
            DenyReason::Inactive(status) => format!(
                "{}?reason={}",
                self.unauthorized,
                status.as_str().to_ascii_lowercase()
            ),
        }
    }

    pub fn resolve(&self, reason: DenyReason, current_path: &str) -> Denial {
        let destination = match reason {
            DenyReason::NoPrincipal => &self.sign_in,
            DenyReason::Inactive(_) | DenyReason::RoleMismatch => &self.unauthorized,
        };
        if is_under(current_path, destination) {
            return Denial::Render(match reason {
                DenyReason::NoPrincipal => StatusCode::UNAUTHORIZED,
                _ => StatusCode::FORBIDDEN,
            });
        }
        Denial::Redirect(self.target(reason))
    }
}
