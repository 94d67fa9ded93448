/// Router Module Index
///
/// One module per layout level of the storefront. Every dashboard section module
/// declares the gate for its own level; `create_router` chains each section's gate
/// under its parent's, so a nested page is guarded by every level above it.

/// Public pages and session endpoints. No gate.
pub mod public;

/// `/dashboard`: any authenticated, active principal.
pub mod dashboard;

/// `/dashboard/customer`: `CUSTOMER`.
pub mod customer;

/// `/dashboard/vendor`: `VENDOR`.
pub mod vendor;

/// `/dashboard/admin`: `ADMIN` or `SUPER_ADMIN`.
pub mod admin;

/// `/dashboard/admin/platform`: `SUPER_ADMIN`, nested inside the admin section.
pub mod platform;

/// Root of the gated route tree. Denial destinations must live outside it.
pub const DASHBOARD_PREFIX: &str = "/dashboard";
