use crate::{AppState, gate::Gate, handlers, models::Role};
use axum::{Router, routing::get};

pub fn gate() -> Gate {
    Gate::with_roles("vendor", Role::Vendor, &[])
}

/// Vendor Router Module
///
/// Catalogue and incoming orders for sellers. Admins do not inherit vendor access;
/// an admin who also sells must hold `VENDOR` explicitly.
pub fn routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/vendor/products
        .route("/products", get(handlers::vendor_products))
        // GET /dashboard/vendor/orders
        .route("/orders", get(handlers::vendor_orders))
}
