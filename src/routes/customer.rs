use crate::{AppState, gate::Gate, handlers, models::Role};
use axum::{Router, routing::get};

pub fn gate() -> Gate {
    Gate::with_roles("customer", Role::Customer, &[])
}

/// Customer Router Module
///
/// Order history and wishlist for shoppers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/customer/orders
        .route("/orders", get(handlers::customer_orders))
        // GET /dashboard/customer/wishlist
        .route("/wishlist", get(handlers::customer_wishlist))
}
