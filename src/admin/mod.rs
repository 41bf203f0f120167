//! Administrative route API.
//!
//! | method | path                | operation    |
//! |--------|---------------------|--------------|
//! | POST   | `/admin/route`      | add          |
//! | PUT    | `/admin/route`      | update by id |
//! | GET    | `/admin/route/{id}` | get          |
//! | DELETE | `/admin/route/{id}` | delete       |
//! | GET    | `/admin/routes`     | list all     |
//! | PUT    | `/admin/routes`     | update list  |
//! | POST   | `/admin/refresh`    | refresh      |
//! | GET    | `/admin/status`     | status       |
//!
//! Mutations answer `success`, `not found`, `store write failed` or
//! `compile failed: <route-id>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(list_routes).put(replace_routes))
        .route("/admin/route", post(add_route).put(update_route))
        .route("/admin/route/{id}", get(get_route).delete(delete_route))
        .route("/admin/refresh", post(refresh_routes))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
