mod reload;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reload-data", post(reload::reload_data))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/password", put(users::update_password))
        .route("/users/role", put(users::update_role))
}
