use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::admin::admin_router;
use super::{audit, licenses, limits, login, schools, snapshot};
use crate::auth::{LockoutTracker, TokenIssuer};
use crate::config::ServerConfig;
use crate::license::LicenseService;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub licenses: LicenseService,
    pub tokens: TokenIssuer,
    pub lockout: LockoutTracker,
    pub config: ServerConfig,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServerConfig, jwt_secret: Vec<u8>) -> Self {
        Self {
            licenses: LicenseService::new(store.clone()),
            tokens: TokenIssuer::new(&jwt_secret),
            lockout: LockoutTracker::new(),
            store,
            config,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login::login))
        .route("/schools", get(schools::list_schools))
        .route("/schools/{id}/users", get(schools::school_users))
        .route("/schools/{id}/limit", post(limits::change_school_limit))
        .route("/licenses/assign", post(licenses::assign))
        .route("/licenses/revoke", post(licenses::revoke))
        .route("/licenses/transfer", post(licenses::transfer))
        .route(
            "/license_limit",
            get(limits::get_global_limit).post(limits::set_global_limit),
        )
        .route("/audit", get(audit::list_audit))
        .route("/data/latest", get(snapshot::latest_snapshot))
        .nest("/admin", admin_router())
        .layer(middleware::from_fn(log_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
