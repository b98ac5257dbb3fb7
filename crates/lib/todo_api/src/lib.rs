//! # todo_api
//!
//! HTTP API library for the Todo service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod sweeper;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use sqlx::PgPool;
use todo_core::auth::service::AuthService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, health, todos};
use crate::middleware::auth::{optional_auth, require_admin, require_auth};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// Session lifecycle service.
    pub auth: Arc<AuthService>,
}

/// Run embedded database migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    todo_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler));

    // Identity attached when present; these never reject.
    let optional = Router::new()
        .route(routes::TODOS, get(todos::list_todos_handler))
        .route(routes::TODOS_ID, get(todos::get_todo_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            optional_auth,
        ));

    let protected = Router::new()
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::POST_AUTH_LOGOUT_ALL, post(auth::logout_all_handler))
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::GET_AUTH_HEALTH, get(auth::auth_health_handler))
        .route(routes::TODOS, post(todos::create_todo_handler))
        .route(
            routes::TODOS_ID,
            put(todos::update_todo_handler).delete(todos::delete_todo_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Layers run outermost-last: require_auth executes before require_admin.
    let admin = Router::new()
        .route(routes::GET_ADMIN_USERS_ID, get(auth::admin_get_user_handler))
        .layer(axum::middleware::from_fn(require_admin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(optional)
        .merge(protected)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
