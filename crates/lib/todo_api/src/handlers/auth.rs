//! Authentication request handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use todo_core::models::auth::{AuthenticatedIdentity, PublicUser, TokenPair};
use tracing::info;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    AuthHealthResponse, LoginRequest, LogoutRequest, MessageResponse, RefreshRequest,
    RegisterRequest,
};

/// `POST /auth/register`: create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let user = state.auth.register(body.into()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /auth/login`: authenticate with username or email plus password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let tokens = state.auth.login(&body.username, &body.password).await?;
    Ok(Json(tokens))
}

/// `POST /auth/refresh`: exchange a refresh token for a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let tokens = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(tokens))
}

/// `POST /auth/logout`: revoke one refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.auth.logout(&body.refresh_token).await?;
    info!(user_id = identity.user_id, "user logged out");
    Ok(Json(MessageResponse::new("Logout successful")))
}

/// `POST /auth/logout-all`: revoke every refresh token of the caller.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> AppResult<Json<MessageResponse>> {
    state.auth.logout_all(identity.user_id).await?;
    Ok(Json(MessageResponse::new("Logged out from all devices")))
}

/// `GET /auth/me`
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> AppResult<Json<PublicUser>> {
    let user = state.auth.get_current_user(identity.user_id).await?;
    Ok(Json(user))
}

/// `GET /auth/health`: confirms the caller's token is accepted.
pub async fn auth_health_handler(
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Json<AuthHealthResponse> {
    Json(AuthHealthResponse {
        status: "healthy".into(),
        user_id: identity.user_id,
        message: "Authentication is working".into(),
    })
}

/// `GET /admin/users/{id}`: look up any user. Admin only.
pub async fn admin_get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PublicUser>> {
    let user = state.auth.get_current_user(id).await?;
    Ok(Json(user))
}
