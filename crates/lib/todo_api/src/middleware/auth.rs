//! Authentication middleware: Bearer token extraction and JWT verification.
//!
//! Verification is stateless; the session store is never consulted here.
//! Handlers receive the caller as an explicit [`AuthenticatedIdentity`]
//! (required routes) or [`MaybeIdentity`] (optional routes).

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use todo_core::auth::AuthError;
use todo_core::models::auth::AuthenticatedIdentity;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

const BEARER: &str = "Bearer";

/// Identity attached by [`optional_auth`], if the caller presented a valid token.
#[derive(Debug, Clone, Default)]
pub struct MaybeIdentity(pub Option<AuthenticatedIdentity>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<AuthenticatedIdentity>().cloned()))
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Authorization header required".into()))?;
    let invalid = || AppError::Unauthorized("Invalid authorization header format".into());
    let value = header.to_str().map_err(|_| invalid())?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if *scheme == BEARER && !token.is_empty() => Ok(*token),
        _ => Err(invalid()),
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthenticatedIdentity, AppError> {
    let token = bearer_token(headers)?;
    match state.auth.jwt().verify_access_token(token) {
        Ok(claims) => Ok(claims.into()),
        Err(AuthError::ExpiredToken) => Err(AppError::Unauthorized("Token has expired".into())),
        Err(e) => {
            debug!(error = %e, "access token rejected");
            Err(AppError::Unauthorized("Invalid token".into()))
        }
    }
}

/// Rejects the request unless it carries a valid access token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Attaches the identity when a valid token is present; never rejects.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.headers().contains_key(AUTHORIZATION) {
        match authenticate(&state, request.headers()) {
            Ok(identity) => {
                request.extensions_mut().insert(identity);
            }
            Err(e) => debug!(error = %e, "ignoring unusable credentials"),
        }
    }
    next.run(request).await
}

/// Layered inside [`require_auth`]: rejects callers without the admin flag.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let identity = request
        .extensions()
        .get::<AuthenticatedIdentity>()
        .ok_or_else(|| AppError::Unauthorized("Authorization header required".into()))?;
    if !identity.is_admin {
        return Err(AppError::Forbidden("Admin access required".into()));
    }
    Ok(next.run(request).await)
}
