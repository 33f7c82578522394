use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use concierge_auth::{AuthSession, User};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    routes::models::{LoginRequest, Manager, RegisterRequest, UserResponse},
    util::require_bearer,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserResponse,
    pub expires_at: String,
}

impl SessionResponse {
    pub fn new(session: AuthSession, user: User) -> Self {
        Self {
            token: session.token,
            user: user.into(),
            expires_at: session.expires_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: UserResponse,
    /// Present when the account is linked to a property manager.
    pub manager: Option<Manager>,
    pub is_admin: bool,
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created and signed in", body = SessionResponse),
        (status = 400, description = "Missing email or password", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let authenticator = state.authenticator();
    authenticator
        .register_with_password(&req.email, &req.password, req.display_name.as_deref())
        .await?;

    let session = authenticator
        .login_with_password(&req.email, &req.password)
        .await?;
    let user = authenticator.user_profile(session.user_id).await?;

    tracing::info!(user = %user.public_id, "registered account");
    Ok(Json(SessionResponse::new(session, user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let authenticator = state.authenticator();
    let session = authenticator
        .login_with_password(&req.email, &req.password)
        .await
        .map_err(|e| {
            tracing::warn!("Login failed: {}", e);
            ApiError::from(e)
        })?;
    let user = authenticator.user_profile(session.user_id).await?;

    Ok(Json(SessionResponse::new(session, user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = require_bearer(&headers)?;
    state.authenticate(&token).await?;
    state.authenticator().revoke_session(&token).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current account and manager profile", body = MeResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let authenticator = state.authenticator();
    let manager = authenticator.resolve_manager(&user).await?;
    let is_super_admin = user
        .email
        .as_deref()
        .is_some_and(|email| authenticator.is_super_admin(email));
    let is_admin = is_super_admin || manager.as_ref().is_some_and(|m| m.is_admin());

    Ok(Json(MeResponse {
        user: user.into(),
        manager: manager.map(Manager::from),
        is_admin,
    }))
}
