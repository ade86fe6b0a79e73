//! Sign-in endpoints: one-time codes, password signup and login.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chatline_auth::{LoginSession, Principal};
use chatline_database::User;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::rest::ErrorResponse;
use crate::state::GatewayState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OtpRequestedResponse {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub is_verified: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.public_id,
            email: user.email,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

impl From<LoginSession> for SessionResponse {
    fn from(session: LoginSession) -> Self {
        Self {
            access_token: session.access_token,
            token_type: session.token_type.to_string(),
            user: session.user.into(),
        }
    }
}

/// Routes that do not need a token.
pub fn create_auth_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/auth/request-otp", post(request_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

pub fn create_session_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/auth/me", get(me))
}

#[utoipa::path(
    post,
    path = "/auth/request-otp",
    tag = "auth",
    request_body = RequestOtpRequest,
    responses(
        (status = 202, description = "Code sent", body = OtpRequestedResponse),
        (status = 400, description = "Invalid email", body = ErrorResponse)
    )
)]
pub async fn request_otp(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<RequestOtpRequest>,
) -> GatewayResult<(StatusCode, Json<OtpRequestedResponse>)> {
    state.authenticator.request_otp(&request.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(OtpRequestedResponse {
            status: "code_sent".to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    tag = "auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Email verified", body = UserResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorResponse),
        (status = 404, description = "Unknown email", body = ErrorResponse)
    )
)]
pub async fn verify_otp(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<VerifyOtpRequest>,
) -> GatewayResult<Json<UserResponse>> {
    let user = state
        .authenticator
        .verify_otp(&request.email, &request.code)
        .await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Password set", body = UserResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse),
        (status = 409, description = "Password already set", body = ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<CredentialsRequest>,
) -> GatewayResult<(StatusCode, Json<UserResponse>)> {
    let user = state
        .authenticator
        .signup(&request.email, &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Access token issued", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<CredentialsRequest>,
) -> GatewayResult<Json<SessionResponse>> {
    let session = state
        .authenticator
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(session.into()))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn me(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
) -> GatewayResult<Json<UserResponse>> {
    let user = state.authenticator.current_user(&principal).await?;
    Ok(Json(user.into()))
}
