use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, DeleteResponse, LoginRequest, PublicUser, RegisterRequest,
            UpdateDetailsRequest, UpdatePasswordRequest,
        },
        error::AuthError,
        extractors::{AuthUser, ValidJson},
        services::AuthService,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/updatedetails", put(update_details))
        .route("/updatepassword", put(update_password))
        .route("/deleteuser", delete(delete_user))
}

#[instrument(skip(auth, payload))]
pub async fn register(
    State(auth): State<AuthService>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let res = auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<AuthService>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    auth.login(payload).await.map(Json)
}

#[instrument(skip(auth))]
pub async fn get_me(
    State(auth): State<AuthService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    auth.get_profile(user_id).await.map(Json)
}

#[instrument(skip(auth, payload))]
pub async fn update_details(
    State(auth): State<AuthService>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<UpdateDetailsRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    auth.update_details(user_id, payload).await.map(Json)
}

#[instrument(skip(auth, payload))]
pub async fn update_password(
    State(auth): State<AuthService>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<UpdatePasswordRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    auth.update_password(user_id, payload).await.map(Json)
}

#[instrument(skip(auth))]
pub async fn delete_user(
    State(auth): State<AuthService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DeleteResponse>, AuthError> {
    auth.delete_user(user_id).await?;
    Ok(Json(DeleteResponse { success: true }))
}
