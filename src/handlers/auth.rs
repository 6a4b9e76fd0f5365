// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{AdminCreateUserRequest, CreateUserRequest, LoginRequest, NewUser, ROLE_STUDENT},
    store::UserRepository,
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

/// Registers a new student account.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(users): State<Arc<dyn UserRepository>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = users
        .create_user(&NewUser {
            username: payload.username,
            password_hash: hash_password(&payload.password)?,
            role: ROLE_STUDENT.to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(users): State<Arc<dyn UserRepository>>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = users
        .find_user_by_username(&payload.username)
        .await?
        .ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!(user_id = user.id, role = %user.role, "user logged in");

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role,
    })))
}

/// Current user's profile, including the XP counter.
pub async fn me(
    State(users): State<Arc<dyn UserRepository>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = users
        .find_user(claims.user_id()?)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Creates a user with an explicit role (e.g. instructors).
/// Admin only.
pub async fn create_user(
    State(users): State<Arc<dyn UserRepository>>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = users
        .create_user(&NewUser {
            username: payload.username,
            password_hash: hash_password(&payload.password)?,
            role: payload.role,
        })
        .await?;

    tracing::info!(user_id = user.id, role = %user.role, "user created by admin");
    Ok((StatusCode::CREATED, Json(user)))
}
