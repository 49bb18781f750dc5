use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::JwtKeys,
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        extractors::AuthUser,
        password::{hash_password, is_valid_email, verify_password},
        repo::User,
    },
    error::{AppError, FieldError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn validate_registration(payload: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if payload.username.trim().is_empty() {
        errors.push(FieldError::new("username", "Username is required"));
    } else if payload.username.len() > 150 {
        errors.push(FieldError::new("username", "Username too long"));
    }
    if !is_valid_email(&payload.email) {
        errors.push(FieldError::new("email", "Invalid email"));
    }
    if payload.password.len() < 8 {
        errors.push(FieldError::new("password", "Password too short"));
    }
    if payload.password != payload.password_confirm {
        errors.push(FieldError::new("password_confirm", "Passwords do not match"));
    }
    errors
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    let errors = validate_registration(&payload);
    if !errors.is_empty() {
        warn!(username = %payload.username, "registration rejected");
        return Err(AppError::Validation(errors));
    }

    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already taken");
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.username, &payload.email, &hash).await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.username = payload.username.trim().to_string();

    let Some(user) = User::find_by_username(&state.db, &payload.username).await? else {
        warn!(username = %payload.username, "login unknown username");
        return Err(AppError::Unauthorized);
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(username = %payload.username, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized);
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|_| {
        warn!("invalid refresh token");
        AppError::Unauthorized
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
        },
    }))
}

/// Tokens are stateless, so logout is an acknowledgement; clients drop
/// their token pair.
#[instrument]
pub async fn logout(AuthUser(user_id): AuthUser) -> StatusCode {
    info!(user_id = %user_id, "user logged out");
    StatusCode::NO_CONTENT
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(PublicUser {
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            password_confirm: confirm.into(),
        }
    }

    #[test]
    fn registration_accepts_a_valid_payload() {
        let errors = validate_registration(&request(
            "seller",
            "seller@example.com",
            "long-enough-pw",
            "long-enough-pw",
        ));
        assert!(errors.is_empty());
    }

    #[test]
    fn registration_rejects_mismatched_confirmation() {
        let errors = validate_registration(&request(
            "seller",
            "seller@example.com",
            "long-enough-pw",
            "different-pw",
        ));
        assert!(errors.iter().any(|e| e.field == "password_confirm"));
    }

    #[test]
    fn registration_collects_every_field_error() {
        let errors = validate_registration(&request("", "nope", "short", "other"));
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["username", "email", "password", "password_confirm"]
        );
    }

    #[test]
    fn public_user_serialization() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            username: "seller".to_string(),
            email: "seller@example.com".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("seller@example.com"));
        assert!(json.contains("id"));
    }
}
