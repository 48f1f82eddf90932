use axum::{
    extract::{FromRef, State},
    routing::post,
    Form, Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{RegisterRequest, TokenRequest, TokenResponse},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    db::AppState,
    error::ApiError,
    users::{dto::PublicUser, repo::User},
};

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(token))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    payload.email = payload.email.trim().to_string();
    payload.username = payload.username.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if payload.username.is_empty() {
        return Err(ApiError::BadRequest("Username must not be empty".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    // Pre-checks give precise messages; the UNIQUE constraints remain the
    // backstop if two registrations race.
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered"));
    }
    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already taken");
        return Err(ApiError::Conflict("Username already taken"));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.email, &payload.username, &hash).await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(Json(user.into()))
}

#[instrument(skip(state, form))]
pub async fn token(
    State(state): State<AppState>,
    Form(form): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = User::find_by_username(&state.db, &form.username)
        .await?
        .ok_or_else(|| {
            warn!(username = %form.username, "login with unknown username");
            ApiError::Unauthorized("Incorrect username or password")
        })?;

    if !verify_password(&form.password, &user.password_hash) {
        warn!(user_id = user.id, "login with invalid password");
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(&user.username)?;

    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}
