use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{extractors::CurrentUser, password::hash_password},
    db::AppState,
    error::ApiError,
    users::{
        dto::{Message, Pagination, PublicUser, UpdateMe},
        repo::{User, UserChanges},
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(me).put(update_me).delete(delete_me))
}

#[instrument(skip_all)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = User::list(&state.db, p.skip, p.limit).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[instrument(skip_all)]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateMe>,
) -> Result<Json<PublicUser>, ApiError> {
    // An empty password means "leave it alone", matching the register rule
    // that real passwords are non-empty.
    let password_hash = match payload.password.as_deref().filter(|p| !p.is_empty()) {
        Some(plain) => Some(hash_password(plain)?),
        None => None,
    };

    let changes = UserChanges {
        email: payload.email,
        username: payload.username,
        password_hash,
    };
    let updated = User::update(&state.db, user.id, changes).await?;

    info!(user_id = updated.id, "user updated");
    Ok(Json(updated.into()))
}

#[instrument(skip_all)]
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Message>, ApiError> {
    User::delete(&state.db, user.id).await?;
    info!(user_id = user.id, username = %user.username, "user deleted");
    Ok(Json(Message {
        message: "User account deleted successfully".into(),
    }))
}
