use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{CreateUserRequest, UpdateUserRequest},
    model::{NewUser, Status, User, UserChanges},
    store::StoreError,
};
use crate::{
    error::{AppError, AppResult},
    response::{ok_empty, ApiOk},
    state::AppState,
    validation::ValidJson,
};

const USER_CONFLICT: &str = "account or email already exists";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn store_err(err: StoreError) -> AppError {
    match err {
        StoreError::UniqueViolation => AppError::Conflict(USER_CONFLICT),
        StoreError::Other(e) => AppError::Internal(e),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> AppResult<ApiOk<User>> {
    let password_hash = state.hasher.hash(&payload.password)?;
    let new = NewUser {
        account: payload.username.clone(),
        username: payload.username,
        email: payload.email,
        password_hash,
        name: String::new(),
        student_no: None,
        role: payload.role.unwrap_or_default(),
        status: Status::Active,
    };
    let user = state.store.create(new).await.map_err(|e| {
        if matches!(e, StoreError::UniqueViolation) {
            warn!("create user conflict");
        }
        store_err(e)
    })?;
    info!(user_id = user.id, "user created");
    Ok(ApiOk(user, "user created"))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AppResult<ApiOk<Vec<User>>> {
    let users = state.store.list().await?;
    Ok(ApiOk(users, "ok"))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> AppResult<ApiOk<User>> {
    let user = state.store.find_by_id(id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiOk(user, "ok"))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    ValidJson(payload): ValidJson<UpdateUserRequest>,
) -> AppResult<ApiOk<User>> {
    let password_hash = payload
        .password
        .as_deref()
        .map(|p| state.hasher.hash(p))
        .transpose()?;
    let changes = UserChanges {
        email: payload.email,
        password_hash,
        role: payload.role,
        status: payload.status,
    };
    let user = state
        .store
        .update(id, changes)
        .await
        .map_err(store_err)?
        .ok_or(AppError::NotFound)?;
    info!(user_id = id, "user updated");
    Ok(ApiOk(user, "user updated"))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> AppResult<ApiOk<serde_json::Value>> {
    state.store.delete(id).await?;
    info!(user_id = id, "user deleted");
    Ok(ok_empty("user deleted"))
}
