use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest, TokenResponse},
        extractors::AuthUser,
        services,
    },
    error::AppResult,
    response::{ok_empty, ApiOk},
    state::AppState,
    users::model::User,
    validation::ValidJson,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<ApiOk<TokenResponse>> {
    let token = services::login(
        state.store.as_ref(),
        state.hasher.as_ref(),
        &state.keys,
        &payload,
    )
    .await?;
    Ok(ApiOk(TokenResponse { token }, "login succeeded"))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> AppResult<ApiOk<serde_json::Value>> {
    services::register(state.store.as_ref(), state.hasher.as_ref(), &payload).await?;
    Ok(ok_empty("registration succeeded"))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<ApiOk<User>> {
    let user = services::current_user(state.store.as_ref(), user_id).await?;
    Ok(ApiOk(user, "ok"))
}
