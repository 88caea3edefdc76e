use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod repo;
pub mod store;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
