use crate::state::AppState;
use axum::Router;

mod dto;
pub mod extractors;
pub mod gate;
pub mod handlers;
pub mod password;
pub mod repo_types;
pub mod services;

pub fn router(expose_user_list: bool) -> Router<AppState> {
    let router = Router::new().merge(handlers::auth_routes());
    if expose_user_list {
        router.merge(handlers::user_list_routes())
    } else {
        router
    }
}
