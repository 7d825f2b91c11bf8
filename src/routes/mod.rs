pub mod emit;
pub mod health;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(emit::router())
        .merge(crate::gateway::server::router())
}
