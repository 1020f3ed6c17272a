pub mod payment;
pub mod search;
pub mod seats;
pub mod sessions;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(search::routes())
        .merge(seats::routes())
        .merge(sessions::routes())
        .merge(payment::routes())
}
