use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod chat_routes;
pub mod doctor_routes;
pub mod review_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", doctor_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .nest("/api/v1", review_routes::router())
        .nest("/api/v1", chat_routes::router())
        .with_state(state)
}
