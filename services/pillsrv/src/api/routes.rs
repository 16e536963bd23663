//! API routes configuration

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers::*;
use crate::AppState;

/// Create API routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/users", get(list_users).post(create_user))
        .route("/medications", get(list_medications).post(create_medication))
        .route("/medications/{id}", delete(delete_medication))
        .route("/slots", get(get_slots))
        .route("/alarm_state", get(get_alarm_state))
        .route("/alarms", get(list_alarms).post(create_alarm))
        .route("/alarms/{id}", delete(delete_alarm))
        .route("/take_pill", post(take_pill))
        .route("/pill_logs", get(pill_logs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
