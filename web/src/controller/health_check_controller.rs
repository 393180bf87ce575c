use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use service::AppState;

/// GET health of the service.
/// Reports unhealthy once the broadcast hub has shut down, so load balancers
/// stop routing new streams to a server that is draining.
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    if app_state.hub().is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    } else {
        (StatusCode::OK, "healthy")
    }
}
