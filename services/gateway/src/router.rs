use crate::handlers::{instruments, ws};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/instruments",
            get(instruments::list_instruments).post(instruments::create_instrument),
        )
        .route(
            "/instruments/{id}",
            get(instruments::get_instrument)
                .patch(instruments::merge_instrument)
                .delete(instruments::delete_instrument),
        )
        .route("/limits", put(instruments::update_limits))
        .route("/simulator/pause", post(instruments::pause_simulator))
        .route("/simulator/resume", post(instruments::resume_simulator))
        .route("/stats", get(instruments::stats))
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/v1", api_routes)
        .route("/health", get(instruments::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
