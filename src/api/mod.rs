pub mod energy;
pub mod error;
pub mod health;
pub mod schedules;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, controller::AppState};

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route("/schedules/import", post(schedules::import_schedules))
        .route("/schedules/export", get(schedules::export_schedules))
        .route("/schedules/history", get(schedules::execution_history))
        .route("/schedules/reconcile", post(schedules::reconcile_now))
        .route(
            "/schedules/:id",
            get(schedules::get_schedule)
                .put(schedules::update_schedule)
                .delete(schedules::delete_schedule),
        )
        .route("/schedules/:id/toggle", patch(schedules::toggle_schedule))
        .route("/energy/sites/:id/live_status", get(energy::live_status))
        .route("/energy/sites/:id/power_flow", get(energy::power_flow))
        .route("/energy/sites/:id/solar_forecast", get(energy::solar_forecast))
        .route(
            "/energy/sites/:id/forecast",
            put(energy::set_forecast).delete(energy::clear_forecast),
        )
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .nest("/api", api_router())
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .with_state(state);

    if cfg.server.enable_cors {
        use tower_http::cors::Any;
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::PATCH,
                axum::http::Method::DELETE,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}
