use crate::api::handlers::{devices, health, patients, temperature};
use crate::api::{middleware::require_auth, AppState};
use axum::{
    extract::Request,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::Level;

pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health::health));

    let api_routes = Router::new()
        .route(
            "/api/v1/patients",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route(
            "/api/v1/patients/{patient_id}",
            get(patients::get_patient).delete(patients::delete_patient),
        )
        .route(
            "/api/v1/patients/{patient_id}/binding",
            get(patients::get_binding),
        )
        .route(
            "/api/v1/patients/{patient_id}/device",
            post(devices::assign_device),
        )
        .route(
            "/api/v1/patients/{patient_id}/temperatures",
            get(temperature::get_history),
        )
        .route("/api/v1/devices/unassigned", get(devices::list_unassigned))
        .route(
            "/api/v1/devices/{mac_address}/interval",
            put(devices::set_interval),
        )
        .route(
            "/api/v1/devices/{mac_address}/reset",
            post(devices::reset_device),
        )
        .route("/api/v1/temperatures", get(temperature::get_readings))
        .route("/api/v1/temperatures/latest", get(temperature::get_latest))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(
                    |response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(
                            Level::INFO,
                            status = response.status().as_u16(),
                            latency = ?latency,
                            "request completed"
                        );
                    },
                )
                .on_failure(
                    |error: tower_http::classify::ServerErrorsFailureClass,
                     _latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::ERROR, error = %error, "request failed");
                    },
                ),
        )
}
