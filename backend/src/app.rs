use axum::{
    extract::Request,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    docs,
    handlers::{password_reset, users},
    middleware::{
        csrf::CSRF_HEADER_NAME, csrf_protect, current_user, request_id, require_user, RequestId,
    },
    state::AppState,
};

/// Builds the HTTP application. Every route sits behind the request id,
/// trace, CORS, CSRF and session layers, in that order.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/users", post(users::signup))
        .route("/api/signin", post(users::signin))
        .route("/api/signout", post(users::signout))
        .route("/api/csrf", get(users::csrf_token))
        .route("/api/forgot-password", post(password_reset::forgot_password))
        .route("/api/reset-password", post(password_reset::reset_password))
        .route("/api/openapi.json", get(docs::openapi_json));

    let user_routes = Router::new()
        .route("/api/users/me", get(users::me))
        .route_layer(axum_middleware::from_fn(require_user));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.0.as_str())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id
                    )
                }))
                .layer(cors_layer(&state.config.cors_allow_origins))
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    csrf_protect,
                ))
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    current_user,
                )),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(CSRF_HEADER_NAME)])
        .allow_credentials(true)
}
