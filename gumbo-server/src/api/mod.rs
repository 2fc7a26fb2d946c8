//! API routes

pub mod health;
pub mod order;
pub mod product;
pub mod queue;

use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use shared::error::AppError;

use crate::auth::{api_key, rate_limit};
use crate::state::AppState;

/// Standard handler result: JSON body or enveloped error
pub(crate) type ApiResult<T> = Result<Json<T>, AppError>;

/// Create the combined router
///
/// Every /api/v1 route runs through API-key auth first, then its endpoint
/// class's rate limit. /health is open and unmetered.
pub fn create_router(state: AppState) -> Router {
    let products = Router::new()
        .route("/product", get(product::list_products))
        .route("/product/{product_id}", get(product::get_product))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::product_rate_limit,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key::api_key_middleware,
        ));

    let orders = Router::new()
        .route("/order", post(order::place_order).get(order::list_orders))
        .route("/order/{order_id}", get(order::get_order))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::order_rate_limit,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key::api_key_middleware,
        ));

    let queue = Router::new()
        .route("/queue/status", get(queue::queue_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::queue_rate_limit,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key::api_key_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", Router::new().merge(products).merge(orders).merge(queue))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(15)))
        .with_state(state)
}
