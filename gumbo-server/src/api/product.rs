//! Product endpoints: catalog list and single lookup

use axum::extract::{Path, State};
use axum::Json;
use shared::error::{AppError, ErrorCode};
use shared::models::Product;
use uuid::Uuid;

use crate::db;
use crate::state::AppState;

use super::ApiResult;

/// GET /api/v1/product
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    let products = db::products::list(&state.pool).await?;
    Ok(Json(products))
}

/// GET /api/v1/product/{product_id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Product> {
    let id: Uuid = product_id
        .parse()
        .map_err(|_| AppError::new(ErrorCode::ProductIdInvalid))?;

    match db::products::find(&state.pool, id).await? {
        Some(product) => Ok(Json(product)),
        None => Err(AppError::new(ErrorCode::ProductNotFound)),
    }
}
