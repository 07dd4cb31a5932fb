use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{message, AppState, EntityId, JsonBody};
use crate::{
    error::AppResult,
    models::{StockFilter, StockForm, StockItem, StockItemView},
    services::stock,
};

fn views(items: Vec<StockItem>) -> Vec<StockItemView> {
    items.into_iter().map(StockItemView::from).collect()
}

pub async fn list_stock(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Value>> {
    let items = stock::list(state.store(), filter).await?;
    Ok(Json(json!({ "items": views(items) })))
}

pub async fn low_stock(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let items = stock::low_stock(state.store()).await?;
    Ok(Json(json!({ "items": views(items) })))
}

pub async fn create_stock(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<StockForm>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let item = stock::create(state.store(), form).await?;
    Ok((StatusCode::CREATED, Json(json!({ "item": StockItemView::from(item) }))))
}

pub async fn get_stock(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    let item = stock::get(state.store(), id).await?;
    Ok(Json(json!({ "item": StockItemView::from(item) })))
}

pub async fn update_stock(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(form): JsonBody<StockForm>,
) -> AppResult<Json<Value>> {
    let item = stock::update(state.store(), id, form).await?;
    Ok(Json(json!({ "item": StockItemView::from(item) })))
}

pub async fn delete_stock(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    stock::delete(state.store(), id).await?;
    Ok(message("Stock item deleted successfully"))
}
