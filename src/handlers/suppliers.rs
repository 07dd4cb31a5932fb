use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::{message, AppState, EntityId, JsonBody};
use crate::{error::AppResult, models::SupplierForm, services::suppliers};

pub async fn list_suppliers(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let suppliers = suppliers::list(state.store()).await?;
    Ok(Json(json!({ "suppliers": suppliers })))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<SupplierForm>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let supplier = suppliers::create(state.store(), form).await?;
    Ok((StatusCode::CREATED, Json(json!({ "supplier": supplier }))))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    let supplier = suppliers::get(state.store(), id).await?;
    Ok(Json(json!({ "supplier": supplier })))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(form): JsonBody<SupplierForm>,
) -> AppResult<Json<Value>> {
    let supplier = suppliers::update(state.store(), id, form).await?;
    Ok(Json(json!({ "supplier": supplier })))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    suppliers::delete(state.store(), id).await?;
    Ok(message("Supplier deleted successfully"))
}
