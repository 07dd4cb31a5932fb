use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{message, AppState, EntityId, JsonBody};
use crate::{
    error::AppResult,
    models::{CreateCustomer, UpdateCustomer},
    services::customers,
};

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
}

pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<Value>> {
    let customers = customers::list(state.store(), query.search.as_deref()).await?;
    Ok(Json(json!({ "customers": customers })))
}

pub async fn create_customer(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateCustomer>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let customer = customers::create(state.store(), input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "customer": customer }))))
}

pub async fn get_customer(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    let customer = customers::get(state.store(), id).await?;
    Ok(Json(json!({ "customer": customer })))
}

pub async fn update_customer(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(input): JsonBody<UpdateCustomer>,
) -> AppResult<Json<Value>> {
    let customer = customers::update(state.store(), id, input).await?;
    Ok(Json(json!({ "customer": customer })))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    customers::delete(state.store(), id).await?;
    Ok(message("Customer deleted successfully"))
}

pub async fn recompute_customer(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    let customer = customers::recompute(state.store(), id).await?;
    Ok(Json(json!({ "customer": customer })))
}

pub async fn recompute_all_customers(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let updated = customers::recompute_all(state.store()).await?;
    log::info!("Customer reconciliation updated {} record(s)", updated);
    Ok(Json(json!({ "updated": updated })))
}
