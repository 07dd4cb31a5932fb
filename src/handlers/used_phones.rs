use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{message, AppState, EntityId, JsonBody};
use crate::{
    error::AppResult,
    models::{BuyPhone, PhoneFilter, SellPhone, UpdatePhone},
    services::phones::{self, Sale},
};

pub async fn list_phones(
    State(state): State<AppState>,
    Query(filter): Query<PhoneFilter>,
) -> AppResult<Json<Value>> {
    let status = phones::parse_status_filter(filter.status.as_deref())?;
    let (phones, stats) = phones::list(state.store(), status).await?;
    Ok(Json(json!({ "phones": phones, "stats": stats })))
}

pub async fn buy_phone(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<BuyPhone>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let phone = phones::buy(state.store(), input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "phone": phone }))))
}

pub async fn get_phone(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    let phone = phones::get(state.store(), id).await?;
    Ok(Json(json!({ "phone": phone })))
}

pub async fn update_phone(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(input): JsonBody<UpdatePhone>,
) -> AppResult<Json<Value>> {
    let phone = phones::update(state.store(), id, input).await?;
    Ok(Json(json!({ "phone": phone })))
}

pub async fn delete_phone(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    phones::delete(state.store(), id).await?;
    Ok(message("Used phone deleted successfully"))
}

pub async fn sell_phone(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(input): JsonBody<SellPhone>,
) -> AppResult<Json<Sale>> {
    let sale = phones::sell(state.store(), id, input).await?;
    Ok(Json(sale))
}
