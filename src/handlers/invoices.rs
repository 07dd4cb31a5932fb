use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{message, AppState, EntityId, JsonBody};
use crate::{
    error::AppResult,
    models::{CreateInvoice, InvoiceFilter, PaymentRequest, UpdateInvoice},
    services::{billing, invoices},
};

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(filter): Query<InvoiceFilter>,
) -> AppResult<Json<Value>> {
    let status = invoices::parse_status_filter(filter.status.as_deref())?;
    let (invoices, stats) = invoices::list(state.store(), status).await?;
    Ok(Json(json!({ "invoices": invoices, "stats": stats })))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateInvoice>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let invoice = invoices::create(state.store(), input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "invoice": invoice }))))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    let invoice = invoices::get(state.store(), id).await?;
    Ok(Json(json!({ "invoice": invoice })))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(input): JsonBody<UpdateInvoice>,
) -> AppResult<Json<Value>> {
    let invoice = invoices::update(state.store(), id, input).await?;
    Ok(Json(json!({ "invoice": invoice })))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    invoices::delete(state.store(), id).await?;
    Ok(message("Invoice deleted successfully"))
}

pub async fn record_payment(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(payment): JsonBody<PaymentRequest>,
) -> AppResult<Json<Value>> {
    let invoice = invoices::record_payment(state.store(), id, payment.amount).await?;
    let amount = billing::cents(payment.amount.unwrap_or_default());
    Ok(Json(json!({
        "invoice": invoice,
        "message": format!("Payment of €{:.2} recorded successfully", amount),
    })))
}
