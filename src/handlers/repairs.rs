use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Multipart;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

use super::{message, AppState, EntityId, JsonBody};
use crate::{
    error::{AppError, AppResult},
    models::{NewRepair, RepairFilter, StatusChange, UpdateRepair},
    services::repairs::{self, PhotoUpload},
};

const PHOTO_FIELD: &str = "beforeRepairPhoto";

pub async fn list_repairs(
    State(state): State<AppState>,
    Query(filter): Query<RepairFilter>,
) -> AppResult<Json<Value>> {
    let (repairs, stats) = repairs::list(state.store(), filter).await?;
    Ok(Json(json!({ "repairs": repairs, "stats": stats })))
}

pub async fn create_repair(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    let (intake, photo) = parse_repair_multipart(multipart).await?;
    let (repair, tracking_url) = repairs::create(state.store(), &state.config, intake, photo).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "repair": repair, "trackingUrl": tracking_url })),
    ))
}

pub async fn get_repair(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    let repair = repairs::get(state.store(), id).await?;
    Ok(Json(json!({ "repair": repair })))
}

pub async fn update_repair(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(input): JsonBody<UpdateRepair>,
) -> AppResult<Json<Value>> {
    let repair = repairs::update(state.store(), id, input).await?;
    Ok(Json(json!({ "repair": repair })))
}

pub async fn update_repair_status(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(change): JsonBody<StatusChange>,
) -> AppResult<Json<Value>> {
    let (repair, summary) = repairs::change_status(state.store(), id, change.status.as_deref()).await?;
    Ok(Json(json!({ "repair": repair, "message": summary })))
}

pub async fn delete_repair(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> AppResult<Json<Value>> {
    repairs::delete(state.store(), id).await?;
    Ok(message("Repair deleted successfully"))
}

async fn parse_repair_multipart(mut multipart: Multipart) -> AppResult<(NewRepair, Option<PhotoUpload>)> {
    let mut intake = NewRepair::default();
    let mut photo = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::validation(err.body_text()))?
    {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        if name == PHOTO_FIELD {
            let file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::validation(err.body_text()))?;
            if let Some(file_name) = file_name {
                if !bytes.is_empty() {
                    photo = Some(PhotoUpload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|err| AppError::validation(err.body_text()))?;
        let text = text.trim().to_string();
        if text.is_empty() {
            continue;
        }

        match name.as_str() {
            "customerName" => intake.customer_name = text,
            "customerPhone" => intake.customer_phone = text,
            "customerEmail" => intake.customer_email = Some(text),
            "deviceType" => intake.device_type = text,
            "deviceBrand" => intake.device_brand = text,
            "deviceModel" => intake.device_model = text,
            "imei" => intake.imei = Some(text),
            "issue" => intake.issue = text,
            "estimatedCost" => intake.estimated_cost = parse_amount(&text),
            "depositAmount" => intake.deposit_amount = parse_amount(&text),
            "expectedDeliveryDate" => {
                intake.expected_delivery_date = NaiveDate::parse_from_str(&text, "%Y-%m-%d").ok()
            }
            "assignedTechnician" => intake.assigned_technician = Some(text),
            "technicianNotes" => intake.technician_notes = Some(text),
            "notes" => intake.notes = Some(text),
            _ => (),
        }
    }
    Ok((intake, photo))
}

// Unparseable amounts count as zero.
fn parse_amount(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap_or_default()
}
