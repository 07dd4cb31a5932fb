use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use super::AppState;
use crate::{
    error::AppResult,
    filters,
    models::{Repair, RepairStatus},
};

#[derive(Template)]
#[template(path = "track.html")]
struct TrackTemplate {
    repair_id: String,
    status: RepairStatus,
    device: String,
    device_type: String,
    customer_name: String,
    steps: Vec<TrackStep>,
    received_on: String,
    expected_on: Option<String>,
    updated_at: String,
}

#[derive(Template)]
#[template(path = "track_not_found.html")]
struct TrackNotFoundTemplate {
    repair_id: String,
}

struct TrackStep {
    label: &'static str,
    reached: bool,
    done: bool,
}

fn progress(status: RepairStatus) -> Vec<TrackStep> {
    let current = status.position();
    RepairStatus::ALL
        .iter()
        .enumerate()
        .map(|(i, step)| TrackStep {
            label: step.as_str(),
            reached: i <= current,
            done: i < current,
        })
        .collect()
}

impl TrackTemplate {
    fn new(repair: Repair, customer_name: String) -> Self {
        Self {
            device: format!("{} {}", repair.device_brand, repair.device_model),
            device_type: repair.device_type.to_string(),
            steps: progress(repair.status),
            received_on: repair.created_at.format("%d/%m/%Y").to_string(),
            expected_on: repair
                .expected_delivery_date
                .map(|d| d.format("%d/%m/%Y").to_string()),
            updated_at: repair.updated_at.format("%d/%m/%Y %H:%M").to_string(),
            status: repair.status,
            repair_id: repair.repair_id,
            customer_name,
        }
    }
}

/// Public status page behind the QR code. No session required.
pub async fn track_repair(
    State(state): State<AppState>,
    Path(repair_id): Path<String>,
) -> AppResult<Response> {
    let repair_id = repair_id.trim().to_string();
    let store = state.store();

    let repair = match store.find_repair_by_code(&repair_id).await? {
        Some(repair) => repair,
        None => {
            let page = TrackNotFoundTemplate { repair_id };
            return Ok((StatusCode::NOT_FOUND, Html(page.render()?)).into_response());
        }
    };

    let customer_name = store
        .find_customer(repair.customer_id)
        .await?
        .map(|c| c.name)
        .unwrap_or_default();

    let page = TrackTemplate::new(repair, customer_name);
    Ok(Html(page.render()?).into_response())
}
