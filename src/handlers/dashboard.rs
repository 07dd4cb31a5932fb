use axum::{extract::State, Json};

use super::AppState;
use crate::{error::AppResult, services::dashboard::{self, DashboardStats}};

pub async fn get_stats(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    let stats = dashboard::load(state.store()).await?;
    Ok(Json(stats))
}
