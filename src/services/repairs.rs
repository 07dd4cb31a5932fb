use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

use super::{billing, customers, invoices};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    DeviceType, InvoiceSource, NewRepair, Repair, RepairFilter, RepairStatus, RepairView,
    UpdateRepair,
};
use crate::store::{RepairQuery, ShopStore, StoreError};
use crate::utils::{ids, uploads};

pub const LIST_LIMIT: usize = 100;
const CODE_ATTEMPTS: usize = 3;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairStats {
    pub total: usize,
    pub new: usize,
    pub in_progress: usize,
    pub waiting_parts: usize,
    pub completed: usize,
    pub delivered: usize,
}

impl RepairStats {
    pub fn from_repairs(repairs: &[Repair]) -> Self {
        let count = |status: RepairStatus| repairs.iter().filter(|r| r.status == status).count();
        Self {
            total: repairs.len(),
            new: count(RepairStatus::New),
            in_progress: count(RepairStatus::InProgress),
            waiting_parts: count(RepairStatus::WaitingParts),
            completed: count(RepairStatus::Completed),
            delivered: count(RepairStatus::Delivered),
        }
    }
}

/// A photo received with the intake form, not yet written to disk.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub fn parse_status(value: Option<&str>) -> AppResult<RepairStatus> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| AppError::validation("Invalid status"))
}

async fn views(store: &dyn ShopStore, repairs: Vec<Repair>) -> AppResult<Vec<RepairView>> {
    let owners = customers::summaries(store, repairs.iter().map(|r| r.customer_id)).await?;
    Ok(repairs
        .into_iter()
        .map(|repair| RepairView {
            customer: owners.get(&repair.customer_id).cloned(),
            repair,
        })
        .collect())
}

async fn view(store: &dyn ShopStore, repair: Repair) -> AppResult<RepairView> {
    let customer = customers::summary(store, repair.customer_id).await?;
    Ok(RepairView { repair, customer })
}

pub async fn list(store: &dyn ShopStore, filter: RepairFilter) -> AppResult<(Vec<RepairView>, RepairStats)> {
    let status = match filter.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(value) => Some(parse_status(Some(value))?),
    };
    let query = RepairQuery {
        status,
        search: filter.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        limit: Some(LIST_LIMIT),
    };

    let repairs = store.list_repairs(&query).await?;
    let stats = RepairStats::from_repairs(&store.list_repairs(&RepairQuery::default()).await?);
    Ok((views(store, repairs).await?, stats))
}

pub async fn get(store: &dyn ShopStore, id: Uuid) -> AppResult<RepairView> {
    let repair = store.find_repair(id).await?.ok_or(AppError::NotFound("Repair"))?;
    view(store, repair).await
}

/// Opens a repair ticket: registers or reuses the customer by phone, stores the photo,
/// and bumps the customer's repair count. Returns the ticket and its tracking URL.
pub async fn create(
    store: &dyn ShopStore,
    config: &Config,
    intake: NewRepair,
    photo: Option<PhotoUpload>,
) -> AppResult<(RepairView, String)> {
    let customer_name = required(&intake.customer_name, "Customer name")?;
    let customer_phone = required(&intake.customer_phone, "Customer phone")?;
    let device_type: DeviceType = intake
        .device_type
        .trim()
        .parse()
        .map_err(|e: crate::models::ParseEnumError| AppError::validation(e.to_string()))?;
    let device_brand = required(&intake.device_brand, "Device brand")?;
    let device_model = required(&intake.device_model, "Device model")?;
    let issue = required(&intake.issue, "Issue")?;
    if intake.estimated_cost.is_sign_negative() || intake.deposit_amount.is_sign_negative() {
        return Err(AppError::validation("Costs cannot be negative"));
    }

    let now = Utc::now();
    let email = crate::models::customer::normalize_email(intake.customer_email);
    let mut customer = customers::find_or_create(store, &customer_name, &customer_phone, email.clone()).await?;
    if customer.email.is_none() && email.is_some() {
        customer.email = email;
        customer.updated_at = now;
        store.update_customer(&customer).await?;
    }

    let upload_dir = config.repair_upload_dir();
    let before_repair_photo = match photo.filter(|p| !p.bytes.is_empty()) {
        Some(photo) => Some(
            uploads::save_repair_photo(&upload_dir, &photo.file_name, &photo.bytes, now.timestamp_millis())
                .await
                .map_err(|e| AppError::Internal(format!("failed to store repair photo: {}", e)))?,
        ),
        None => None,
    };

    let mut repair = Repair {
        id: Uuid::new_v4(),
        repair_id: ids::repair_code(now),
        customer_id: customer.id,
        device_type,
        device_brand,
        device_model,
        imei: optional(intake.imei),
        issue,
        status: RepairStatus::New,
        assigned_parts: Vec::new(),
        estimated_cost: intake.estimated_cost,
        final_cost: Decimal::ZERO,
        deposit_amount: intake.deposit_amount,
        expected_delivery_date: intake.expected_delivery_date,
        assigned_technician: optional(intake.assigned_technician),
        before_repair_photo,
        qr_code_url: None,
        notes: optional(intake.notes),
        technician_notes: optional(intake.technician_notes),
        created_at: now,
        updated_at: now,
    };

    insert_or_discard_photo(store, config, &upload_dir, &mut repair).await?;

    customers::adjust_totals_best_effort(store, customer.id, 1, Decimal::ZERO).await;
    log::info!("Opened repair {} for customer {}", repair.repair_id, customer.id);

    let tracking_url = config.tracking_url(&repair.repair_id);
    Ok((view(store, repair).await?, tracking_url))
}

/// Inserts the repair. A photo already written for it is removed when the insert fails.
async fn insert_or_discard_photo(
    store: &dyn ShopStore,
    config: &Config,
    upload_dir: &Path,
    repair: &mut Repair,
) -> AppResult<()> {
    let err = match insert_with_fresh_code(store, config, repair).await {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    if let Some(path) = &repair.before_repair_photo {
        if let Err(io) = uploads::remove_repair_photo(upload_dir, path).await {
            log::warn!("Could not remove photo {} of unsaved repair: {}", path, io);
        }
    }
    Err(err)
}

async fn insert_with_fresh_code(store: &dyn ShopStore, config: &Config, repair: &mut Repair) -> AppResult<()> {
    let mut attempt = 1;
    loop {
        repair.qr_code_url = Some(config.tracking_url(&repair.repair_id));
        match store.insert_repair(repair).await {
            Ok(()) => return Ok(()),
            Err(StoreError::Duplicate(_)) if attempt < CODE_ATTEMPTS => {
                attempt += 1;
                repair.repair_id = ids::repair_code(Utc::now());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Full update. Moving into Completed raises the repair invoice.
pub async fn update(store: &dyn ShopStore, id: Uuid, input: UpdateRepair) -> AppResult<RepairView> {
    let previous = store.find_repair(id).await?.ok_or(AppError::NotFound("Repair"))?;
    let mut repair = previous.clone();
    input.apply(&mut repair).map_err(AppError::validation)?;

    if !store.update_repair(&repair).await? {
        return Err(AppError::NotFound("Repair"));
    }
    bill_if_completed(store, &previous, &repair).await;
    view(store, repair).await
}

/// Status transition. Returns the repair and a human-readable summary of the change.
pub async fn change_status(
    store: &dyn ShopStore,
    id: Uuid,
    status: Option<&str>,
) -> AppResult<(RepairView, String)> {
    let status = parse_status(status)?;
    let previous = store.find_repair(id).await?.ok_or(AppError::NotFound("Repair"))?;

    let mut repair = previous.clone();
    repair.status = status;
    repair.updated_at = Utc::now();
    if !store.update_repair(&repair).await? {
        return Err(AppError::NotFound("Repair"));
    }
    bill_if_completed(store, &previous, &repair).await;

    let message = format!("Status updated from {} to {}", previous.status, repair.status);
    Ok((view(store, repair).await?, message))
}

pub async fn delete(store: &dyn ShopStore, id: Uuid) -> AppResult<()> {
    let removed = store.delete_repair(id).await?.ok_or(AppError::NotFound("Repair"))?;
    customers::adjust_totals_best_effort(store, removed.customer_id, -1, Decimal::ZERO).await;
    log::info!("Deleted repair {}", removed.repair_id);
    Ok(())
}

/// Raises the invoice for a repair that just reached Completed. Failures are logged and
/// never fail the status write that triggered them.
async fn bill_if_completed(store: &dyn ShopStore, previous: &Repair, updated: &Repair) {
    if !billing::completion_is_billable(previous, updated) {
        return;
    }
    if let Err(err) = raise_repair_invoice(store, updated).await {
        log::warn!("Could not invoice completed repair {}: {}", updated.repair_id, err);
    }
}

async fn raise_repair_invoice(store: &dyn ShopStore, repair: &Repair) -> AppResult<()> {
    if store
        .find_invoice_by_source(InvoiceSource::Repair(repair.id))
        .await?
        .is_some()
    {
        log::debug!("Repair {} already invoiced", repair.repair_id);
        return Ok(());
    }

    let now = Utc::now();
    let mut invoice = billing::repair_invoice(repair, ids::invoice_number(now), now);
    invoices::insert_charging_customer(store, &mut invoice).await?;
    log::info!(
        "Generated invoice {} for repair {} (total {})",
        invoice.invoice_number,
        repair.repair_id,
        invoice.total_amount
    );
    Ok(())
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::models::{AssignedPart, InvoiceStatus};
    use crate::store::MemoryStore;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn intake(phone: &str) -> NewRepair {
        NewRepair {
            customer_name: "Ana Lopez".into(),
            customer_phone: phone.into(),
            customer_email: Some("ana@example.com".into()),
            device_type: "Phone".into(),
            device_brand: "Apple".into(),
            device_model: "iPhone 12".into(),
            issue: "Cracked screen".into(),
            estimated_cost: dec(90),
            deposit_amount: dec(30),
            ..Default::default()
        }
    }

    async fn open(store: &MemoryStore) -> Repair {
        let (view, _) = create(store, &test_config(), intake("0611"), None).await.unwrap();
        view.repair
    }

    #[tokio::test]
    async fn intake_registers_customer_and_counts_repair() {
        let store = MemoryStore::new();
        let config = test_config();

        let (view, tracking_url) = create(&store, &config, intake("0611"), None).await.unwrap();
        create(&store, &config, intake("0611"), None).await.unwrap();

        assert!(view.repair.repair_id.starts_with("REP-"));
        assert_eq!(view.repair.status, RepairStatus::New);
        assert_eq!(tracking_url, format!("http://shop.test/track/{}", view.repair.repair_id));
        assert_eq!(view.repair.qr_code_url.as_deref(), Some(tracking_url.as_str()));

        let customer = store.find_customer(view.repair.customer_id).await.unwrap().unwrap();
        assert_eq!(customer.total_repairs, 2);
        assert_eq!(view.customer.unwrap().name, "Ana Lopez");
    }

    #[tokio::test]
    async fn intake_fills_missing_email_on_known_customer() {
        let store = MemoryStore::new();
        customers::find_or_create(&store, "Ana", "0611", None).await.unwrap();

        let repair = open(&store).await;
        let customer = store.find_customer(repair.customer_id).await.unwrap().unwrap();
        assert_eq!(customer.email.as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn intake_rejects_missing_fields_and_unknown_device() {
        let store = MemoryStore::new();
        let config = test_config();

        let mut missing = intake("0611");
        missing.issue = "  ".into();
        let err = create(&store, &config, missing, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Issue is required");

        let mut device = intake("0611");
        device.device_type = "Toaster".into();
        assert!(matches!(create(&store, &config, device, None).await, Err(AppError::Validation(_))));
        assert!(store.find_customer_by_phone("0611").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn intake_stores_photo_under_uploads() {
        let store = MemoryStore::new();
        let config = test_config();
        let photo = PhotoUpload { file_name: "front side.jpg".into(), bytes: b"img".to_vec() };

        let (view, _) = create(&store, &config, intake("0611"), Some(photo)).await.unwrap();

        let path = view.repair.before_repair_photo.unwrap();
        assert!(path.starts_with("/uploads/repairs/"));
        assert!(path.ends_with("_front_side.jpg"));
        let file_name = path.trim_start_matches("/uploads/repairs/");
        assert!(config.repair_upload_dir().join(file_name).exists());
        let _ = std::fs::remove_dir_all(&config.public_dir);
    }

    #[tokio::test]
    async fn failed_insert_leaves_no_photo_behind() {
        let store = MemoryStore::new();
        let config = test_config();
        let dir = config.repair_upload_dir();
        let mut orphan = open(&store).await;
        orphan.id = Uuid::new_v4();
        orphan.customer_id = Uuid::new_v4();
        let path = uploads::save_repair_photo(&dir, "back.jpg", b"img", 1_700_000_000_000).await.unwrap();
        orphan.before_repair_photo = Some(path);

        let err = insert_or_discard_photo(&store, &config, &dir, &mut orphan).await.unwrap_err();
        assert_eq!(err.to_string(), "Customer does not exist");
        assert!(!dir.join("1700000000000_back.jpg").exists());
        assert!(store.find_repair(orphan.id).await.unwrap().is_none());
        let _ = std::fs::remove_dir_all(&config.public_dir);
    }

    #[tokio::test]
    async fn completing_a_repair_invoices_it_exactly_once() {
        let store = MemoryStore::new();
        let repair = open(&store).await;
        update(
            &store,
            repair.id,
            UpdateRepair {
                final_cost: Some(dec(100)),
                assigned_parts: Some(vec![AssignedPart {
                    part_id: Uuid::new_v4(),
                    part_name: "Adhesive".into(),
                    quantity: 2,
                    price: dec(10),
                }]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let (_, message) = change_status(&store, repair.id, Some("Completed")).await.unwrap();
        assert_eq!(message, "Status updated from New to Completed");

        // Re-completing through either path must not bill twice.
        change_status(&store, repair.id, Some("Completed")).await.unwrap();
        change_status(&store, repair.id, Some("Delivered")).await.unwrap();
        update(&store, repair.id, UpdateRepair { status: Some(RepairStatus::Completed), ..Default::default() })
            .await
            .unwrap();

        let invoices = store.list_invoices(None).await.unwrap();
        assert_eq!(invoices.len(), 1);
        let invoice = &invoices[0];
        assert_eq!(invoice.source, InvoiceSource::Repair(repair.id));
        assert_eq!(invoice.total_amount, dec(120));
        assert_eq!(invoice.paid_amount, dec(30));
        assert_eq!(invoice.status, InvoiceStatus::Partial);

        let customer = store.find_customer(repair.customer_id).await.unwrap().unwrap();
        assert_eq!(customer.total_spent, dec(120));
    }

    #[tokio::test]
    async fn completing_without_final_cost_raises_no_invoice() {
        let store = MemoryStore::new();
        let repair = open(&store).await;

        change_status(&store, repair.id, Some("Completed")).await.unwrap();
        assert!(store.list_invoices(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_status_is_rejected() {
        let store = MemoryStore::new();
        let repair = open(&store).await;

        let err = change_status(&store, repair.id, Some("Finished")).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid status");
        assert!(matches!(change_status(&store, repair.id, None).await, Err(AppError::Validation(_))));
        assert!(matches!(
            change_status(&store, Uuid::new_v4(), Some("New")).await,
            Err(AppError::NotFound("Repair"))
        ));
    }

    #[tokio::test]
    async fn deleting_decrements_customer_count() {
        let store = MemoryStore::new();
        let repair = open(&store).await;

        delete(&store, repair.id).await.unwrap();
        let customer = store.find_customer(repair.customer_id).await.unwrap().unwrap();
        assert_eq!(customer.total_repairs, 0);
        assert!(matches!(delete(&store, repair.id).await, Err(AppError::NotFound("Repair"))));
    }

    #[tokio::test]
    async fn list_filters_and_reports_stats() {
        let store = MemoryStore::new();
        let first = open(&store).await;
        open(&store).await;
        change_status(&store, first.id, Some("In Progress")).await.unwrap();

        let (repairs, stats) = list(
            &store,
            RepairFilter { status: Some("In Progress".into()), search: None },
        )
        .await
        .unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.new, 1);
        assert_eq!(stats.in_progress, 1);

        let (all, _) = list(&store, RepairFilter { status: Some("all".into()), search: Some("iphone".into()) })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.customer.is_some()));
    }
}
