use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::{customer::CustomerSummary, ParseEnumError};

/// Repair pipeline stages, in workshop order. No ordering is enforced on transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepairStatus {
    #[serde(rename = "New")]
    New,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Waiting Parts")]
    WaitingParts,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Delivered")]
    Delivered,
}

impl RepairStatus {
    pub const ALL: [RepairStatus; 5] = [
        RepairStatus::New,
        RepairStatus::InProgress,
        RepairStatus::WaitingParts,
        RepairStatus::Completed,
        RepairStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::New => "New",
            RepairStatus::InProgress => "In Progress",
            RepairStatus::WaitingParts => "Waiting Parts",
            RepairStatus::Completed => "Completed",
            RepairStatus::Delivered => "Delivered",
        }
    }

    pub fn position(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or_default()
    }
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepairStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("repair status", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Phone,
    Tablet,
    Laptop,
    Computer,
    Other,
}

impl DeviceType {
    pub const ALL: [DeviceType; 5] = [
        DeviceType::Phone,
        DeviceType::Tablet,
        DeviceType::Laptop,
        DeviceType::Computer,
        DeviceType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Phone => "Phone",
            DeviceType::Tablet => "Tablet",
            DeviceType::Laptop => "Laptop",
            DeviceType::Computer => "Computer",
            DeviceType::Other => "Other",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|device| device.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("device type", s))
    }
}

/// Snapshot of a stock part taken when it was assigned; later stock price changes do not
/// affect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedPart {
    pub part_id: Uuid,
    pub part_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repair {
    pub id: Uuid,
    pub repair_id: String,
    pub customer_id: Uuid,
    pub device_type: DeviceType,
    pub device_brand: String,
    pub device_model: String,
    pub imei: Option<String>,
    pub issue: String,
    pub status: RepairStatus,
    pub assigned_parts: Vec<AssignedPart>,
    pub estimated_cost: Decimal,
    pub final_cost: Decimal,
    pub deposit_amount: Decimal,
    pub expected_delivery_date: Option<NaiveDate>,
    pub assigned_technician: Option<String>,
    pub before_repair_photo: Option<String>,
    pub qr_code_url: Option<String>,
    pub notes: Option<String>,
    pub technician_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repair {
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.repair_id.to_lowercase().contains(&needle)
            || self.device_model.to_lowercase().contains(&needle)
            || self.device_brand.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairView {
    #[serde(flatten)]
    pub repair: Repair,
    pub customer: Option<CustomerSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepairFilter {
    pub status: Option<String>,
    pub search: Option<String>,
}

/// Intake data for a new repair ticket, already extracted from the multipart form.
#[derive(Debug, Clone, Default)]
pub struct NewRepair {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub device_type: String,
    pub device_brand: String,
    pub device_model: String,
    pub imei: Option<String>,
    pub issue: String,
    pub estimated_cost: Decimal,
    pub deposit_amount: Decimal,
    pub expected_delivery_date: Option<NaiveDate>,
    pub assigned_technician: Option<String>,
    pub technician_notes: Option<String>,
    pub notes: Option<String>,
    pub before_repair_photo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRepair {
    pub device_type: Option<DeviceType>,
    pub device_brand: Option<String>,
    pub device_model: Option<String>,
    pub imei: Option<String>,
    pub issue: Option<String>,
    pub status: Option<RepairStatus>,
    pub assigned_parts: Option<Vec<AssignedPart>>,
    pub estimated_cost: Option<Decimal>,
    pub final_cost: Option<Decimal>,
    pub deposit_amount: Option<Decimal>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub assigned_technician: Option<String>,
    pub notes: Option<String>,
    pub technician_notes: Option<String>,
}

impl UpdateRepair {
    pub fn apply(self, repair: &mut Repair) -> Result<(), &'static str> {
        if let Some(device_type) = self.device_type {
            repair.device_type = device_type;
        }
        if let Some(brand) = self.device_brand {
            repair.device_brand = brand.trim().to_string();
        }
        if let Some(model) = self.device_model {
            repair.device_model = model.trim().to_string();
        }
        if self.imei.is_some() {
            repair.imei = self.imei.filter(|i| !i.trim().is_empty());
        }
        if let Some(issue) = self.issue {
            repair.issue = issue.trim().to_string();
        }
        if let Some(status) = self.status {
            repair.status = status;
        }
        if let Some(parts) = self.assigned_parts {
            if parts.iter().any(|p| p.quantity < 1 || p.price.is_sign_negative()) {
                return Err("Assigned parts need a quantity of at least 1 and a non-negative price");
            }
            repair.assigned_parts = parts;
        }
        if let Some(cost) = self.estimated_cost {
            repair.estimated_cost = cost;
        }
        if let Some(cost) = self.final_cost {
            repair.final_cost = cost;
        }
        if let Some(deposit) = self.deposit_amount {
            repair.deposit_amount = deposit;
        }
        if self.expected_delivery_date.is_some() {
            repair.expected_delivery_date = self.expected_delivery_date;
        }
        if self.assigned_technician.is_some() {
            repair.assigned_technician = self.assigned_technician;
        }
        if self.notes.is_some() {
            repair.notes = self.notes;
        }
        if self.technician_notes.is_some() {
            repair.technician_notes = self.technician_notes;
        }

        if repair.device_brand.is_empty() || repair.device_model.is_empty() || repair.issue.is_empty() {
            return Err("Device brand, device model and issue cannot be empty");
        }
        if repair.estimated_cost.is_sign_negative()
            || repair.final_cost.is_sign_negative()
            || repair.deposit_amount.is_sign_negative()
        {
            return Err("Costs cannot be negative");
        }
        repair.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_names() {
        for status in RepairStatus::ALL {
            assert_eq!(status.as_str().parse::<RepairStatus>().unwrap(), status);
        }
        assert!("Finished".parse::<RepairStatus>().is_err());
        assert!("in progress".parse::<RepairStatus>().is_err());
    }

    #[test]
    fn status_serializes_with_spaces() {
        let json = serde_json::to_string(&RepairStatus::WaitingParts).unwrap();
        assert_eq!(json, "\"Waiting Parts\"");
        let parsed: RepairStatus = serde_json::from_str("\"In Progress\"").unwrap();
        assert_eq!(parsed, RepairStatus::InProgress);
    }

    #[test]
    fn positions_follow_pipeline_order() {
        assert_eq!(RepairStatus::New.position(), 0);
        assert_eq!(RepairStatus::Completed.position(), 3);
        assert_eq!(RepairStatus::Delivered.position(), 4);
    }
}
