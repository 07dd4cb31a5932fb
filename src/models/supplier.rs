use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::customer::normalize_email;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl SupplierForm {
    pub fn into_supplier(self) -> Result<Supplier, &'static str> {
        let name = required(self.name).ok_or("Supplier name is required")?;
        let email = normalize_email(self.email).ok_or("Email is required")?;
        let phone = required(self.phone).ok_or("Phone number is required")?;
        let now = Utc::now();

        Ok(Supplier {
            id: Uuid::new_v4(),
            name,
            email,
            phone,
            address: required(self.address),
            notes: required(self.notes),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(self, supplier: &mut Supplier) {
        if let Some(name) = required(self.name) {
            supplier.name = name;
        }
        if let Some(email) = normalize_email(self.email) {
            supplier.email = email;
        }
        if let Some(phone) = required(self.phone) {
            supplier.phone = phone;
        }
        if self.address.is_some() {
            supplier.address = required(self.address);
        }
        if self.notes.is_some() {
            supplier.notes = required(self.notes);
        }
        supplier.updated_at = Utc::now();
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
