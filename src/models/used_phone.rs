use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::{customer::CustomerSummary, ParseEnumError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhoneStatus {
    Bought,
    Repaired,
    Sold,
}

impl PhoneStatus {
    pub const ALL: [PhoneStatus; 3] = [PhoneStatus::Bought, PhoneStatus::Repaired, PhoneStatus::Sold];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhoneStatus::Bought => "Bought",
            PhoneStatus::Repaired => "Repaired",
            PhoneStatus::Sold => "Sold",
        }
    }
}

impl fmt::Display for PhoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhoneStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("phone status", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedPhone {
    pub id: Uuid,
    pub brand: String,
    pub phone_model: String,
    pub imei: String,
    pub condition: String,
    pub buy_price: Decimal,
    pub repair_cost: Decimal,
    pub sell_price: Decimal,
    pub status: PhoneStatus,
    pub buyer_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsedPhone {
    /// Money put into the handset: purchase price plus refurbishment.
    pub fn cost_basis(&self) -> Decimal {
        self.buy_price + self.repair_cost
    }

    /// Margin realised on a sold handset; zero until the phone is sold at a positive price.
    pub fn profit(&self) -> Decimal {
        if self.status == PhoneStatus::Sold && self.sell_price > Decimal::ZERO {
            self.sell_price - self.cost_basis()
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedPhoneView {
    #[serde(flatten)]
    pub phone: UsedPhone,
    pub buyer: Option<CustomerSummary>,
    pub profit: Decimal,
}

impl UsedPhoneView {
    pub fn new(phone: UsedPhone, buyer: Option<CustomerSummary>) -> Self {
        Self {
            profit: phone.profit(),
            phone,
            buyer,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyPhone {
    pub brand: Option<String>,
    pub phone_model: Option<String>,
    pub imei: Option<String>,
    pub condition: Option<String>,
    pub buy_price: Option<Decimal>,
    pub repair_cost: Option<Decimal>,
    pub notes: Option<String>,
}

impl BuyPhone {
    pub fn into_phone(self) -> Result<UsedPhone, &'static str> {
        let brand = trimmed(self.brand).ok_or("Brand is required")?;
        let phone_model = trimmed(self.phone_model).ok_or("Model is required")?;
        let imei = trimmed(self.imei).ok_or("IMEI is required")?;
        let buy_price = self.buy_price.ok_or("Buy price is required")?;
        let repair_cost = self.repair_cost.unwrap_or(Decimal::ZERO);
        if buy_price.is_sign_negative() || repair_cost.is_sign_negative() {
            return Err("Prices cannot be negative");
        }

        let now = Utc::now();
        Ok(UsedPhone {
            id: Uuid::new_v4(),
            brand,
            phone_model,
            imei,
            condition: trimmed(self.condition).unwrap_or_else(|| "Good".to_string()),
            buy_price,
            repair_cost,
            sell_price: Decimal::ZERO,
            status: PhoneStatus::Bought,
            buyer_id: None,
            notes: trimmed(self.notes),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhone {
    pub brand: Option<String>,
    pub phone_model: Option<String>,
    pub imei: Option<String>,
    pub condition: Option<String>,
    pub buy_price: Option<Decimal>,
    pub repair_cost: Option<Decimal>,
    pub sell_price: Option<Decimal>,
    pub status: Option<PhoneStatus>,
    pub notes: Option<String>,
}

impl UpdatePhone {
    pub fn apply(self, phone: &mut UsedPhone) -> Result<(), &'static str> {
        if let Some(status) = self.status {
            match (phone.status, status) {
                (PhoneStatus::Sold, PhoneStatus::Sold) => {}
                (PhoneStatus::Sold, _) => return Err("A sold phone cannot change status"),
                (_, PhoneStatus::Sold) => return Err("Use the sell action to mark a phone as sold"),
                _ => phone.status = status,
            }
        }
        if let Some(brand) = trimmed(self.brand) {
            phone.brand = brand;
        }
        if let Some(model) = trimmed(self.phone_model) {
            phone.phone_model = model;
        }
        if let Some(imei) = trimmed(self.imei) {
            phone.imei = imei;
        }
        if let Some(condition) = trimmed(self.condition) {
            phone.condition = condition;
        }
        if let Some(price) = self.buy_price {
            phone.buy_price = price;
        }
        if let Some(cost) = self.repair_cost {
            phone.repair_cost = cost;
        }
        if let Some(price) = self.sell_price {
            phone.sell_price = price;
        }
        if self.notes.is_some() {
            phone.notes = trimmed(self.notes);
        }

        if phone.buy_price.is_sign_negative()
            || phone.repair_cost.is_sign_negative()
            || phone.sell_price.is_sign_negative()
        {
            return Err("Prices cannot be negative");
        }
        phone.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellPhone {
    pub sell_price: Option<Decimal>,
    pub buyer_name: Option<String>,
    pub buyer_phone: Option<String>,
    pub buyer_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PhoneFilter {
    pub status: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
