use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::{customer::CustomerSummary, ParseEnumError};

/// Payment state of an invoice. Always derived from the amounts, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Paid,
    Partial,
    Overdue,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 3] = [InvoiceStatus::Paid, InvoiceStatus::Partial, InvoiceStatus::Overdue];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Partial => "Partial",
            InvoiceStatus::Overdue => "Overdue",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("invoice status", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceKind {
    Repair,
    UsedPhone,
}

impl InvoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::Repair => "Repair",
            InvoiceKind::UsedPhone => "UsedPhone",
        }
    }
}

impl FromStr for InvoiceKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Repair" => Ok(InvoiceKind::Repair),
            "UsedPhone" => Ok(InvoiceKind::UsedPhone),
            other => Err(ParseEnumError::new("invoice type", other)),
        }
    }
}

/// What an invoice bills for. Serialized as `"type"` plus `"reference"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "reference")]
pub enum InvoiceSource {
    Repair(Uuid),
    UsedPhone(Uuid),
}

impl InvoiceSource {
    pub fn new(kind: InvoiceKind, reference: Uuid) -> Self {
        match kind {
            InvoiceKind::Repair => InvoiceSource::Repair(reference),
            InvoiceKind::UsedPhone => InvoiceSource::UsedPhone(reference),
        }
    }

    pub fn kind(&self) -> InvoiceKind {
        match self {
            InvoiceSource::Repair(_) => InvoiceKind::Repair,
            InvoiceSource::UsedPhone(_) => InvoiceKind::UsedPhone,
        }
    }

    pub fn reference(&self) -> Uuid {
        match self {
            InvoiceSource::Repair(id) | InvoiceSource::UsedPhone(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl InvoiceItem {
    pub fn new(description: impl Into<String>, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            total: unit_price * Decimal::from(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    #[serde(flatten)]
    pub source: InvoiceSource,
    pub customer_id: Uuid,
    pub items: Vec<InvoiceItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub paid_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn outstanding(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub outstanding_amount: Decimal,
    pub customer: Option<CustomerSummary>,
}

impl InvoiceView {
    pub fn new(invoice: Invoice, customer: Option<CustomerSummary>) -> Self {
        Self {
            outstanding_amount: invoice.outstanding(),
            invoice,
            customer,
        }
    }
}

/// Fields written by a payment; the rest of the invoice is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub paid_amount: Decimal,
    pub status: InvoiceStatus,
    pub paid_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    pub invoice_number: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<InvoiceKind>,
    pub reference: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub paid_amount: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Full-record edit. Any client-supplied `status` is ignored; it is re-derived on save.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoice {
    pub customer_id: Option<Uuid>,
    pub items: Option<Vec<InvoiceItem>>,
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub paid_amount: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_serializes_as_type_and_reference() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(InvoiceSource::Repair(id)).unwrap();
        assert_eq!(json["type"], "Repair");
        assert_eq!(json["reference"], id.to_string());

        let parsed: InvoiceSource =
            serde_json::from_value(serde_json::json!({ "type": "UsedPhone", "reference": id })).unwrap();
        assert_eq!(parsed, InvoiceSource::UsedPhone(id));
        assert_eq!(parsed.kind(), InvoiceKind::UsedPhone);
        assert_eq!(parsed.reference(), id);
    }

    #[test]
    fn item_total_is_quantity_times_unit_price() {
        let item = InvoiceItem::new("Battery", 2, Decimal::new(1050, 2));
        assert_eq!(item.total, Decimal::new(2100, 2));
    }
}
