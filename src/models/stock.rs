use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub const DEFAULT_REORDER_LEVEL: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: Uuid,
    pub part_name: String,
    pub sku: String,
    pub category: String,
    pub quantity: i32,
    pub reorder_level: i32,
    pub supplier_id: Option<Uuid>,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// An item is low on stock once it has fallen to its reorder level, not below it.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.part_name.to_lowercase().contains(&needle) || self.sku.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItemView {
    #[serde(flatten)]
    pub item: StockItem,
    pub is_low_stock: bool,
}

impl From<StockItem> for StockItemView {
    fn from(item: StockItem) -> Self {
        Self {
            is_low_stock: item.is_low_stock(),
            item,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StockFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockForm {
    pub part_name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<i32>,
    pub reorder_level: Option<i32>,
    pub supplier_id: Option<Uuid>,
    pub price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
}

impl StockForm {
    pub fn into_item(self) -> Result<StockItem, &'static str> {
        let part_name = trimmed(self.part_name).ok_or("Part name is required")?;
        let sku = trimmed(self.sku).ok_or("SKU is required")?;
        let category = trimmed(self.category).ok_or("Category is required")?;
        let price = self.price.ok_or("Selling price is required")?;
        let cost_price = self.cost_price.ok_or("Cost price is required")?;
        let quantity = self.quantity.unwrap_or(0);
        let reorder_level = self.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL);

        if quantity < 0 || reorder_level < 0 {
            return Err("Quantity and reorder level cannot be negative");
        }
        if price.is_sign_negative() || cost_price.is_sign_negative() {
            return Err("Prices cannot be negative");
        }

        let now = Utc::now();
        Ok(StockItem {
            id: Uuid::new_v4(),
            part_name,
            sku,
            category,
            quantity,
            reorder_level,
            supplier_id: self.supplier_id,
            price,
            cost_price,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(self, item: &mut StockItem) -> Result<(), &'static str> {
        if let Some(part_name) = trimmed(self.part_name) {
            item.part_name = part_name;
        }
        if let Some(sku) = trimmed(self.sku) {
            item.sku = sku;
        }
        if let Some(category) = trimmed(self.category) {
            item.category = category;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(reorder_level) = self.reorder_level {
            item.reorder_level = reorder_level;
        }
        if self.supplier_id.is_some() {
            item.supplier_id = self.supplier_id;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(cost_price) = self.cost_price {
            item.cost_price = cost_price;
        }

        if item.quantity < 0 || item.reorder_level < 0 {
            return Err("Quantity and reorder level cannot be negative");
        }
        if item.price.is_sign_negative() || item.cost_price.is_sign_negative() {
            return Err("Prices cannot be negative");
        }
        item.updated_at = Utc::now();
        Ok(())
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i32, reorder_level: i32) -> StockItem {
        StockForm {
            part_name: Some("iPhone 12 Screen".into()),
            sku: Some("SCR-0012".into()),
            category: Some("Screens".into()),
            quantity: Some(quantity),
            reorder_level: Some(reorder_level),
            price: Some(Decimal::from(80)),
            cost_price: Some(Decimal::from(45)),
            ..Default::default()
        }
        .into_item()
        .unwrap()
    }

    #[test]
    fn low_stock_includes_the_reorder_boundary() {
        assert!(item(2, 5).is_low_stock());
        assert!(item(5, 5).is_low_stock());
        assert!(!item(6, 5).is_low_stock());
        assert!(item(0, 0).is_low_stock());
    }

    #[test]
    fn reorder_level_defaults_to_five() {
        let item = StockForm {
            part_name: Some("Battery".into()),
            sku: Some("BAT-1".into()),
            category: Some("Batteries".into()),
            price: Some(Decimal::from(30)),
            cost_price: Some(Decimal::from(12)),
            ..Default::default()
        }
        .into_item()
        .unwrap();

        assert_eq!(item.reorder_level, DEFAULT_REORDER_LEVEL);
        assert_eq!(item.quantity, 0);
        assert!(item.is_low_stock());
    }

    #[test]
    fn missing_sku_is_rejected() {
        let err = StockForm {
            part_name: Some("Battery".into()),
            category: Some("Batteries".into()),
            price: Some(Decimal::from(30)),
            cost_price: Some(Decimal::from(12)),
            ..Default::default()
        }
        .into_item()
        .unwrap_err();

        assert_eq!(err, "SKU is required");
    }

    #[test]
    fn view_serializes_low_stock_flag() {
        let view = StockItemView::from(item(1, 3));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["isLowStock"], true);
        assert_eq!(json["partName"], "iPhone 12 Screen");
        assert_eq!(json["reorderLevel"], 3);
    }
}
