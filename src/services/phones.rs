use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{billing, customers, invoices};
use crate::error::{AppError, AppResult};
use crate::models::{
    BuyPhone, Invoice, PhoneStatus, SellPhone, UpdatePhone, UsedPhone, UsedPhoneView,
};
use crate::store::ShopStore;
use crate::utils::ids;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneStats {
    pub total: usize,
    pub bought: usize,
    pub repaired: usize,
    pub sold: usize,
    pub total_profit: Decimal,
}

impl PhoneStats {
    pub fn from_phones(phones: &[UsedPhone]) -> Self {
        let count = |status: PhoneStatus| phones.iter().filter(|p| p.status == status).count();
        Self {
            total: phones.len(),
            bought: count(PhoneStatus::Bought),
            repaired: count(PhoneStatus::Repaired),
            sold: count(PhoneStatus::Sold),
            total_profit: phones
                .iter()
                .filter(|p| p.status == PhoneStatus::Sold)
                .map(|p| p.sell_price - p.cost_basis())
                .sum(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub phone: UsedPhoneView,
    pub invoice: Invoice,
    pub profit: Decimal,
}

pub fn parse_status_filter(status: Option<&str>) -> AppResult<Option<PhoneStatus>> {
    match status.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e: crate::models::ParseEnumError| AppError::validation(e.to_string())),
    }
}

async fn view(store: &dyn ShopStore, phone: UsedPhone) -> AppResult<UsedPhoneView> {
    let buyer = match phone.buyer_id {
        Some(id) => customers::summary(store, id).await?,
        None => None,
    };
    Ok(UsedPhoneView::new(phone, buyer))
}

pub async fn list(
    store: &dyn ShopStore,
    status: Option<PhoneStatus>,
) -> AppResult<(Vec<UsedPhoneView>, PhoneStats)> {
    let all = store.list_phones(None).await?;
    let stats = PhoneStats::from_phones(&all);

    let selected: Vec<UsedPhone> = match status {
        Some(status) => all.into_iter().filter(|p| p.status == status).collect(),
        None => all,
    };
    let buyers = customers::summaries(store, selected.iter().filter_map(|p| p.buyer_id)).await?;
    let views = selected
        .into_iter()
        .map(|phone| {
            let buyer = phone.buyer_id.and_then(|id| buyers.get(&id).cloned());
            UsedPhoneView::new(phone, buyer)
        })
        .collect();
    Ok((views, stats))
}

pub async fn get(store: &dyn ShopStore, id: Uuid) -> AppResult<UsedPhoneView> {
    let phone = store.find_phone(id).await?.ok_or(AppError::NotFound("Used phone"))?;
    view(store, phone).await
}

/// Records a handset bought into stock. It always enters as Bought.
pub async fn buy(store: &dyn ShopStore, input: BuyPhone) -> AppResult<UsedPhoneView> {
    let phone = input.into_phone().map_err(AppError::validation)?;
    store.insert_phone(&phone).await?;
    log::info!("Bought phone {} {} ({})", phone.brand, phone.phone_model, phone.imei);
    Ok(UsedPhoneView::new(phone, None))
}

pub async fn update(store: &dyn ShopStore, id: Uuid, input: UpdatePhone) -> AppResult<UsedPhoneView> {
    let mut phone = store.find_phone(id).await?.ok_or(AppError::NotFound("Used phone"))?;
    input.apply(&mut phone).map_err(AppError::validation)?;

    if !store.update_phone(&phone).await? {
        return Err(AppError::NotFound("Used phone"));
    }
    view(store, phone).await
}

pub async fn delete(store: &dyn ShopStore, id: Uuid) -> AppResult<()> {
    if !store.delete_phone(id).await? {
        return Err(AppError::NotFound("Used phone"));
    }
    Ok(())
}

/// Sells a handset: registers the buyer by phone if needed, then marks the phone sold,
/// writes a settled invoice and charges the buyer in one store call.
pub async fn sell(store: &dyn ShopStore, id: Uuid, input: SellPhone) -> AppResult<Sale> {
    let phone = store.find_phone(id).await?.ok_or(AppError::NotFound("Used phone"))?;
    if phone.status == PhoneStatus::Sold {
        return Err(AppError::AlreadySold);
    }

    let sell_price = input
        .sell_price
        .map(billing::cents)
        .ok_or_else(|| AppError::validation("Sell price is required"))?;
    if sell_price <= Decimal::ZERO {
        return Err(AppError::validation("Sell price must be greater than zero"));
    }
    let buyer_name = trimmed(input.buyer_name).ok_or_else(|| AppError::validation("Buyer name is required"))?;
    let buyer_phone = trimmed(input.buyer_phone).ok_or_else(|| AppError::validation("Buyer phone is required"))?;

    let buyer = customers::find_or_create(store, &buyer_name, &buyer_phone, input.buyer_email).await?;

    let now = Utc::now();
    let mut sold = phone;
    sold.status = PhoneStatus::Sold;
    sold.sell_price = sell_price;
    sold.buyer_id = Some(buyer.id);
    sold.updated_at = now;

    let mut invoice = billing::phone_sale_invoice(&sold, buyer.id, ids::invoice_number(now), now);
    complete_sale(store, &sold, &mut invoice).await?;
    log::info!(
        "Sold phone {} to customer {} for {} (invoice {})",
        sold.imei,
        buyer.id,
        sell_price,
        invoice.invoice_number
    );

    let view = UsedPhoneView::new(sold, Some((&buyer).into()));
    Ok(Sale {
        profit: view.profit,
        phone: view,
        invoice,
    })
}

/// Writes the sale, drawing a new invoice number when the generated one is taken.
async fn complete_sale(store: &dyn ShopStore, sold: &UsedPhone, invoice: &mut Invoice) -> AppResult<()> {
    let mut attempt = 1;
    loop {
        match store.complete_phone_sale(sold, invoice).await {
            Ok(true) => return Ok(()),
            Ok(false) => return Err(AppError::AlreadySold),
            Err(err) if err.is_invoice_number_clash() && attempt < invoices::NUMBER_ATTEMPTS => {
                attempt += 1;
                log::warn!("Invoice number {} taken, drawing another", invoice.invoice_number);
                invoice.invoice_number = ids::invoice_number(Utc::now());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceSource, InvoiceStatus};
    use crate::store::{MemoryStore, StoreError};

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn purchase(imei: &str) -> BuyPhone {
        BuyPhone {
            brand: Some("Samsung".into()),
            phone_model: Some("Galaxy S21".into()),
            imei: Some(imei.into()),
            buy_price: Some(dec(200)),
            repair_cost: Some(dec(50)),
            ..Default::default()
        }
    }

    fn sale(price: i64) -> SellPhone {
        SellPhone {
            sell_price: Some(dec(price)),
            buyer_name: Some("Bob Stone".into()),
            buyer_phone: Some("0622".into()),
            buyer_email: None,
        }
    }

    #[tokio::test]
    async fn duplicate_imei_is_rejected() {
        let store = MemoryStore::new();
        buy(&store, purchase("111")).await.unwrap();

        let err = buy(&store, purchase("111")).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Duplicate(_))));
        assert_eq!(err.to_string(), "Phone with this IMEI already exists");
    }

    #[tokio::test]
    async fn selling_creates_buyer_invoice_and_profit() {
        let store = MemoryStore::new();
        let phone = buy(&store, purchase("111")).await.unwrap().phone;

        let sale = sell(&store, phone.id, sale(350)).await.unwrap();

        assert_eq!(sale.profit, dec(100));
        assert_eq!(sale.phone.phone.status, PhoneStatus::Sold);
        assert_eq!(sale.phone.buyer.as_ref().unwrap().name, "Bob Stone");
        assert_eq!(sale.invoice.source, InvoiceSource::UsedPhone(phone.id));
        assert_eq!(sale.invoice.total_amount, dec(350));
        assert_eq!(sale.invoice.paid_amount, dec(350));
        assert_eq!(sale.invoice.status, InvoiceStatus::Paid);

        let buyer = store.find_customer_by_phone("0622").await.unwrap().unwrap();
        assert_eq!(buyer.total_spent, dec(350));
    }

    #[tokio::test]
    async fn selling_twice_fails_without_second_invoice() {
        let store = MemoryStore::new();
        let phone = buy(&store, purchase("111")).await.unwrap().phone;
        sell(&store, phone.id, sale(350)).await.unwrap();

        let err = sell(&store, phone.id, sale(400)).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadySold));
        assert_eq!(store.list_invoices(None).await.unwrap().len(), 1);

        let stored = store.find_phone(phone.id).await.unwrap().unwrap();
        assert_eq!(stored.sell_price, dec(350));
    }

    #[tokio::test]
    async fn stale_sale_is_refused_by_the_store() {
        let store = MemoryStore::new();
        let phone = buy(&store, purchase("111")).await.unwrap().phone;
        let buyer = customers::find_or_create(&store, "Bob", "0622", None).await.unwrap();
        let now = Utc::now();

        let mut sold = phone.clone();
        sold.status = PhoneStatus::Sold;
        sold.sell_price = dec(300);
        sold.buyer_id = Some(buyer.id);
        let first = billing::phone_sale_invoice(&sold, buyer.id, "INV-A".into(), now);
        let second = billing::phone_sale_invoice(&sold, buyer.id, "INV-B".into(), now);

        assert!(store.complete_phone_sale(&sold, &first).await.unwrap());
        assert!(!store.complete_phone_sale(&sold, &second).await.unwrap());

        let buyer = store.find_customer(buyer.id).await.unwrap().unwrap();
        assert_eq!(buyer.total_spent, dec(300));
    }

    #[tokio::test]
    async fn sale_survives_a_clashing_invoice_number() {
        let store = MemoryStore::new();
        let first = buy(&store, purchase("111")).await.unwrap().phone;
        let second = buy(&store, purchase("222")).await.unwrap().phone;
        let taken = sell(&store, first.id, sale(350)).await.unwrap().invoice;

        let buyer = customers::find_or_create(&store, "Bob", "0622", None).await.unwrap();
        let now = Utc::now();
        let mut sold = second.clone();
        sold.status = PhoneStatus::Sold;
        sold.sell_price = dec(300);
        sold.buyer_id = Some(buyer.id);
        let mut invoice = billing::phone_sale_invoice(&sold, buyer.id, taken.invoice_number.clone(), now);

        complete_sale(&store, &sold, &mut invoice).await.unwrap();

        assert_ne!(invoice.invoice_number, taken.invoice_number);
        assert_eq!(store.list_invoices(None).await.unwrap().len(), 2);
        let stored = store.find_phone(second.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PhoneStatus::Sold);
    }

    #[tokio::test]
    async fn sale_price_is_kept_in_cents() {
        let store = MemoryStore::new();
        let phone = buy(&store, purchase("111")).await.unwrap().phone;

        let mut input = sale(0);
        input.sell_price = Some(Decimal::new(350004, 3));
        let sold = sell(&store, phone.id, input).await.unwrap();

        assert_eq!(sold.phone.phone.sell_price, Decimal::new(35000, 2));
        assert_eq!(sold.invoice.total_amount, dec(350));
        assert_eq!(sold.invoice.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn sale_requires_price_and_buyer() {
        let store = MemoryStore::new();
        let phone = buy(&store, purchase("111")).await.unwrap().phone;

        let mut no_buyer = sale(300);
        no_buyer.buyer_phone = None;
        assert_eq!(
            sell(&store, phone.id, no_buyer).await.unwrap_err().to_string(),
            "Buyer phone is required"
        );
        assert!(matches!(sell(&store, phone.id, sale(0)).await, Err(AppError::Validation(_))));
        assert!(matches!(
            sell(&store, Uuid::new_v4(), sale(300)).await,
            Err(AppError::NotFound("Used phone"))
        ));
    }

    #[tokio::test]
    async fn list_reports_profit_only_for_sold_phones() {
        let store = MemoryStore::new();
        let sold = buy(&store, purchase("111")).await.unwrap().phone;
        buy(&store, purchase("222")).await.unwrap();
        sell(&store, sold.id, sale(350)).await.unwrap();

        let (phones, stats) = list(&store, Some(PhoneStatus::Bought)).await.unwrap();
        assert_eq!(phones.len(), 1);
        assert_eq!(phones[0].profit, Decimal::ZERO);
        assert_eq!((stats.total, stats.bought, stats.sold), (2, 1, 1));
        assert_eq!(stats.total_profit, dec(100));
    }
}
