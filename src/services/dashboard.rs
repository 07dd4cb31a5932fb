use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{invoices::InvoiceStats, phones::PhoneStats, repairs::RepairStats};
use crate::error::AppResult;
use crate::models::{Invoice, InvoiceStatus, PhoneStatus, Repair, UsedPhone};
use crate::store::{RepairQuery, ShopStore};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub repairs: RepairSummary,
    pub invoices: InvoiceSummary,
    pub phones: PhoneSummary,
    pub low_stock_count: usize,
    pub financial: FinancialSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSummary {
    #[serde(flatten)]
    pub counts: RepairStats,
    pub today: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    #[serde(flatten)]
    pub counts: InvoiceStats,
    pub total_revenue: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneSummary {
    #[serde(flatten)]
    pub counts: PhoneStats,
    pub total_investment: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
}

/// `[start, end)` of the server's local calendar day containing `now`, in UTC.
pub fn local_day_bounds(now: DateTime<Local>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let start = local_midnight(today);
    let end = today
        .succ_opt()
        .map(local_midnight)
        .unwrap_or_else(|| start + chrono::Duration::days(1));
    (start, end)
}

fn local_midnight(day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(chrono::NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Aggregates a snapshot of the shop. Net profit subtracts the cost of every phone and
/// then adds back sold-phone profit, so sold handsets are costed twice.
pub fn summarize(
    repairs: &[Repair],
    invoices: &[Invoice],
    phones: &[UsedPhone],
    low_stock_count: usize,
    today: (DateTime<Utc>, DateTime<Utc>),
) -> DashboardStats {
    let (start, end) = today;
    let repairs_today = repairs
        .iter()
        .filter(|r| r.created_at >= start && r.created_at < end)
        .count();

    let total_revenue: Decimal = invoices
        .iter()
        .filter(|i| i.status == InvoiceStatus::Paid)
        .map(|i| i.total_amount)
        .sum();

    let total_investment: Decimal = phones
        .iter()
        .filter(|p| p.status != PhoneStatus::Sold)
        .map(UsedPhone::cost_basis)
        .sum();
    let phone_counts = PhoneStats::from_phones(phones);

    let total_expenses: Decimal = phones.iter().map(UsedPhone::cost_basis).sum();
    let net_profit = total_revenue - total_expenses + phone_counts.total_profit;

    DashboardStats {
        repairs: RepairSummary {
            counts: RepairStats::from_repairs(repairs),
            today: repairs_today,
        },
        invoices: InvoiceSummary {
            counts: InvoiceStats::from_invoices(invoices),
            total_revenue,
        },
        phones: PhoneSummary {
            counts: phone_counts,
            total_investment,
        },
        low_stock_count,
        financial: FinancialSummary {
            total_income: total_revenue,
            total_expenses,
            net_profit,
        },
    }
}

pub async fn load(store: &dyn ShopStore) -> AppResult<DashboardStats> {
    let repairs = store.list_repairs(&RepairQuery::default()).await?;
    let invoices = store.list_invoices(None).await?;
    let phones = store.list_phones(None).await?;
    let low_stock = store.list_low_stock().await?;

    Ok(summarize(
        &repairs,
        &invoices,
        &phones,
        low_stock.len(),
        local_day_bounds(Local::now()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuyPhone, InvoiceItem, InvoiceSource, RepairStatus};
    use crate::services::billing::InvoiceDraft;
    use chrono::Duration;
    use uuid::Uuid;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn phone(buy: i64, repair: i64, sold_for: Option<i64>) -> UsedPhone {
        let mut phone = BuyPhone {
            brand: Some("Apple".into()),
            phone_model: Some("iPhone X".into()),
            imei: Some(Uuid::new_v4().to_string()),
            buy_price: Some(dec(buy)),
            repair_cost: Some(dec(repair)),
            ..Default::default()
        }
        .into_phone()
        .unwrap();
        if let Some(price) = sold_for {
            phone.status = PhoneStatus::Sold;
            phone.sell_price = dec(price);
        }
        phone
    }

    fn invoice(total: i64, paid: i64) -> Invoice {
        let now = Utc::now();
        InvoiceDraft {
            invoice_number: format!("INV-{}", Uuid::new_v4()),
            source: InvoiceSource::Repair(Uuid::new_v4()),
            customer_id: Uuid::new_v4(),
            items: vec![InvoiceItem::new("Labour", 1, dec(total))],
            tax: Decimal::ZERO,
            paid_amount: dec(paid),
            due_date: now,
            notes: None,
        }
        .into_invoice(now)
    }

    fn repair(status: RepairStatus, created_at: DateTime<Utc>) -> Repair {
        Repair {
            id: Uuid::new_v4(),
            repair_id: "REP-1".into(),
            customer_id: Uuid::new_v4(),
            device_type: crate::models::DeviceType::Laptop,
            device_brand: "Dell".into(),
            device_model: "XPS".into(),
            imei: None,
            issue: "No power".into(),
            status,
            assigned_parts: Vec::new(),
            estimated_cost: Decimal::ZERO,
            final_cost: Decimal::ZERO,
            deposit_amount: Decimal::ZERO,
            expected_delivery_date: None,
            assigned_technician: None,
            before_repair_photo: None,
            qr_code_url: None,
            notes: None,
            technician_notes: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn financial_summary_keeps_double_counted_phone_cost() {
        let phones = vec![phone(200, 50, Some(350)), phone(100, 0, None)];
        let invoices = vec![invoice(350, 350), invoice(120, 30), invoice(80, 0)];
        let now = Utc::now();

        let stats = summarize(&[], &invoices, &phones, 2, (now, now + Duration::days(1)));

        assert_eq!(stats.invoices.total_revenue, dec(350));
        assert_eq!(stats.invoices.counts.total_outstanding, dec(170));
        assert_eq!(stats.phones.counts.total_profit, dec(100));
        assert_eq!(stats.phones.total_investment, dec(100));
        assert_eq!(stats.financial.total_income, dec(350));
        assert_eq!(stats.financial.total_expenses, dec(350));
        assert_eq!(stats.financial.net_profit, dec(100));
        assert_eq!(stats.low_stock_count, 2);
    }

    #[test]
    fn today_counts_only_repairs_inside_the_day() {
        let start = Utc::now() - Duration::hours(5);
        let end = start + Duration::days(1);
        let repairs = vec![
            repair(RepairStatus::New, start),
            repair(RepairStatus::Completed, start + Duration::hours(3)),
            repair(RepairStatus::Delivered, start - Duration::seconds(1)),
            repair(RepairStatus::New, end),
        ];

        let stats = summarize(&repairs, &[], &[], 0, (start, end));
        assert_eq!(stats.repairs.today, 2);
        assert_eq!(stats.repairs.counts.total, 4);
        assert_eq!(stats.repairs.counts.new, 2);
        assert_eq!(stats.repairs.counts.completed, 1);
    }

    #[test]
    fn day_bounds_span_one_local_day() {
        let (start, end) = local_day_bounds(Local::now());
        let now = Utc::now();
        assert!(start <= now && now < end);
        assert!(end - start >= Duration::hours(23) && end - start <= Duration::hours(25));
    }

    #[test]
    fn serialized_shape_uses_camel_case_sections() {
        let now = Utc::now();
        let stats = summarize(&[], &[], &[], 0, (now, now));
        let json = serde_json::to_value(&stats).unwrap();

        assert!(json["repairs"]["inProgress"].is_number());
        assert!(json["repairs"]["today"].is_number());
        assert!(json["invoices"]["totalRevenue"].is_string());
        assert!(json["phones"]["totalInvestment"].is_string());
        assert!(json["financial"]["netProfit"].is_string());
        assert_eq!(json["lowStockCount"], 0);
    }
}
