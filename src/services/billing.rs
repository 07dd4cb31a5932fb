//! Invoice rules: status derivation, payment validation and the invoices raised by
//! repair completion and phone sales. Nothing in here touches the store.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Invoice, InvoiceItem, InvoiceSource, InvoiceStatus, PaymentUpdate, Repair, UsedPhone,
};

pub const REPAIR_PAYMENT_TERMS_DAYS: i64 = 7;

/// Money is stored with two decimals. Rounds half away from zero, as `NUMERIC(12,2)` does,
/// so the rules below see exactly what the store will keep.
pub fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_items(items: &mut [InvoiceItem]) {
    for item in items.iter_mut() {
        item.unit_price = cents(item.unit_price);
        item.total = cents(item.total);
    }
}

fn round_amounts(invoice: &mut Invoice) {
    round_items(&mut invoice.items);
    invoice.subtotal = cents(invoice.subtotal);
    invoice.tax = cents(invoice.tax);
    invoice.total_amount = cents(invoice.total_amount);
    invoice.paid_amount = cents(invoice.paid_amount);
}

/// Status follows the amounts. `paid_date` is stamped the first time the invoice is
/// settled and is never cleared afterwards.
pub fn derive_status(
    paid: Decimal,
    total: Decimal,
    existing_paid_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (InvoiceStatus, Option<DateTime<Utc>>) {
    if paid >= total {
        (InvoiceStatus::Paid, existing_paid_date.or(Some(now)))
    } else if paid > Decimal::ZERO {
        (InvoiceStatus::Partial, existing_paid_date)
    } else {
        (InvoiceStatus::Overdue, existing_paid_date)
    }
}

/// Rounds the amounts to cents, then re-derives `status` and `paid_date` on an invoice
/// that is about to be saved.
pub fn refresh_status(invoice: &mut Invoice, now: DateTime<Utc>) {
    round_amounts(invoice);
    let (status, paid_date) =
        derive_status(invoice.paid_amount, invoice.total_amount, invoice.paid_date, now);
    invoice.status = status;
    invoice.paid_date = paid_date;
}

/// Checks a payment against the invoice as read and computes the fields to write.
pub fn apply_payment(invoice: &Invoice, amount: Decimal, now: DateTime<Utc>) -> AppResult<PaymentUpdate> {
    let amount = cents(amount);
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount);
    }
    let outstanding = cents(invoice.total_amount) - cents(invoice.paid_amount);
    if amount > outstanding {
        return Err(AppError::ExceedsOutstanding { outstanding });
    }

    let paid_amount = cents(invoice.paid_amount) + amount;
    let (status, paid_date) = derive_status(paid_amount, invoice.total_amount, invoice.paid_date, now);
    Ok(PaymentUpdate {
        paid_amount,
        status,
        paid_date,
        updated_at: now,
    })
}

pub fn items_subtotal(items: &[InvoiceItem]) -> Decimal {
    items.iter().map(|item| item.total).sum()
}

/// Everything needed to open an invoice; totals and status are derived from it.
pub struct InvoiceDraft {
    pub invoice_number: String,
    pub source: InvoiceSource,
    pub customer_id: Uuid,
    pub items: Vec<InvoiceItem>,
    pub tax: Decimal,
    pub paid_amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl InvoiceDraft {
    pub fn into_invoice(mut self, now: DateTime<Utc>) -> Invoice {
        round_items(&mut self.items);
        let subtotal = items_subtotal(&self.items);
        let tax = cents(self.tax);
        let mut invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: self.invoice_number,
            source: self.source,
            customer_id: self.customer_id,
            items: self.items,
            subtotal,
            tax,
            total_amount: subtotal + tax,
            paid_amount: self.paid_amount,
            status: InvoiceStatus::Overdue,
            due_date: self.due_date,
            paid_date: None,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        };
        refresh_status(&mut invoice, now);
        invoice
    }
}

/// True when a status write moves the repair into Completed with something to bill.
pub fn completion_is_billable(previous: &Repair, updated: &Repair) -> bool {
    use crate::models::RepairStatus::Completed;
    updated.status == Completed && previous.status != Completed && updated.final_cost > Decimal::ZERO
}

/// Invoice for a finished repair: labour line plus one line per assigned part, deposit
/// counted as already paid.
pub fn repair_invoice(repair: &Repair, invoice_number: String, now: DateTime<Utc>) -> Invoice {
    let mut items = vec![InvoiceItem::new(
        format!("Repair Service - {} {}", repair.device_brand, repair.device_model),
        1,
        repair.final_cost,
    )];
    items.extend(
        repair
            .assigned_parts
            .iter()
            .map(|part| InvoiceItem::new(part.part_name.clone(), part.quantity, part.price)),
    );

    InvoiceDraft {
        invoice_number,
        source: InvoiceSource::Repair(repair.id),
        customer_id: repair.customer_id,
        items,
        tax: Decimal::ZERO,
        paid_amount: repair.deposit_amount,
        due_date: now + Duration::days(REPAIR_PAYMENT_TERMS_DAYS),
        notes: None,
    }
    .into_invoice(now)
}

/// Invoice for a handset sold over the counter, settled in full on the spot.
pub fn phone_sale_invoice(
    phone: &UsedPhone,
    buyer_id: Uuid,
    invoice_number: String,
    now: DateTime<Utc>,
) -> Invoice {
    let item = InvoiceItem::new(
        format!("{} {} (IMEI: {})", phone.brand, phone.phone_model, phone.imei),
        1,
        phone.sell_price,
    );

    InvoiceDraft {
        invoice_number,
        source: InvoiceSource::UsedPhone(phone.id),
        customer_id: buyer_id,
        items: vec![item],
        tax: Decimal::ZERO,
        paid_amount: phone.sell_price,
        due_date: now,
        notes: None,
    }
    .into_invoice(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssignedPart, BuyPhone, DeviceType, PhoneStatus, RepairStatus};

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn repair(final_cost: i64, deposit: i64) -> Repair {
        let now = Utc::now();
        Repair {
            id: Uuid::new_v4(),
            repair_id: "REP-2024-AB1234".into(),
            customer_id: Uuid::new_v4(),
            device_type: DeviceType::Phone,
            device_brand: "Apple".into(),
            device_model: "iPhone 12".into(),
            imei: None,
            issue: "Cracked screen".into(),
            status: RepairStatus::InProgress,
            assigned_parts: Vec::new(),
            estimated_cost: dec(90),
            final_cost: dec(final_cost),
            deposit_amount: dec(deposit),
            expected_delivery_date: None,
            assigned_technician: None,
            before_repair_photo: None,
            qr_code_url: None,
            notes: None,
            technician_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_follows_paid_against_total() {
        let now = Utc::now();
        assert_eq!(derive_status(dec(120), dec(120), None, now), (InvoiceStatus::Paid, Some(now)));
        assert_eq!(derive_status(dec(130), dec(120), None, now).0, InvoiceStatus::Paid);
        assert_eq!(derive_status(dec(30), dec(120), None, now), (InvoiceStatus::Partial, None));
        assert_eq!(derive_status(dec(0), dec(120), None, now), (InvoiceStatus::Overdue, None));
    }

    #[test]
    fn paid_date_is_kept_once_set() {
        let first = Utc::now() - Duration::days(3);
        let now = Utc::now();

        assert_eq!(derive_status(dec(120), dec(120), Some(first), now).1, Some(first));
        // Reducing the paid amount later does not clear the stamp.
        assert_eq!(
            derive_status(dec(20), dec(120), Some(first), now),
            (InvoiceStatus::Partial, Some(first))
        );
        assert_eq!(
            derive_status(dec(0), dec(120), Some(first), now),
            (InvoiceStatus::Overdue, Some(first))
        );
    }

    #[test]
    fn zero_total_invoice_is_paid() {
        let now = Utc::now();
        assert_eq!(derive_status(dec(0), dec(0), None, now).0, InvoiceStatus::Paid);
    }

    #[test]
    fn completed_repair_invoice_includes_parts_and_deposit() {
        let mut repair = repair(100, 30);
        repair.assigned_parts.push(AssignedPart {
            part_id: Uuid::new_v4(),
            part_name: "Screen protector".into(),
            quantity: 2,
            price: dec(10),
        });
        let now = Utc::now();

        let invoice = repair_invoice(&repair, "INV-2024-TEST01".into(), now);

        assert_eq!(invoice.items.len(), 2);
        assert_eq!(invoice.items[0].description, "Repair Service - Apple iPhone 12");
        assert_eq!(invoice.items[1].total, dec(20));
        assert_eq!(invoice.subtotal, dec(120));
        assert_eq!(invoice.tax, Decimal::ZERO);
        assert_eq!(invoice.total_amount, dec(120));
        assert_eq!(invoice.paid_amount, dec(30));
        assert_eq!(invoice.status, InvoiceStatus::Partial);
        assert_eq!(invoice.paid_date, None);
        assert_eq!(invoice.source, InvoiceSource::Repair(repair.id));
        assert_eq!(invoice.customer_id, repair.customer_id);
        assert_eq!(invoice.due_date, now + Duration::days(7));
    }

    #[test]
    fn sub_cent_payment_settles_what_the_store_would_keep() {
        let now = Utc::now();
        let invoice = repair_invoice(&repair(10, 0), "INV-1".into(), now);

        let update = apply_payment(&invoice, Decimal::new(9999, 3), now).unwrap();
        assert_eq!(update.paid_amount, dec(10));
        assert_eq!(update.status, InvoiceStatus::Paid);

        assert!(matches!(
            apply_payment(&invoice, Decimal::new(4, 3), now),
            Err(AppError::InvalidAmount)
        ));
    }

    #[test]
    fn invoice_amounts_are_rounded_to_cents_before_status() {
        let now = Utc::now();
        let mut repair = repair(0, 0);
        repair.final_cost = Decimal::new(10005, 3);
        repair.deposit_amount = Decimal::new(10005, 3);

        let invoice = repair_invoice(&repair, "INV-1".into(), now);
        assert_eq!(invoice.items[0].total, Decimal::new(1001, 2));
        assert_eq!(invoice.total_amount, Decimal::new(1001, 2));
        assert_eq!(invoice.paid_amount, Decimal::new(1001, 2));
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(cents(Decimal::new(-2345, 3)), Decimal::new(-235, 2));
    }

    #[test]
    fn repair_without_deposit_starts_overdue() {
        let invoice = repair_invoice(&repair(80, 0), "INV-1".into(), Utc::now());
        assert_eq!(invoice.status, InvoiceStatus::Overdue);
    }

    #[test]
    fn only_the_first_move_into_completed_is_billable() {
        let before = repair(100, 0);
        let mut after = before.clone();
        after.status = RepairStatus::Completed;
        assert!(completion_is_billable(&before, &after));

        assert!(!completion_is_billable(&after, &after));

        let mut free = after.clone();
        free.final_cost = Decimal::ZERO;
        assert!(!completion_is_billable(&before, &free));

        let mut delivered = before.clone();
        delivered.status = RepairStatus::Delivered;
        assert!(!completion_is_billable(&before, &delivered));
    }

    #[test]
    fn phone_sale_invoice_is_settled_in_full() {
        let mut phone = BuyPhone {
            brand: Some("Samsung".into()),
            phone_model: Some("Galaxy S21".into()),
            imei: Some("356938035643809".into()),
            buy_price: Some(dec(200)),
            repair_cost: Some(dec(50)),
            ..Default::default()
        }
        .into_phone()
        .unwrap();
        phone.status = PhoneStatus::Sold;
        phone.sell_price = dec(350);
        let buyer = Uuid::new_v4();
        let now = Utc::now();

        let invoice = phone_sale_invoice(&phone, buyer, "INV-2".into(), now);

        assert_eq!(invoice.items[0].description, "Samsung Galaxy S21 (IMEI: 356938035643809)");
        assert_eq!(invoice.total_amount, dec(350));
        assert_eq!(invoice.paid_amount, dec(350));
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.paid_date, Some(now));
        assert_eq!(invoice.due_date, now);
        assert_eq!(invoice.customer_id, buyer);
        assert_eq!(phone.profit(), dec(100));
    }

    #[test]
    fn payment_must_be_positive_and_within_balance() {
        let now = Utc::now();
        let invoice = repair_invoice(&repair(120, 0), "INV-3".into(), now);

        assert!(matches!(apply_payment(&invoice, dec(0), now), Err(AppError::InvalidAmount)));
        assert!(matches!(apply_payment(&invoice, dec(-5), now), Err(AppError::InvalidAmount)));
        match apply_payment(&invoice, dec(121), now) {
            Err(AppError::ExceedsOutstanding { outstanding }) => assert_eq!(outstanding, dec(120)),
            other => panic!("unexpected result: {:?}", other),
        }

        let update = apply_payment(&invoice, dec(120), now).unwrap();
        assert_eq!(update.paid_amount, dec(120));
        assert_eq!(update.status, InvoiceStatus::Paid);
        assert_eq!(update.paid_date, Some(now));
    }
}
