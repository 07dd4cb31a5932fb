use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{billing, customers};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateInvoice, Invoice, InvoiceSource, InvoiceStatus, InvoiceView, UpdateInvoice,
};
use crate::store::ShopStore;
use crate::utils::ids;

/// Compare-and-set attempts before a payment gives up with a conflict.
pub const PAYMENT_ATTEMPTS: usize = 3;

/// Draws of a generated invoice number before a clash is reported.
pub const NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStats {
    pub total: usize,
    pub paid: usize,
    pub partial: usize,
    pub overdue: usize,
    pub total_outstanding: Decimal,
}

impl InvoiceStats {
    pub fn from_invoices(invoices: &[Invoice]) -> Self {
        let count = |status: InvoiceStatus| invoices.iter().filter(|i| i.status == status).count();
        Self {
            total: invoices.len(),
            paid: count(InvoiceStatus::Paid),
            partial: count(InvoiceStatus::Partial),
            overdue: count(InvoiceStatus::Overdue),
            total_outstanding: invoices.iter().map(Invoice::outstanding).sum(),
        }
    }
}

pub fn parse_status_filter(status: Option<&str>) -> AppResult<Option<InvoiceStatus>> {
    match status.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e: crate::models::ParseEnumError| AppError::validation(e.to_string())),
    }
}

pub async fn list(
    store: &dyn ShopStore,
    status: Option<InvoiceStatus>,
) -> AppResult<(Vec<InvoiceView>, InvoiceStats)> {
    let all = store.list_invoices(None).await?;
    let stats = InvoiceStats::from_invoices(&all);

    let selected: Vec<Invoice> = match status {
        Some(status) => all.into_iter().filter(|i| i.status == status).collect(),
        None => all,
    };
    let owners = customers::summaries(store, selected.iter().map(|i| i.customer_id)).await?;
    let views = selected
        .into_iter()
        .map(|invoice| {
            let customer = owners.get(&invoice.customer_id).cloned();
            InvoiceView::new(invoice, customer)
        })
        .collect();
    Ok((views, stats))
}

pub async fn view(store: &dyn ShopStore, invoice: Invoice) -> AppResult<InvoiceView> {
    let customer = customers::summary(store, invoice.customer_id).await?;
    Ok(InvoiceView::new(invoice, customer))
}

pub async fn get(store: &dyn ShopStore, id: Uuid) -> AppResult<InvoiceView> {
    let invoice = store.find_invoice(id).await?.ok_or(AppError::NotFound("Invoice"))?;
    view(store, invoice).await
}

/// Manually raised invoice. The customer is charged the full total, like generated ones.
pub async fn create(store: &dyn ShopStore, input: CreateInvoice) -> AppResult<InvoiceView> {
    let kind = input.kind.ok_or_else(|| AppError::validation("Invoice type is required"))?;
    let reference = input
        .reference
        .ok_or_else(|| AppError::validation("Invoice reference is required"))?;
    let customer_id = input
        .customer_id
        .ok_or_else(|| AppError::validation("Customer is required"))?;
    if store.find_customer(customer_id).await?.is_none() {
        return Err(AppError::validation("Customer does not exist"));
    }

    let now = Utc::now();
    let supplied_number = input
        .invoice_number
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let mut items = input.items;
    billing::round_items(&mut items);
    let subtotal = billing::cents(input.subtotal.unwrap_or_else(|| billing::items_subtotal(&items)));
    let tax = billing::cents(input.tax.unwrap_or(Decimal::ZERO));
    let mut invoice = Invoice {
        id: Uuid::new_v4(),
        invoice_number: supplied_number
            .clone()
            .unwrap_or_else(|| ids::invoice_number(now)),
        source: InvoiceSource::new(kind, reference),
        customer_id,
        items,
        subtotal,
        tax,
        total_amount: input.total_amount.unwrap_or(subtotal + tax),
        paid_amount: input.paid_amount.unwrap_or(Decimal::ZERO),
        status: InvoiceStatus::Overdue,
        due_date: input
            .due_date
            .unwrap_or_else(|| now + Duration::days(billing::REPAIR_PAYMENT_TERMS_DAYS)),
        paid_date: None,
        notes: input.notes,
        created_at: now,
        updated_at: now,
    };
    check_amounts(&invoice)?;
    billing::refresh_status(&mut invoice, now);

    if supplied_number.is_some() {
        store.insert_invoice_charging_customer(&invoice).await?;
    } else {
        insert_charging_customer(store, &mut invoice).await?;
    }
    log::info!("Created invoice {} for customer {}", invoice.invoice_number, customer_id);
    view(store, invoice).await
}

/// Full-record edit. Status is always re-derived from the amounts.
pub async fn update(store: &dyn ShopStore, id: Uuid, input: UpdateInvoice) -> AppResult<InvoiceView> {
    let mut invoice = store.find_invoice(id).await?.ok_or(AppError::NotFound("Invoice"))?;

    if let Some(customer_id) = input.customer_id {
        if store.find_customer(customer_id).await?.is_none() {
            return Err(AppError::validation("Customer does not exist"));
        }
        invoice.customer_id = customer_id;
    }
    if let Some(items) = input.items {
        invoice.items = items;
    }
    if let Some(subtotal) = input.subtotal {
        invoice.subtotal = subtotal;
    }
    if let Some(tax) = input.tax {
        invoice.tax = tax;
    }
    if let Some(total) = input.total_amount {
        invoice.total_amount = total;
    }
    if let Some(paid) = input.paid_amount {
        invoice.paid_amount = paid;
    }
    if let Some(due) = input.due_date {
        invoice.due_date = due;
    }
    if input.notes.is_some() {
        invoice.notes = input.notes;
    }
    check_amounts(&invoice)?;

    let now = Utc::now();
    billing::refresh_status(&mut invoice, now);
    invoice.updated_at = now;

    if !store.update_invoice(&invoice).await? {
        return Err(AppError::NotFound("Invoice"));
    }
    view(store, invoice).await
}

/// Inserts an invoice with a generated number, drawing a fresh number when it clashes.
pub async fn insert_charging_customer(store: &dyn ShopStore, invoice: &mut Invoice) -> AppResult<()> {
    let mut attempt = 1;
    loop {
        match store.insert_invoice_charging_customer(invoice).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_invoice_number_clash() && attempt < NUMBER_ATTEMPTS => {
                attempt += 1;
                log::warn!("Invoice number {} taken, drawing another", invoice.invoice_number);
                invoice.invoice_number = ids::invoice_number(Utc::now());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

pub async fn delete(store: &dyn ShopStore, id: Uuid) -> AppResult<()> {
    if !store.delete_invoice(id).await? {
        return Err(AppError::NotFound("Invoice"));
    }
    Ok(())
}

/// Adds a payment. The write only lands if nobody else paid in between; otherwise the
/// invoice is re-read and the payment re-validated against the fresh balance.
pub async fn record_payment(
    store: &dyn ShopStore,
    id: Uuid,
    amount: Option<Decimal>,
) -> AppResult<InvoiceView> {
    let amount = billing::cents(amount.ok_or(AppError::InvalidAmount)?);
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount);
    }

    for attempt in 1..=PAYMENT_ATTEMPTS {
        let mut invoice = store.find_invoice(id).await?.ok_or(AppError::NotFound("Invoice"))?;
        let update = billing::apply_payment(&invoice, amount, Utc::now())?;

        if store.swap_invoice_payment(id, invoice.paid_amount, &update).await? {
            invoice.paid_amount = update.paid_amount;
            invoice.status = update.status;
            invoice.paid_date = update.paid_date;
            invoice.updated_at = update.updated_at;
            log::info!(
                "Payment of {} recorded on invoice {} ({})",
                amount,
                invoice.invoice_number,
                invoice.status
            );
            return view(store, invoice).await;
        }
        log::warn!("Invoice {} changed during payment, attempt {}", id, attempt);
    }
    Err(AppError::PaymentContention)
}

fn check_amounts(invoice: &Invoice) -> AppResult<()> {
    let negative = [invoice.subtotal, invoice.tax, invoice.total_amount, invoice.paid_amount]
        .iter()
        .any(|amount| amount.is_sign_negative());
    if negative {
        return Err(AppError::validation("Invoice amounts cannot be negative"));
    }
    if invoice.items.iter().any(|item| item.quantity < 1) {
        return Err(AppError::validation("Invoice items need a quantity of at least 1"));
    }
    Ok(())
}
