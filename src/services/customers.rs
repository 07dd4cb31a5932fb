use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CreateCustomer, Customer, CustomerSummary, UpdateCustomer};
use crate::store::{ShopStore, StoreError};

pub const LIST_LIMIT: usize = 100;

pub async fn list(store: &dyn ShopStore, search: Option<&str>) -> AppResult<Vec<Customer>> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    Ok(store.list_customers(search, LIST_LIMIT).await?)
}

pub async fn get(store: &dyn ShopStore, id: Uuid) -> AppResult<Customer> {
    store.find_customer(id).await?.ok_or(AppError::NotFound("Customer"))
}

pub async fn create(store: &dyn ShopStore, input: CreateCustomer) -> AppResult<Customer> {
    let name = required(input.name).ok_or_else(|| AppError::validation("Name is required"))?;
    let phone = required(input.phone).ok_or_else(|| AppError::validation("Phone number is required"))?;

    let customer = Customer::new(name, phone, input.email, input.address);
    store.insert_customer(&customer).await?;
    log::info!("Created customer {} ({})", customer.id, customer.phone);
    Ok(customer)
}

pub async fn update(store: &dyn ShopStore, id: Uuid, input: UpdateCustomer) -> AppResult<Customer> {
    let mut customer = get(store, id).await?;
    input.apply(&mut customer);
    if customer.name.is_empty() || customer.phone.is_empty() {
        return Err(AppError::validation("Name and phone number cannot be empty"));
    }

    if !store.update_customer(&customer).await? {
        return Err(AppError::NotFound("Customer"));
    }
    Ok(customer)
}

pub async fn delete(store: &dyn ShopStore, id: Uuid) -> AppResult<()> {
    if !store.delete_customer(id).await? {
        return Err(AppError::NotFound("Customer"));
    }
    Ok(())
}

/// Looks a customer up by phone, registering them when unknown. A concurrent registration
/// of the same phone is resolved by reading the winner back.
pub async fn find_or_create(
    store: &dyn ShopStore,
    name: &str,
    phone: &str,
    email: Option<String>,
) -> AppResult<Customer> {
    if let Some(existing) = store.find_customer_by_phone(phone).await? {
        return Ok(existing);
    }

    let customer = Customer::new(name.to_string(), phone.to_string(), email, None);
    match store.insert_customer(&customer).await {
        Ok(()) => Ok(customer),
        Err(StoreError::Duplicate(_)) => store
            .find_customer_by_phone(phone)
            .await?
            .ok_or_else(|| AppError::Internal(format!("customer {} vanished after insert race", phone))),
        Err(err) => Err(err.into()),
    }
}

/// Customer projections keyed by id, for embedding in list responses.
pub async fn summaries(
    store: &dyn ShopStore,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, CustomerSummary>> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    let customers = store.find_customers(&ids).await?;
    Ok(customers.iter().map(|c| (c.id, CustomerSummary::from(c))).collect())
}

pub async fn summary(store: &dyn ShopStore, id: Uuid) -> AppResult<Option<CustomerSummary>> {
    Ok(store.find_customer(id).await?.as_ref().map(CustomerSummary::from))
}

/// Applies a counter delta without failing the caller; a miss is logged and left for
/// [`recompute_all`] to repair.
pub async fn adjust_totals_best_effort(store: &dyn ShopStore, id: Uuid, repairs: i32, spent: Decimal) {
    match store.adjust_customer_totals(id, repairs, spent).await {
        Ok(true) => {}
        Ok(false) => log::warn!("Customer {} not found while adjusting totals", id),
        Err(err) => log::warn!("Failed to adjust totals for customer {}: {}", id, err),
    }
}

/// Rebuilds one customer's counters from their repairs and invoices.
pub async fn recompute(store: &dyn ShopStore, id: Uuid) -> AppResult<Customer> {
    let mut customer = get(store, id).await?;
    let repairs = store.count_repairs_for_customer(id).await?;
    let spent = store.invoiced_total_for_customer(id).await?;

    customer.total_repairs = i32::try_from(repairs).unwrap_or(i32::MAX);
    customer.total_spent = spent;
    store
        .set_customer_totals(id, customer.total_repairs, customer.total_spent)
        .await?;
    Ok(customer)
}

/// Reconciliation pass over every customer. Returns how many had drifted and were fixed.
pub async fn recompute_all(store: &dyn ShopStore) -> AppResult<usize> {
    let customers = store.list_customers(None, usize::MAX).await?;
    let mut updated = 0;

    for customer in customers {
        let repairs = store.count_repairs_for_customer(customer.id).await?;
        let repairs = i32::try_from(repairs).unwrap_or(i32::MAX);
        let spent = store.invoiced_total_for_customer(customer.id).await?;

        if customer.total_repairs != repairs || customer.total_spent != spent {
            log::info!(
                "Reconciled customer {}: repairs {} -> {}, spent {} -> {}",
                customer.id,
                customer.total_repairs,
                repairs,
                customer.total_spent,
                spent
            );
            store.set_customer_totals(customer.id, repairs, spent).await?;
            updated += 1;
        }
    }
    Ok(updated)
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
