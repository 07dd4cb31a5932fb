use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RepairQuery, ShopStore, StockQuery, StoreError, StoreResult, DUPLICATE_INVOICE_NUMBER, MISSING_CUSTOMER};
use crate::models::{
    Customer, Invoice, InvoiceSource, InvoiceStatus, PaymentUpdate, PhoneStatus, Repair,
    StockItem, Supplier, UsedPhone, User,
};

const CUSTOMER_IN_USE: &str = "Customer has repairs, invoices or purchases on record";

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    customers: HashMap<Uuid, Customer>,
    suppliers: HashMap<Uuid, Supplier>,
    stock: HashMap<Uuid, StockItem>,
    repairs: HashMap<Uuid, Repair>,
    phones: HashMap<Uuid, UsedPhone>,
    invoices: HashMap<Uuid, Invoice>,
}

impl Tables {
    fn check_invoice_unique(&self, invoice: &Invoice) -> StoreResult<()> {
        for existing in self.invoices.values() {
            if existing.invoice_number == invoice.invoice_number {
                return Err(StoreError::Duplicate(DUPLICATE_INVOICE_NUMBER));
            }
            if matches!(invoice.source, InvoiceSource::Repair(_)) && existing.source == invoice.source {
                return Err(StoreError::Duplicate("Repair has already been invoiced"));
            }
        }
        Ok(())
    }

    fn charge(&mut self, customer_id: Uuid, amount: Decimal) {
        if let Some(customer) = self.customers.get_mut(&customer_id) {
            customer.total_spent += amount;
        }
    }
}

/// Process-local store. A single lock guards all tables, so every trait call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(mut rows: Vec<T>, created: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<chrono::Utc>,
{
    rows.sort_by(|a, b| created(b).cmp(&created(a)));
    rows
}

#[async_trait]
impl ShopStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("A user with this email already exists"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn list_customers(&self, search: Option<&str>, limit: usize) -> StoreResult<Vec<Customer>> {
        let tables = self.tables.read().await;
        let rows = tables
            .customers
            .values()
            .filter(|c| search.map_or(true, |s| c.matches(s)))
            .cloned()
            .collect();
        let mut rows = newest_first(rows, |c: &Customer| c.created_at);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn find_customers(&self, ids: &[Uuid]) -> StoreResult<Vec<Customer>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.customers.get(id).cloned()).collect())
    }

    async fn find_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.tables.read().await.customers.get(&id).cloned())
    }

    async fn find_customer_by_phone(&self, phone: &str) -> StoreResult<Option<Customer>> {
        let phone = phone.trim();
        let tables = self.tables.read().await;
        Ok(tables.customers.values().find(|c| c.phone == phone).cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.customers.values().any(|c| c.phone == customer.phone) {
            return Err(StoreError::Duplicate("Customer with this phone number already exists"));
        }
        tables.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables
            .customers
            .values()
            .any(|c| c.id != customer.id && c.phone == customer.phone)
        {
            return Err(StoreError::Duplicate("Customer with this phone number already exists"));
        }
        match tables.customers.get_mut(&customer.id) {
            Some(slot) => {
                *slot = customer.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_customer(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let referenced = tables.repairs.values().any(|r| r.customer_id == id)
            || tables.invoices.values().any(|i| i.customer_id == id)
            || tables.phones.values().any(|p| p.buyer_id == Some(id));
        if referenced {
            return Err(StoreError::InUse(CUSTOMER_IN_USE));
        }
        Ok(tables.customers.remove(&id).is_some())
    }

    async fn adjust_customer_totals(&self, id: Uuid, repairs: i32, spent: Decimal) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.customers.get_mut(&id) {
            Some(customer) => {
                customer.total_repairs += repairs;
                customer.total_spent += spent;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_customer_totals(&self, id: Uuid, repairs: i32, spent: Decimal) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.customers.get_mut(&id) {
            Some(customer) => {
                customer.total_repairs = repairs;
                customer.total_spent = spent;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_suppliers(&self) -> StoreResult<Vec<Supplier>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Supplier> = tables.suppliers.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn find_supplier(&self, id: Uuid) -> StoreResult<Option<Supplier>> {
        Ok(self.tables.read().await.suppliers.get(&id).cloned())
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> StoreResult<()> {
        self.tables.write().await.suppliers.insert(supplier.id, supplier.clone());
        Ok(())
    }

    async fn update_supplier(&self, supplier: &Supplier) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.suppliers.get_mut(&supplier.id) {
            Some(slot) => {
                *slot = supplier.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_supplier(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.suppliers.remove(&id).is_some();
        if removed {
            for item in tables.stock.values_mut().filter(|i| i.supplier_id == Some(id)) {
                item.supplier_id = None;
            }
        }
        Ok(removed)
    }

    async fn list_stock(&self, query: &StockQuery) -> StoreResult<Vec<StockItem>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<StockItem> = tables
            .stock
            .values()
            .filter(|i| query.category.as_deref().map_or(true, |c| i.category == c))
            .filter(|i| query.search.as_deref().map_or(true, |s| i.matches(s)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.part_name.cmp(&b.part_name));
        Ok(rows)
    }

    async fn list_low_stock(&self) -> StoreResult<Vec<StockItem>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<StockItem> = tables
            .stock
            .values()
            .filter(|i| i.is_low_stock())
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.quantity);
        Ok(rows)
    }

    async fn find_stock(&self, id: Uuid) -> StoreResult<Option<StockItem>> {
        Ok(self.tables.read().await.stock.get(&id).cloned())
    }

    async fn insert_stock(&self, item: &StockItem) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.stock.values().any(|i| i.sku == item.sku) {
            return Err(StoreError::Duplicate("SKU already exists"));
        }
        tables.stock.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_stock(&self, item: &StockItem) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.stock.values().any(|i| i.id != item.id && i.sku == item.sku) {
            return Err(StoreError::Duplicate("SKU already exists"));
        }
        match tables.stock.get_mut(&item.id) {
            Some(slot) => {
                *slot = item.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_stock(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.stock.remove(&id).is_some())
    }

    async fn list_repairs(&self, query: &RepairQuery) -> StoreResult<Vec<Repair>> {
        let tables = self.tables.read().await;
        let rows = tables
            .repairs
            .values()
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| query.search.as_deref().map_or(true, |s| r.matches(s)))
            .cloned()
            .collect();
        let mut rows = newest_first(rows, |r: &Repair| r.created_at);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn find_repair(&self, id: Uuid) -> StoreResult<Option<Repair>> {
        Ok(self.tables.read().await.repairs.get(&id).cloned())
    }

    async fn find_repair_by_code(&self, repair_id: &str) -> StoreResult<Option<Repair>> {
        let tables = self.tables.read().await;
        Ok(tables.repairs.values().find(|r| r.repair_id == repair_id).cloned())
    }

    async fn insert_repair(&self, repair: &Repair) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.repairs.values().any(|r| r.repair_id == repair.repair_id) {
            return Err(StoreError::Duplicate("Repair ID already exists"));
        }
        if !tables.customers.contains_key(&repair.customer_id) {
            return Err(StoreError::MissingReference(MISSING_CUSTOMER));
        }
        tables.repairs.insert(repair.id, repair.clone());
        Ok(())
    }

    async fn update_repair(&self, repair: &Repair) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.repairs.get_mut(&repair.id) {
            Some(slot) => {
                *slot = repair.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_repair(&self, id: Uuid) -> StoreResult<Option<Repair>> {
        Ok(self.tables.write().await.repairs.remove(&id))
    }

    async fn count_repairs_for_customer(&self, customer_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.repairs.values().filter(|r| r.customer_id == customer_id).count() as i64)
    }

    async fn list_phones(&self, status: Option<PhoneStatus>) -> StoreResult<Vec<UsedPhone>> {
        let tables = self.tables.read().await;
        let rows = tables
            .phones
            .values()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        Ok(newest_first(rows, |p: &UsedPhone| p.created_at))
    }

    async fn find_phone(&self, id: Uuid) -> StoreResult<Option<UsedPhone>> {
        Ok(self.tables.read().await.phones.get(&id).cloned())
    }

    async fn insert_phone(&self, phone: &UsedPhone) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.phones.values().any(|p| p.imei == phone.imei) {
            return Err(StoreError::Duplicate("Phone with this IMEI already exists"));
        }
        tables.phones.insert(phone.id, phone.clone());
        Ok(())
    }

    async fn update_phone(&self, phone: &UsedPhone) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.phones.values().any(|p| p.id != phone.id && p.imei == phone.imei) {
            return Err(StoreError::Duplicate("Phone with this IMEI already exists"));
        }
        match tables.phones.get_mut(&phone.id) {
            Some(slot) => {
                *slot = phone.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_phone(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.phones.remove(&id).is_some())
    }

    async fn list_invoices(&self, status: Option<InvoiceStatus>) -> StoreResult<Vec<Invoice>> {
        let tables = self.tables.read().await;
        let rows = tables
            .invoices
            .values()
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        Ok(newest_first(rows, |i: &Invoice| i.created_at))
    }

    async fn find_invoice(&self, id: Uuid) -> StoreResult<Option<Invoice>> {
        Ok(self.tables.read().await.invoices.get(&id).cloned())
    }

    async fn find_invoice_by_source(&self, source: InvoiceSource) -> StoreResult<Option<Invoice>> {
        let tables = self.tables.read().await;
        Ok(tables.invoices.values().find(|i| i.source == source).cloned())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.invoices.get_mut(&invoice.id) {
            Some(slot) => {
                *slot = invoice.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_invoice(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.invoices.remove(&id).is_some())
    }

    async fn invoiced_total_for_customer(&self, customer_id: Uuid) -> StoreResult<Decimal> {
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .values()
            .filter(|i| i.customer_id == customer_id)
            .map(|i| i.total_amount)
            .sum())
    }

    async fn insert_invoice_charging_customer(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_invoice_unique(invoice)?;
        tables.invoices.insert(invoice.id, invoice.clone());
        tables.charge(invoice.customer_id, invoice.total_amount);
        Ok(())
    }

    async fn swap_invoice_payment(
        &self,
        id: Uuid,
        expected_paid: Decimal,
        update: &PaymentUpdate,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.invoices.get_mut(&id) {
            Some(invoice) if invoice.paid_amount == expected_paid => {
                invoice.paid_amount = update.paid_amount;
                invoice.status = update.status;
                invoice.paid_date = update.paid_date;
                invoice.updated_at = update.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_phone_sale(&self, phone: &UsedPhone, invoice: &Invoice) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.phones.get(&phone.id) {
            Some(stored) if stored.status != PhoneStatus::Sold => {}
            _ => return Ok(false),
        }
        tables.check_invoice_unique(invoice)?;
        tables.phones.insert(phone.id, phone.clone());
        tables.invoices.insert(invoice.id, invoice.clone());
        tables.charge(invoice.customer_id, invoice.total_amount);
        Ok(true)
    }
}
