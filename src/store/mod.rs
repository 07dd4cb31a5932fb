//! Entity store seam.
//!
//! Every read and write the shop performs goes through [`ShopStore`]. `PgStore` backs it
//! with Postgres; `MemoryStore` keeps everything in process and is used when no database
//! is configured and by the test suite.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Customer, Invoice, InvoiceSource, InvoiceStatus, PaymentUpdate, PhoneStatus, Repair,
    RepairStatus, StockItem, Supplier, UsedPhone, User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. Carries the user-facing message.
    #[error("{0}")]
    Duplicate(&'static str),

    /// The record is still referenced elsewhere and cannot be removed.
    #[error("{0}")]
    InUse(&'static str),

    /// The record points at a row that does not exist.
    #[error("{0}")]
    MissingReference(&'static str),

    #[error("stored record could not be decoded: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub const DUPLICATE_INVOICE_NUMBER: &str = "Invoice number already exists";
pub const MISSING_CUSTOMER: &str = "Customer does not exist";

impl StoreError {
    /// A generated invoice number hit one already on file; drawing a new one fixes it.
    pub fn is_invoice_number_clash(&self) -> bool {
        matches!(self, StoreError::Duplicate(message) if *message == DUPLICATE_INVOICE_NUMBER)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepairQuery {
    pub status: Option<RepairStatus>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct StockQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[async_trait]
pub trait ShopStore: Send + Sync {
    // Users
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    // Customers
    async fn list_customers(&self, search: Option<&str>, limit: usize) -> StoreResult<Vec<Customer>>;
    async fn find_customers(&self, ids: &[Uuid]) -> StoreResult<Vec<Customer>>;
    async fn find_customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;
    async fn find_customer_by_phone(&self, phone: &str) -> StoreResult<Option<Customer>>;
    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()>;
    async fn update_customer(&self, customer: &Customer) -> StoreResult<bool>;
    async fn delete_customer(&self, id: Uuid) -> StoreResult<bool>;
    /// Adds the deltas to the denormalized counters in one write.
    async fn adjust_customer_totals(&self, id: Uuid, repairs: i32, spent: Decimal) -> StoreResult<bool>;
    async fn set_customer_totals(&self, id: Uuid, repairs: i32, spent: Decimal) -> StoreResult<bool>;

    // Suppliers
    async fn list_suppliers(&self) -> StoreResult<Vec<Supplier>>;
    async fn find_supplier(&self, id: Uuid) -> StoreResult<Option<Supplier>>;
    async fn insert_supplier(&self, supplier: &Supplier) -> StoreResult<()>;
    async fn update_supplier(&self, supplier: &Supplier) -> StoreResult<bool>;
    async fn delete_supplier(&self, id: Uuid) -> StoreResult<bool>;

    // Stock
    async fn list_stock(&self, query: &StockQuery) -> StoreResult<Vec<StockItem>>;
    async fn list_low_stock(&self) -> StoreResult<Vec<StockItem>>;
    async fn find_stock(&self, id: Uuid) -> StoreResult<Option<StockItem>>;
    async fn insert_stock(&self, item: &StockItem) -> StoreResult<()>;
    async fn update_stock(&self, item: &StockItem) -> StoreResult<bool>;
    async fn delete_stock(&self, id: Uuid) -> StoreResult<bool>;

    // Repairs
    async fn list_repairs(&self, query: &RepairQuery) -> StoreResult<Vec<Repair>>;
    async fn find_repair(&self, id: Uuid) -> StoreResult<Option<Repair>>;
    async fn find_repair_by_code(&self, repair_id: &str) -> StoreResult<Option<Repair>>;
    async fn insert_repair(&self, repair: &Repair) -> StoreResult<()>;
    async fn update_repair(&self, repair: &Repair) -> StoreResult<bool>;
    /// Removes the repair and hands back what was deleted.
    async fn delete_repair(&self, id: Uuid) -> StoreResult<Option<Repair>>;
    async fn count_repairs_for_customer(&self, customer_id: Uuid) -> StoreResult<i64>;

    // Used phones
    async fn list_phones(&self, status: Option<PhoneStatus>) -> StoreResult<Vec<UsedPhone>>;
    async fn find_phone(&self, id: Uuid) -> StoreResult<Option<UsedPhone>>;
    async fn insert_phone(&self, phone: &UsedPhone) -> StoreResult<()>;
    async fn update_phone(&self, phone: &UsedPhone) -> StoreResult<bool>;
    async fn delete_phone(&self, id: Uuid) -> StoreResult<bool>;

    // Invoices
    async fn list_invoices(&self, status: Option<InvoiceStatus>) -> StoreResult<Vec<Invoice>>;
    async fn find_invoice(&self, id: Uuid) -> StoreResult<Option<Invoice>>;
    async fn find_invoice_by_source(&self, source: InvoiceSource) -> StoreResult<Option<Invoice>>;
    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<bool>;
    async fn delete_invoice(&self, id: Uuid) -> StoreResult<bool>;
    async fn invoiced_total_for_customer(&self, customer_id: Uuid) -> StoreResult<Decimal>;

    /// Inserts the invoice and adds its total to the customer's `total_spent` as one unit.
    async fn insert_invoice_charging_customer(&self, invoice: &Invoice) -> StoreResult<()>;

    /// Writes the payment only if the stored paid amount still equals `expected_paid`.
    /// Returns `false` when the invoice is missing or another writer got there first.
    async fn swap_invoice_payment(
        &self,
        id: Uuid,
        expected_paid: Decimal,
        update: &PaymentUpdate,
    ) -> StoreResult<bool>;

    /// Marks the phone sold, inserts the sale invoice and charges the buyer as one unit.
    /// Returns `false`, writing nothing, when the phone is already sold.
    async fn complete_phone_sale(&self, phone: &UsedPhone, invoice: &Invoice) -> StoreResult<bool>;
}
