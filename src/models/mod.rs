pub mod customer;
pub mod invoice;
pub mod repair;
pub mod stock;
pub mod supplier;
pub mod used_phone;
pub mod user;

pub use customer::{Customer, CustomerSummary, CreateCustomer, UpdateCustomer};
pub use invoice::{
    Invoice, InvoiceItem, InvoiceKind, InvoiceSource, InvoiceStatus, InvoiceView,
    CreateInvoice, UpdateInvoice, InvoiceFilter, PaymentRequest, PaymentUpdate,
};
pub use repair::{
    AssignedPart, DeviceType, NewRepair, Repair, RepairFilter, RepairStatus, RepairView,
    StatusChange, UpdateRepair,
};
pub use stock::{StockFilter, StockForm, StockItem, StockItemView};
pub use supplier::{Supplier, SupplierForm};
pub use used_phone::{BuyPhone, PhoneFilter, PhoneStatus, SellPhone, UpdatePhone, UsedPhone, UsedPhoneView};
pub use user::{LoginRequest, Role, User, UserResponse};

/// A stored or submitted value that is not one of an enum's known names.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
