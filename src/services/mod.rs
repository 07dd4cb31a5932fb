//! Shop workflows on top of the [`ShopStore`](crate::store::ShopStore) seam.

pub mod billing;
pub mod customers;
pub mod dashboard;
pub mod invoices;
pub mod phones;
pub mod repairs;
pub mod stock;
pub mod suppliers;
