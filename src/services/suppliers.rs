use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Supplier, SupplierForm};
use crate::store::ShopStore;

pub async fn list(store: &dyn ShopStore) -> AppResult<Vec<Supplier>> {
    Ok(store.list_suppliers().await?)
}

pub async fn get(store: &dyn ShopStore, id: Uuid) -> AppResult<Supplier> {
    store.find_supplier(id).await?.ok_or(AppError::NotFound("Supplier"))
}

pub async fn create(store: &dyn ShopStore, form: SupplierForm) -> AppResult<Supplier> {
    let supplier = form.into_supplier().map_err(AppError::validation)?;
    store.insert_supplier(&supplier).await?;
    log::info!("Added supplier {} ({})", supplier.name, supplier.id);
    Ok(supplier)
}

/// Partial update: blank name, email or phone keep their stored value.
pub async fn update(store: &dyn ShopStore, id: Uuid, form: SupplierForm) -> AppResult<Supplier> {
    let mut supplier = get(store, id).await?;
    form.apply(&mut supplier);

    if !store.update_supplier(&supplier).await? {
        return Err(AppError::NotFound("Supplier"));
    }
    Ok(supplier)
}

/// Removes the supplier. Stock items that referenced it keep existing without one.
pub async fn delete(store: &dyn ShopStore, id: Uuid) -> AppResult<()> {
    if !store.delete_supplier(id).await? {
        return Err(AppError::NotFound("Supplier"));
    }
    log::info!("Deleted supplier {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn form(name: &str) -> SupplierForm {
        SupplierForm {
            name: Some(name.into()),
            email: Some(" Parts@Example.com ".into()),
            phone: Some("0611".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_requires_contact_details() {
        let store = MemoryStore::new();

        let err = create(&store, SupplierForm { phone: None, ..form("Acme") }).await.unwrap_err();
        assert_eq!(err.to_string(), "Phone number is required");

        let supplier = create(&store, form("Acme")).await.unwrap();
        assert_eq!(supplier.email, "parts@example.com");
        assert_eq!(list(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_keeps_fields_left_blank() {
        let store = MemoryStore::new();
        let supplier = create(&store, form("Acme")).await.unwrap();

        let updated = update(
            &store,
            supplier.id,
            SupplierForm { name: Some("  ".into()), address: Some("Main St 1".into()), ..Default::default() },
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Acme");
        assert_eq!(updated.address.as_deref(), Some("Main St 1"));
        assert_eq!(get(&store, supplier.id).await.unwrap().address.as_deref(), Some("Main St 1"));
    }

    #[tokio::test]
    async fn missing_supplier_is_not_found() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        assert!(matches!(get(&store, id).await, Err(AppError::NotFound("Supplier"))));
        assert!(matches!(update(&store, id, form("Acme")).await, Err(AppError::NotFound("Supplier"))));
        assert!(matches!(delete(&store, id).await, Err(AppError::NotFound("Supplier"))));
    }
}
