use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{StockFilter, StockForm, StockItem};
use crate::store::{ShopStore, StockQuery};

/// Category `all` and blank values mean no filter.
pub fn query(filter: StockFilter) -> StockQuery {
    StockQuery {
        category: filter
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && c != "all"),
        search: filter.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    }
}

pub async fn list(store: &dyn ShopStore, filter: StockFilter) -> AppResult<Vec<StockItem>> {
    Ok(store.list_stock(&query(filter)).await?)
}

/// Items at or under their reorder level, scarcest first.
pub async fn low_stock(store: &dyn ShopStore) -> AppResult<Vec<StockItem>> {
    Ok(store.list_low_stock().await?)
}

pub async fn get(store: &dyn ShopStore, id: Uuid) -> AppResult<StockItem> {
    store.find_stock(id).await?.ok_or(AppError::NotFound("Stock item"))
}

pub async fn create(store: &dyn ShopStore, form: StockForm) -> AppResult<StockItem> {
    let item = form.into_item().map_err(AppError::validation)?;
    check_supplier(store, item.supplier_id).await?;

    store.insert_stock(&item).await?;
    log::info!("Added stock item {} ({})", item.sku, item.part_name);
    Ok(item)
}

pub async fn update(store: &dyn ShopStore, id: Uuid, form: StockForm) -> AppResult<StockItem> {
    let mut item = get(store, id).await?;
    let supplier_changed = form.supplier_id.is_some();
    form.apply(&mut item).map_err(AppError::validation)?;
    if supplier_changed {
        check_supplier(store, item.supplier_id).await?;
    }

    if !store.update_stock(&item).await? {
        return Err(AppError::NotFound("Stock item"));
    }
    Ok(item)
}

pub async fn delete(store: &dyn ShopStore, id: Uuid) -> AppResult<()> {
    if !store.delete_stock(id).await? {
        return Err(AppError::NotFound("Stock item"));
    }
    Ok(())
}

async fn check_supplier(store: &dyn ShopStore, supplier_id: Option<Uuid>) -> AppResult<()> {
    if let Some(id) = supplier_id {
        if store.find_supplier(id).await?.is_none() {
            return Err(AppError::validation("Supplier does not exist"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SupplierForm;
    use crate::services::suppliers;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    fn part(name: &str, sku: &str, quantity: i32) -> StockForm {
        StockForm {
            part_name: Some(name.into()),
            sku: Some(sku.into()),
            category: Some("Screens".into()),
            quantity: Some(quantity),
            reorder_level: Some(5),
            price: Some(Decimal::from(80)),
            cost_price: Some(Decimal::from(45)),
            ..Default::default()
        }
    }

    async fn supplier(store: &MemoryStore) -> Uuid {
        let form = SupplierForm {
            name: Some("Acme".into()),
            email: Some("acme@example.com".into()),
            phone: Some("0611".into()),
            ..Default::default()
        };
        suppliers::create(store, form).await.unwrap().id
    }

    #[test]
    fn filter_treats_all_and_blank_as_unset() {
        let q = query(StockFilter { category: Some("all".into()), search: Some("  ".into()) });
        assert!(q.category.is_none());
        assert!(q.search.is_none());

        let q = query(StockFilter { category: Some(" Screens ".into()), search: Some("lcd".into()) });
        assert_eq!(q.category.as_deref(), Some("Screens"));
        assert_eq!(q.search.as_deref(), Some("lcd"));
    }

    #[tokio::test]
    async fn create_checks_supplier_and_sku() {
        let store = MemoryStore::new();

        let unknown = StockForm { supplier_id: Some(Uuid::new_v4()), ..part("LCD", "LCD-12", 3) };
        let err = create(&store, unknown).await.unwrap_err();
        assert_eq!(err.to_string(), "Supplier does not exist");

        let supplier_id = supplier(&store).await;
        let item = create(&store, StockForm { supplier_id: Some(supplier_id), ..part("LCD", "LCD-12", 3) })
            .await
            .unwrap();
        assert_eq!(item.supplier_id, Some(supplier_id));

        let err = create(&store, part("Other LCD", "LCD-12", 1)).await.unwrap_err();
        assert_eq!(err.to_string(), "SKU already exists");
    }

    #[tokio::test]
    async fn low_stock_and_filters() {
        let store = MemoryStore::new();
        create(&store, part("LCD", "LCD-12", 3)).await.unwrap();
        create(&store, part("Battery", "BAT-12", 20)).await.unwrap();

        let low = low_stock(&store).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sku, "LCD-12");

        let found = list(&store, StockFilter { category: Some("all".into()), search: Some("bat".into()) })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].part_name, "Battery");
    }

    #[tokio::test]
    async fn update_rejects_unknown_supplier_and_deleted_supplier_is_detached() {
        let store = MemoryStore::new();
        let supplier_id = supplier(&store).await;
        let item = create(&store, StockForm { supplier_id: Some(supplier_id), ..part("LCD", "LCD-12", 3) })
            .await
            .unwrap();

        let moved = StockForm { supplier_id: Some(Uuid::new_v4()), ..Default::default() };
        assert!(matches!(update(&store, item.id, moved).await, Err(AppError::Validation(_))));

        let restocked = update(&store, item.id, StockForm { quantity: Some(12), ..Default::default() })
            .await
            .unwrap();
        assert!(!restocked.is_low_stock());

        suppliers::delete(&store, supplier_id).await.unwrap();
        assert_eq!(get(&store, item.id).await.unwrap().supplier_id, None);

        delete(&store, item.id).await.unwrap();
        assert!(matches!(get(&store, item.id).await, Err(AppError::NotFound("Stock item"))));
    }
}
