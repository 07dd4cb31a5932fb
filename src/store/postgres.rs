use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use super::{RepairQuery, ShopStore, StockQuery, StoreError, StoreResult, DUPLICATE_INVOICE_NUMBER, MISSING_CUSTOMER};
use crate::models::{
    AssignedPart, Customer, Invoice, InvoiceItem, InvoiceKind, InvoiceSource, InvoiceStatus,
    PaymentUpdate, PhoneStatus, Repair, StockItem, Supplier, UsedPhone, User,
};

const CUSTOMER_IN_USE: &str = "Customer has repairs, invoices or purchases on record";

/// Postgres-backed store. Composite writes run inside a single transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Turns constraint violations into the user-facing store errors.
fn map_db_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => {
                let message = match db.constraint() {
                    Some("customers_phone_key") => "Customer with this phone number already exists",
                    Some("stock_items_sku_key") => "SKU already exists",
                    Some("used_phones_imei_key") => "Phone with this IMEI already exists",
                    Some("invoices_invoice_number_key") => DUPLICATE_INVOICE_NUMBER,
                    Some("invoices_repair_reference_key") => "Repair has already been invoiced",
                    Some("users_email_key") => "A user with this email already exists",
                    Some("repairs_repair_id_key") => "Repair ID already exists",
                    _ => "Record already exists",
                };
                return StoreError::Duplicate(message);
            }
            Some("23503") => return StoreError::InUse(CUSTOMER_IN_USE),
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn parse_column<T>(row: &PgRow, column: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: T::Err| StoreError::Corrupt(format!("{}: {}", column, e)))
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: parse_column(row, "role")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn repair_from_row(row: &PgRow) -> StoreResult<Repair> {
    let parts: Json<Vec<AssignedPart>> = row.try_get("assigned_parts")?;
    Ok(Repair {
        id: row.try_get("id")?,
        repair_id: row.try_get("repair_id")?,
        customer_id: row.try_get("customer_id")?,
        device_type: parse_column(row, "device_type")?,
        device_brand: row.try_get("device_brand")?,
        device_model: row.try_get("device_model")?,
        imei: row.try_get("imei")?,
        issue: row.try_get("issue")?,
        status: parse_column(row, "status")?,
        assigned_parts: parts.0,
        estimated_cost: row.try_get("estimated_cost")?,
        final_cost: row.try_get("final_cost")?,
        deposit_amount: row.try_get("deposit_amount")?,
        expected_delivery_date: row.try_get("expected_delivery_date")?,
        assigned_technician: row.try_get("assigned_technician")?,
        before_repair_photo: row.try_get("before_repair_photo")?,
        qr_code_url: row.try_get("qr_code_url")?,
        notes: row.try_get("notes")?,
        technician_notes: row.try_get("technician_notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn phone_from_row(row: &PgRow) -> StoreResult<UsedPhone> {
    Ok(UsedPhone {
        id: row.try_get("id")?,
        brand: row.try_get("brand")?,
        phone_model: row.try_get("phone_model")?,
        imei: row.try_get("imei")?,
        condition: row.try_get("condition")?,
        buy_price: row.try_get("buy_price")?,
        repair_cost: row.try_get("repair_cost")?,
        sell_price: row.try_get("sell_price")?,
        status: parse_column(row, "status")?,
        buyer_id: row.try_get("buyer_id")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn invoice_from_row(row: &PgRow) -> StoreResult<Invoice> {
    let kind: InvoiceKind = parse_column(row, "invoice_type")?;
    let items: Json<Vec<InvoiceItem>> = row.try_get("items")?;
    Ok(Invoice {
        id: row.try_get("id")?,
        invoice_number: row.try_get("invoice_number")?,
        source: InvoiceSource::new(kind, row.try_get("reference_id")?),
        customer_id: row.try_get("customer_id")?,
        items: items.0,
        subtotal: row.try_get("subtotal")?,
        tax: row.try_get("tax")?,
        total_amount: row.try_get("total_amount")?,
        paid_amount: row.try_get("paid_amount")?,
        status: parse_column(row, "status")?,
        due_date: row.try_get("due_date")?,
        paid_date: row.try_get("paid_date")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn collect<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(map).collect()
}

fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

const INSERT_INVOICE: &str = r#"
    INSERT INTO invoices (
        id, invoice_number, invoice_type, reference_id, customer_id, items, subtotal, tax,
        total_amount, paid_amount, status, due_date, paid_date, notes, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
"#;

fn insert_invoice_query(invoice: &Invoice) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(INSERT_INVOICE)
        .bind(invoice.id)
        .bind(&invoice.invoice_number)
        .bind(invoice.source.kind().as_str())
        .bind(invoice.source.reference())
        .bind(invoice.customer_id)
        .bind(Json(&invoice.items))
        .bind(invoice.subtotal)
        .bind(invoice.tax)
        .bind(invoice.total_amount)
        .bind(invoice.paid_amount)
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .bind(&invoice.notes)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
}

const CHARGE_CUSTOMER: &str = "UPDATE customers SET total_spent = total_spent + $2 WHERE id = $1";

#[async_trait]
impl ShopStore for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn list_customers(&self, search: Option<&str>, limit: usize) -> StoreResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE $1::text IS NULL OR name ILIKE $1 OR phone ILIKE $1 OR email ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(like_pattern(search))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    async fn find_customers(&self, ids: &[Uuid]) -> StoreResult<Vec<Customer>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let customers = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    async fn find_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn find_customer_by_phone(&self, phone: &str) -> StoreResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE phone = $1")
            .bind(phone.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, email, address, total_repairs, total_spent, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.total_repairs)
        .bind(customer.total_spent)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET name = $2, phone = $3, email = $4, address = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_customer(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn adjust_customer_totals(&self, id: Uuid, repairs: i32, spent: Decimal) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE customers SET total_repairs = total_repairs + $2, total_spent = total_spent + $3 WHERE id = $1",
        )
        .bind(id)
        .bind(repairs)
        .bind(spent)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_customer_totals(&self, id: Uuid, repairs: i32, spent: Decimal) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE customers SET total_repairs = $2, total_spent = $3 WHERE id = $1")
            .bind(id)
            .bind(repairs)
            .bind(spent)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_suppliers(&self) -> StoreResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(suppliers)
    }

    async fn find_supplier(&self, id: Uuid) -> StoreResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(supplier)
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, email, phone, address, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.notes)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_supplier(&self, supplier: &Supplier) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE suppliers
            SET name = $2, email = $3, phone = $4, address = $5, notes = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.notes)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_supplier(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_stock(&self, query: &StockQuery) -> StoreResult<Vec<StockItem>> {
        let items = sqlx::query_as::<_, StockItem>(
            r#"
            SELECT * FROM stock_items
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR part_name ILIKE $2 OR sku ILIKE $2)
            ORDER BY part_name
            "#,
        )
        .bind(&query.category)
        .bind(like_pattern(query.search.as_deref()))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn list_low_stock(&self) -> StoreResult<Vec<StockItem>> {
        let items = sqlx::query_as::<_, StockItem>(
            "SELECT * FROM stock_items WHERE quantity <= reorder_level ORDER BY quantity ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn find_stock(&self, id: Uuid) -> StoreResult<Option<StockItem>> {
        let item = sqlx::query_as::<_, StockItem>("SELECT * FROM stock_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    async fn insert_stock(&self, item: &StockItem) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_items (
                id, part_name, sku, category, quantity, reorder_level, supplier_id,
                price, cost_price, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(item.id)
        .bind(&item.part_name)
        .bind(&item.sku)
        .bind(&item.category)
        .bind(item.quantity)
        .bind(item.reorder_level)
        .bind(item.supplier_id)
        .bind(item.price)
        .bind(item.cost_price)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_stock(&self, item: &StockItem) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE stock_items
            SET part_name = $2, sku = $3, category = $4, quantity = $5, reorder_level = $6,
                supplier_id = $7, price = $8, cost_price = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(&item.part_name)
        .bind(&item.sku)
        .bind(&item.category)
        .bind(item.quantity)
        .bind(item.reorder_level)
        .bind(item.supplier_id)
        .bind(item.price)
        .bind(item.cost_price)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_stock(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM stock_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_repairs(&self, query: &RepairQuery) -> StoreResult<Vec<Repair>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM repairs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR repair_id ILIKE $2 OR device_model ILIKE $2 OR device_brand ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(query.status.map(|s| s.as_str()))
        .bind(like_pattern(query.search.as_deref()))
        .bind(query.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
        .fetch_all(&self.pool)
        .await?;
        collect(rows, repair_from_row)
    }

    async fn find_repair(&self, id: Uuid) -> StoreResult<Option<Repair>> {
        let row = sqlx::query("SELECT * FROM repairs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(repair_from_row).transpose()
    }

    async fn find_repair_by_code(&self, repair_id: &str) -> StoreResult<Option<Repair>> {
        let row = sqlx::query("SELECT * FROM repairs WHERE repair_id = $1")
            .bind(repair_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(repair_from_row).transpose()
    }

    async fn insert_repair(&self, repair: &Repair) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO repairs (
                id, repair_id, customer_id, device_type, device_brand, device_model, imei, issue,
                status, assigned_parts, estimated_cost, final_cost, deposit_amount,
                expected_delivery_date, assigned_technician, before_repair_photo, qr_code_url,
                notes, technician_notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(repair.id)
        .bind(&repair.repair_id)
        .bind(repair.customer_id)
        .bind(repair.device_type.as_str())
        .bind(&repair.device_brand)
        .bind(&repair.device_model)
        .bind(&repair.imei)
        .bind(&repair.issue)
        .bind(repair.status.as_str())
        .bind(Json(&repair.assigned_parts))
        .bind(repair.estimated_cost)
        .bind(repair.final_cost)
        .bind(repair.deposit_amount)
        .bind(repair.expected_delivery_date)
        .bind(&repair.assigned_technician)
        .bind(&repair.before_repair_photo)
        .bind(&repair.qr_code_url)
        .bind(&repair.notes)
        .bind(&repair.technician_notes)
        .bind(repair.created_at)
        .bind(repair.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match map_db_err(err) {
            StoreError::InUse(_) => StoreError::MissingReference(MISSING_CUSTOMER),
            other => other,
        })?;
        Ok(())
    }

    async fn update_repair(&self, repair: &Repair) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE repairs
            SET device_type = $2, device_brand = $3, device_model = $4, imei = $5, issue = $6,
                status = $7, assigned_parts = $8, estimated_cost = $9, final_cost = $10,
                deposit_amount = $11, expected_delivery_date = $12, assigned_technician = $13,
                before_repair_photo = $14, qr_code_url = $15, notes = $16, technician_notes = $17,
                updated_at = $18
            WHERE id = $1
            "#,
        )
        .bind(repair.id)
        .bind(repair.device_type.as_str())
        .bind(&repair.device_brand)
        .bind(&repair.device_model)
        .bind(&repair.imei)
        .bind(&repair.issue)
        .bind(repair.status.as_str())
        .bind(Json(&repair.assigned_parts))
        .bind(repair.estimated_cost)
        .bind(repair.final_cost)
        .bind(repair.deposit_amount)
        .bind(repair.expected_delivery_date)
        .bind(&repair.assigned_technician)
        .bind(&repair.before_repair_photo)
        .bind(&repair.qr_code_url)
        .bind(&repair.notes)
        .bind(&repair.technician_notes)
        .bind(repair.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_repair(&self, id: Uuid) -> StoreResult<Option<Repair>> {
        let row = sqlx::query("DELETE FROM repairs WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(repair_from_row).transpose()
    }

    async fn count_repairs_for_customer(&self, customer_id: Uuid) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM repairs WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_phones(&self, status: Option<PhoneStatus>) -> StoreResult<Vec<UsedPhone>> {
        let rows = sqlx::query(
            "SELECT * FROM used_phones WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        collect(rows, phone_from_row)
    }

    async fn find_phone(&self, id: Uuid) -> StoreResult<Option<UsedPhone>> {
        let row = sqlx::query("SELECT * FROM used_phones WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(phone_from_row).transpose()
    }

    async fn insert_phone(&self, phone: &UsedPhone) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO used_phones (
                id, brand, phone_model, imei, condition, buy_price, repair_cost, sell_price,
                status, buyer_id, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(phone.id)
        .bind(&phone.brand)
        .bind(&phone.phone_model)
        .bind(&phone.imei)
        .bind(&phone.condition)
        .bind(phone.buy_price)
        .bind(phone.repair_cost)
        .bind(phone.sell_price)
        .bind(phone.status.as_str())
        .bind(phone.buyer_id)
        .bind(&phone.notes)
        .bind(phone.created_at)
        .bind(phone.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_phone(&self, phone: &UsedPhone) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE used_phones
            SET brand = $2, phone_model = $3, imei = $4, condition = $5, buy_price = $6,
                repair_cost = $7, sell_price = $8, status = $9, buyer_id = $10, notes = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(phone.id)
        .bind(&phone.brand)
        .bind(&phone.phone_model)
        .bind(&phone.imei)
        .bind(&phone.condition)
        .bind(phone.buy_price)
        .bind(phone.repair_cost)
        .bind(phone.sell_price)
        .bind(phone.status.as_str())
        .bind(phone.buyer_id)
        .bind(&phone.notes)
        .bind(phone.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_phone(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM used_phones WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_invoices(&self, status: Option<InvoiceStatus>) -> StoreResult<Vec<Invoice>> {
        let rows = sqlx::query(
            "SELECT * FROM invoices WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        collect(rows, invoice_from_row)
    }

    async fn find_invoice(&self, id: Uuid) -> StoreResult<Option<Invoice>> {
        let row = sqlx::query("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(invoice_from_row).transpose()
    }

    async fn find_invoice_by_source(&self, source: InvoiceSource) -> StoreResult<Option<Invoice>> {
        let row = sqlx::query(
            "SELECT * FROM invoices WHERE invoice_type = $1 AND reference_id = $2 ORDER BY created_at LIMIT 1",
        )
        .bind(source.kind().as_str())
        .bind(source.reference())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(invoice_from_row).transpose()
    }

    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET customer_id = $2, items = $3, subtotal = $4, tax = $5, total_amount = $6,
                paid_amount = $7, status = $8, due_date = $9, paid_date = $10, notes = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.customer_id)
        .bind(Json(&invoice.items))
        .bind(invoice.subtotal)
        .bind(invoice.tax)
        .bind(invoice.total_amount)
        .bind(invoice.paid_amount)
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .bind(&invoice.notes)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_invoice(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn invoiced_total_for_customer(&self, customer_id: Uuid) -> StoreResult<Decimal> {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(total_amount), 0) FROM invoices WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn insert_invoice_charging_customer(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        insert_invoice_query(invoice)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        sqlx::query(CHARGE_CUSTOMER)
            .bind(invoice.customer_id)
            .bind(invoice.total_amount)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn swap_invoice_payment(
        &self,
        id: Uuid,
        expected_paid: Decimal,
        update: &PaymentUpdate,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET paid_amount = $3, status = $4, paid_date = $5, updated_at = $6
            WHERE id = $1 AND paid_amount = $2
            "#,
        )
        .bind(id)
        .bind(expected_paid)
        .bind(update.paid_amount)
        .bind(update.status.as_str())
        .bind(update.paid_date)
        .bind(update.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_phone_sale(&self, phone: &UsedPhone, invoice: &Invoice) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let marked = sqlx::query(
            r#"
            UPDATE used_phones
            SET status = $2, sell_price = $3, buyer_id = $4, updated_at = $5
            WHERE id = $1 AND status <> 'Sold'
            "#,
        )
        .bind(phone.id)
        .bind(phone.status.as_str())
        .bind(phone.sell_price)
        .bind(phone.buyer_id)
        .bind(phone.updated_at)
        .execute(&mut *tx)
        .await?;

        if marked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_invoice_query(invoice)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        sqlx::query(CHARGE_CUSTOMER)
            .bind(invoice.customer_id)
            .bind(invoice.total_amount)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
