use sqlx::{postgres::PgPoolOptions, PgPool};

pub type Database = PgPool;

pub async fn create_database_pool(database_url: &str) -> Result<Database, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    log::info!("Connected to database and applied migrations");
    Ok(pool)
}
