mod config;
mod database;
mod error;
mod filters;
mod handlers;
mod middleware;
mod models;
mod services;
mod store;
mod utils;


use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use dotenvy::dotenv;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use config::{Config, SeedAdmin};
use database::create_database_pool;
use error::{AppError, AppResult};
use handlers::AppState;
use models::{Role, User};
use store::{MemoryStore, PgStore, ShopStore};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn ShopStore> = match config.database_url.as_deref() {
        Some(url) => match create_database_pool(url).await {
            Ok(pool) => Arc::new(PgStore::new(pool)),
            Err(err) => {
                log::error!("Failed to connect to database: {}", err);
                std::process::exit(1);
            }
        },
        None => {
            log::warn!("DATABASE_URL is not set; using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(seed) = &config.seed_admin {
        match seed_admin(store.as_ref(), seed).await {
            Ok(true) => log::info!("Created admin user {}", seed.email),
            Ok(false) => {}
            Err(err) => log::error!("Failed to seed admin user: {}", err),
        }
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState::new(store, config));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("Failed to bind {}: {}", addr, err);
            std::process::exit(1);
        }
    };

    log::info!("fixdesk listening on http://{}", addr);
    if let Err(err) = axum::serve(listener, app).await {
        log::error!("Server error: {}", err);
    }
}

/// Creates the configured admin account unless that email is already registered.
async fn seed_admin(store: &dyn ShopStore, seed: &SeedAdmin) -> AppResult<bool> {
    if store.find_user_by_email(&seed.email.trim().to_lowercase()).await?.is_some() {
        return Ok(false);
    }

    let hash = utils::hash_password(&seed.password)
        .map_err(|err| AppError::Internal(format!("failed to hash admin password: {}", err)))?;
    let user = User::new("Administrator".to_string(), &seed.email, hash, Role::Admin);
    store.insert_user(&user).await?;
    Ok(true)
}

fn api_routes() -> Router<AppState> {
    use handlers::{customers, dashboard, invoices, repairs, stock, suppliers, used_phones};

    Router::new()
        // Dashboard
        .route("/dashboard/stats", get(dashboard::get_stats))

        // Customers
        .route("/customers", get(customers::list_customers).post(customers::create_customer))
        .route("/customers/recompute", post(customers::recompute_all_customers))
        .route(
            "/customers/:id",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route("/customers/:id/recompute", post(customers::recompute_customer))

        // Suppliers
        .route("/suppliers", get(suppliers::list_suppliers).post(suppliers::create_supplier))
        .route(
            "/suppliers/:id",
            get(suppliers::get_supplier)
                .put(suppliers::update_supplier)
                .delete(suppliers::delete_supplier),
        )

        // Stock
        .route("/stock", get(stock::list_stock).post(stock::create_stock))
        .route("/stock/low-stock", get(stock::low_stock))
        .route(
            "/stock/:id",
            get(stock::get_stock).put(stock::update_stock).delete(stock::delete_stock),
        )

        // Repairs
        .route("/repairs", get(repairs::list_repairs).post(repairs::create_repair))
        .route(
            "/repairs/:id",
            get(repairs::get_repair)
                .put(repairs::update_repair)
                .delete(repairs::delete_repair),
        )
        .route("/repairs/:id/status", patch(repairs::update_repair_status))

        // Used phones
        .route("/used-phones", get(used_phones::list_phones).post(used_phones::buy_phone))
        .route(
            "/used-phones/:id",
            get(used_phones::get_phone)
                .put(used_phones::update_phone)
                .delete(used_phones::delete_phone),
        )
        .route("/used-phones/:id/sell", post(used_phones::sell_phone))

        // Invoices
        .route("/invoices", get(invoices::list_invoices).post(invoices::create_invoice))
        .route(
            "/invoices/:id",
            get(invoices::get_invoice)
                .put(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route("/invoices/:id/payment", post(invoices::record_payment))
}

pub fn create_router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.config.public_dir.join("uploads"));

    // Protected routes (authentication required)
    let protected = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .nest("/api", api_routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        // Public routes (no authentication required)
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/track/:repair_id", get(handlers::track::track_repair))
        .merge(protected)

        // Uploaded photos
        .nest_service("/uploads", uploads)

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB
        )
        .with_state(state)
}
