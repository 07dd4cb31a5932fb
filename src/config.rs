use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. `None` runs the shop on the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub jwt_secret: String,
    pub app_base_url: String,
    pub public_dir: PathBuf,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub seed_admin: Option<SeedAdmin>,
}

#[derive(Debug, Clone)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = optional("DATABASE_URL");
        let port = parse_or("PORT", 3000u16)?;
        let jwt_secret = optional("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let app_base_url = optional("APP_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let public_dir = optional("PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("public"));
        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", 24 * 7)?;
        let cookie_secure = parse_or("COOKIE_SECURE", false)?;
        let seed_admin = match (optional("SEED_ADMIN_EMAIL"), optional("SEED_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(SeedAdmin { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            app_base_url,
            public_dir,
            session_ttl_hours,
            cookie_secure,
            seed_admin,
        })
    }

    /// Public URL of the tracking page for a repair; this is what the QR code encodes.
    pub fn tracking_url(&self, repair_id: &str) -> String {
        format!("{}/track/{}", self.app_base_url, urlencoding::encode(repair_id))
    }

    pub fn repair_upload_dir(&self) -> PathBuf {
        self.public_dir.join("uploads").join("repairs")
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        database_url: None,
        port: 0,
        jwt_secret: "test-secret".to_string(),
        app_base_url: "http://shop.test".to_string(),
        public_dir: env::temp_dir().join(format!("fixdesk-{}", uuid::Uuid::new_v4())),
        session_ttl_hours: 1,
        cookie_secure: false,
        seed_admin: None,
    }
}
