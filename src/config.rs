use anyhow::{Context, Result, bail};
use std::env;
use std::str::FromStr;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    /// Seconds between two auto-checkout sweeps
    pub auto_checkout_interval_secs: u64,
    pub settings_cache_ttl_secs: u64,

    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_USERNAME").ok(),
            env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) if !username.trim().is_empty() => {
                Some(BootstrapAdmin { username, password })
            }
            _ => None,
        };

        let config = Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: or_default("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: or_default("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: or_default("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: or_default("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: or_default("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            auto_checkout_interval_secs: or_default("AUTO_CHECKOUT_INTERVAL_SECS", 900)?,
            settings_cache_ttl_secs: or_default("SETTINGS_CACHE_TTL_SECS", 60)?,

            bootstrap_admin,
        };

        if config.jwt_secret.len() < 16 {
            bail!("JWT_SECRET must be at least 16 characters");
        }
        if config.auto_checkout_interval_secs == 0 {
            bail!("AUTO_CHECKOUT_INTERVAL_SECS must be greater than zero");
        }

        Ok(config)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "mysql://localhost/hrm_test".into(),
        jwt_secret: "test-secret-with-enough-length".into(),
        server_addr: "127.0.0.1:0".into(),
        access_token_ttl: 900,
        refresh_token_ttl: 3600,
        rate_login_per_min: 60,
        rate_refresh_per_min: 30,
        rate_protected_per_min: 1000,
        api_prefix: "/api".into(),
        log_dir: "logs".into(),
        auto_checkout_interval_secs: 900,
        settings_cache_ttl_secs: 60,
        bootstrap_admin: None,
    }
}
