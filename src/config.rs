use std::env;

use anyhow::{Context, bail};

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn detect() -> Self {
        match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    /// Unset in development means the in-memory stores are used.
    pub database_url: Option<String>,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub rate_limit_max_attempts: usize,
    /// Refresh polls routinely, so it gets a looser bucket than credentials.
    pub rate_limit_refresh_max_attempts: usize,
    pub rate_limit_window_minutes: u64,
    pub server_host: String,
    pub server_port: u16,
    pub frontend_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::detect();

        let config = Self {
            environment,
            database_url: env::var("DATABASE_URL").ok(),
            access_secret: var_or_dev_default(environment, "JWT_ACCESS_SECRET", || {
                "dev-only-access-secret-do-not-use-in-prod".to_string()
            })?,
            refresh_secret: var_or_dev_default(environment, "JWT_REFRESH_SECRET", || {
                "dev-only-refresh-secret-do-not-use-in-prod".to_string()
            })?,
            access_ttl_minutes: parsed_or("ACCESS_TOKEN_TTL_MINUTES", 15)?,
            refresh_ttl_days: parsed_or("REFRESH_TOKEN_TTL_DAYS", 7)?,
            rate_limit_max_attempts: parsed_or("RATE_LIMIT_MAX_ATTEMPTS", 5)?,
            rate_limit_refresh_max_attempts: parsed_or("RATE_LIMIT_REFRESH_MAX_ATTEMPTS", 10)?,
            rate_limit_window_minutes: parsed_or("RATE_LIMIT_WINDOW_MINUTES", 15)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parsed_or("SERVER_PORT", 3000)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Production refuses to start on weak or missing secrets; development
    /// already warned when falling back to baked-in ones.
    fn validate(&self) -> anyhow::Result<()> {
        if self.access_ttl_minutes <= 0 || self.refresh_ttl_days <= 0 {
            bail!("Token TTLs must be positive");
        }

        if self.environment == Environment::Production {
            if self.database_url.is_none() {
                bail!("DATABASE_URL is required in production");
            }
            if self.access_secret.len() < MIN_SECRET_LEN
                || self.refresh_secret.len() < MIN_SECRET_LEN
            {
                bail!("JWT secrets must be at least {MIN_SECRET_LEN} characters in production");
            }
            if self.access_secret == self.refresh_secret {
                bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ");
            }
        }
        Ok(())
    }
}

fn var_or_dev_default(
    environment: Environment,
    name: &str,
    default: impl FnOnce() -> String,
) -> anyhow::Result<String> {
    match env::var(name) {
        Ok(value) => Ok(value),
        Err(_) if environment == Environment::Development => {
            tracing::warn!("{name} not set, using a development-only default");
            Ok(default())
        }
        Err(_) => bail!("{name} is required in production"),
    }
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid value for {name}: {value}")),
        Err(_) => Ok(default),
    }
}
