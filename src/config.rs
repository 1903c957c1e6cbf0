use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

pub const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.xendit.co";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub gateway_base_url: String,
    pub gateway_secret_key: String,
    pub gateway_timeout_secs: u64,
    pub callback_token: String,
    pub admin_api_key: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: parse_or("SERVER_PORT", 3000)?,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            gateway_base_url: env::var("XENDIT_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_BASE_URL.to_string()),
            gateway_secret_key: required("XENDIT_SECRET_KEY")?,
            gateway_timeout_secs: parse_or("GATEWAY_TIMEOUT_SECS", 30)?,
            callback_token: required("XENDIT_CALLBACK_TOKEN")?,
            admin_api_key: required("ADMIN_API_KEY")?,
        })
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    let value = env::var(name).with_context(|| format!("{} must be set", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} must not be empty", name);
    }
    Ok(value)
}

fn parse_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} is not a valid value: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
