use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Object detection endpoint. Without one every image passes moderation.
    pub classifier_url: Option<String>,
    pub classifier_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("CHAIRSPACE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CHAIRSPACE_JWT_SECRET is unset or still a placeholder");
        }

        let classifier_url = var("CHAIRSPACE_CLASSIFIER_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            jwt_secret,
            db_path: load(&var, "CHAIRSPACE_DB_PATH", "chairspace.db")?,
            host: load(&var, "CHAIRSPACE_HOST", "0.0.0.0")?,
            port: load(&var, "CHAIRSPACE_PORT", "3000")?,
            classifier_url,
            classifier_timeout: Duration::from_secs(load(
                &var,
                "CHAIRSPACE_CLASSIFIER_TIMEOUT_SECS",
                "30",
            )?),
        })
    }
}

fn load<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value '{raw}'"))
}
