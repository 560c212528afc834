use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use freefood_db::UpdateMapping;
use tracing::info;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub asset_dir: PathBuf,
    /// Origin clients use to reach this server; prefixes image URLs.
    pub public_url: String,
    pub update_mapping: UpdateMapping,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: var("FREEFOOD_HOST", "0.0.0.0"),
            port: parse("FREEFOOD_PORT", "5000")?,
            db_path: var("FREEFOOD_DB_PATH", "free.db").into(),
            asset_dir: var("FREEFOOD_ASSET_DIR", "./assets").into(),
            public_url: var("FREEFOOD_PUBLIC_URL", "http://localhost:5000"),
            update_mapping: parse("FREEFOOD_UPDATE_MAPPING", "legacy")?,
        })
    }
}

fn var(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key, default)
        .parse()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("invalid value for {key}"))
}
