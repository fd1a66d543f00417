//! Site configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{ZoukError, ZoukResult};

pub const DEFAULT_CONFIG_FILE: &str = "zoukcal.toml";

fn default_content_dir() -> PathBuf {
    PathBuf::from("events")
}

fn default_watch_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("template.html"), PathBuf::from("app.css")]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_currency() -> String {
    "CHF".to_string()
}

fn default_free_prices() -> Vec<String> {
    vec!["donations".to_string()]
}

fn default_stale_after_hours() -> i64 {
    24
}

fn default_true() -> bool {
    true
}

fn default_recurrence_limit() -> u16 {
    365
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_cities() -> BTreeMap<String, String> {
    [("zrh", "Zürich"), ("basel", "Basel"), ("bern", "Bern")]
        .into_iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect()
}

/// Configuration read from zoukcal.toml (all fields optional).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SiteConfig {
    /// Directory tree holding one event record per `.md` file.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Templates and stylesheets whose changes also trigger a rebuild.
    #[serde(default = "default_watch_paths")]
    pub watch_paths: Vec<PathBuf>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Where `image` references are resolved. Defaults to `output_dir`.
    #[serde(default)]
    pub asset_root: Option<PathBuf>,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Prices left untouched by currency normalization.
    #[serde(default = "default_free_prices")]
    pub free_prices: Vec<String>,

    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: i64,

    /// Delete exhausted records from disk (otherwise they are only withheld).
    #[serde(default = "default_true")]
    pub prune_stale: bool,

    #[serde(default = "default_recurrence_limit")]
    pub recurrence_limit: u16,

    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// City code -> display name.
    #[serde(default = "default_cities")]
    pub cities: BTreeMap<String, String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            content_dir: default_content_dir(),
            watch_paths: default_watch_paths(),
            output_dir: default_output_dir(),
            asset_root: None,
            timezone: default_timezone(),
            currency: default_currency(),
            free_prices: default_free_prices(),
            stale_after_hours: default_stale_after_hours(),
            prune_stale: true,
            recurrence_limit: default_recurrence_limit(),
            bind: default_bind(),
            port: default_port(),
            cities: default_cities(),
        }
    }
}

impl SiteConfig {
    /// Load config from `path` (missing file is fine), then `ZOUKCAL_*` env vars.
    pub fn load(path: &Path) -> ZoukResult<Self> {
        let config: SiteConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("ZOUKCAL"))
            .build()
            .map_err(|e| ZoukError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ZoukError::Config(e.to_string()))?;

        config.timezone()?;
        Ok(config)
    }

    pub fn timezone(&self) -> ZoukResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ZoukError::Config(format!("Unknown time zone '{}'", self.timezone)))
    }

    pub fn asset_root(&self) -> &Path {
        self.asset_root.as_deref().unwrap_or(&self.output_dir)
    }

    pub fn city_registry(&self) -> CityRegistry {
        CityRegistry::new(self.cities.clone())
    }
}

/// Fixed mapping from short city codes to display names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityRegistry {
    cities: BTreeMap<String, String>,
}

impl CityRegistry {
    pub fn new(cities: BTreeMap<String, String>) -> Self {
        CityRegistry { cities }
    }

    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.cities.get(code).map(String::as_str)
    }

    pub fn codes(&self) -> Vec<&str> {
        self.cities.keys().map(String::as_str).collect()
    }
}

impl Default for CityRegistry {
    fn default() -> Self {
        CityRegistry::new(default_cities())
    }
}
