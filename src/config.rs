//! Configuration file handling.
//!
//! This module handles loading, merging and validating configuration
//! from `.salescharts.toml` files.

use crate::models::{FailurePolicy, NamingMode, SortOrder};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".salescharts.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Chart settings.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Input column names.
    #[serde(default)]
    pub columns: ColumnMap,

    /// Input files and the store each one belongs to, in load order.
    #[serde(default = "default_stores")]
    pub stores: Vec<StoreSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            paths: PathsConfig::default(),
            chart: ChartConfig::default(),
            columns: ColumnMap::default(),
            stores: default_stores(),
        }
    }
}

/// General pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Fixed or timestamp-suffixed output names.
    #[serde(default)]
    pub naming: NamingMode,

    /// Whether a failing report stops the remaining ones.
    #[serde(default)]
    pub on_report_error: FailurePolicy,

    /// How many products the top/bottom reports keep per store.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Optional path of a JSON dump of every aggregation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            naming: NamingMode::default(),
            on_report_error: FailurePolicy::default(),
            top_n: default_top_n(),
            summary_path: None,
        }
    }
}

fn default_top_n() -> usize {
    5
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the per-store input files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory receiving the chart images.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Field delimiter of the input files.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./dados/")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./graficos_gerados/")
}

fn default_delimiter() -> char {
    ','
}

/// Chart appearance and ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Colors as `#RRGGBB`, cycled across series.
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,

    /// Appended to chart titles and, slugified, to file names.
    #[serde(default = "default_brand")]
    pub brand: String,

    /// Order of the revenue slices.
    #[serde(default)]
    pub revenue_order: SortOrder,

    /// Order of the rating bars.
    #[serde(default)]
    pub rating_order: SortOrder,

    /// Prefix of money labels.
    #[serde(default = "default_currency_prefix")]
    pub currency_prefix: String,

    /// Image width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            brand: default_brand(),
            revenue_order: SortOrder::default(),
            rating_order: SortOrder::default(),
            currency_prefix: default_currency_prefix(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_palette() -> Vec<String> {
    vec!["#F2E205", "#A68C0A", "#F2CB05", "#F2EBC4", "#0D0D0D"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_brand() -> String {
    "Alura Store".to_string()
}

fn default_currency_prefix() -> String {
    "R$ ".to_string()
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    800
}

/// Header names of the input columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    #[serde(default = "default_price_column")]
    pub price: String,
    #[serde(default = "default_category_column")]
    pub category: String,
    #[serde(default = "default_rating_column")]
    pub rating: String,
    #[serde(default = "default_shipping_column")]
    pub shipping: String,
    #[serde(default = "default_product_column")]
    pub product: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            price: default_price_column(),
            category: default_category_column(),
            rating: default_rating_column(),
            shipping: default_shipping_column(),
            product: default_product_column(),
        }
    }
}

impl ColumnMap {
    /// All configured header names, in record field order.
    pub fn names(&self) -> [&str; 5] {
        [
            self.price.as_str(),
            self.category.as_str(),
            self.rating.as_str(),
            self.shipping.as_str(),
            self.product.as_str(),
        ]
    }
}

fn default_price_column() -> String {
    "Preço".to_string()
}

fn default_category_column() -> String {
    "Categoria do Produto".to_string()
}

fn default_rating_column() -> String {
    "Avaliação da compra".to_string()
}

fn default_shipping_column() -> String {
    "Frete".to_string()
}

fn default_product_column() -> String {
    "Produto".to_string()
}

/// One input file and the store it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSource {
    /// File name, relative to `paths.data_dir`.
    pub file: String,
    /// Store display name.
    pub name: String,
}

impl StoreSource {
    pub fn new(file: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
        }
    }
}

fn default_stores() -> Vec<StoreSource> {
    vec![
        StoreSource::new("loja_1.csv", "Alura Store Barra da Tijuca"),
        StoreSource::new("loja_2.csv", "Alura Store Campo Grande"),
        StoreSource::new("loja_3.csv", "Alura Store Recreio"),
        StoreSource::new("loja_4.csv", "Alura Store Jacarepaguá"),
    ]
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load `DEFAULT_CONFIG_FILE` from `dir`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default(dir: &Path) -> Result<Option<Self>> {
        let default_path = dir.join(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(&default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Pick the configuration of a run: the explicit file, else the default
    /// file in `dir`, else the built-in defaults.
    ///
    /// A default file that exists but does not parse is an error.
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from: {}", path.display());
            return Self::load(path);
        }

        match Self::load_default(dir).context("Invalid default config")? {
            Some(config) => {
                info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
                Ok(config)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data_dir) = args.data_dir {
            self.paths.data_dir = data_dir.clone();
        }
        if let Some(ref output_dir) = args.output_dir {
            self.paths.output_dir = output_dir.clone();
        }
        if let Some(naming) = args.naming {
            self.general.naming = naming;
        }
        if let Some(policy) = args.on_report_error {
            self.general.on_report_error = policy;
        }
        if let Some(top_n) = args.top_n {
            self.general.top_n = top_n;
        }
        if let Some(order) = args.revenue_order {
            self.chart.revenue_order = order;
        }
        if let Some(order) = args.rating_order {
            self.chart.rating_order = order;
        }
        if let Some(ref summary) = args.summary {
            self.general.summary_path = Some(summary.clone());
        }
    }

    /// Check the settings the pipeline cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.stores.is_empty() {
            bail!("At least one store must be configured");
        }

        let mut seen = HashSet::new();
        for store in &self.stores {
            if store.name.trim().is_empty() || store.file.trim().is_empty() {
                bail!("Store entries need both a file and a name");
            }
            if !seen.insert(store.name.as_str()) {
                bail!("Duplicate store name: {}", store.name);
            }
        }

        if self.chart.palette.is_empty() {
            bail!("Chart palette must contain at least one color");
        }
        for color in &self.chart.palette {
            crate::report::parse_hex_color(color)?;
        }

        if self.general.top_n == 0 {
            bail!("top_n must be at least 1");
        }

        if self.columns.names().iter().any(|c| c.trim().is_empty()) {
            bail!("Column names must not be empty");
        }

        if !self.paths.delimiter.is_ascii() {
            bail!("Delimiter must be a single ASCII character");
        }

        if self.chart.width == 0 || self.chart.height == 0 {
            bail!("Chart dimensions must be non-zero");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
