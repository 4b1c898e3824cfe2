//! External configuration: scanner settings, per-item search queries and the
//! recipe book.
//!
//! Query documents are opaque JSON, one file per item name; the scanner only
//! ever touches the nested price-option filter when it needs a
//! denomination-restricted variant.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::RecipeDefinition;

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "RecipeValueScanner";
const APP_NAME: &str = "RecipeValueScanner";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// No search query configured for an item. Fatal for that item: it has
    /// to be fixed by the operator, retrying will not help.
    #[error("no search query configured for \"{name}\", create {path}")]
    MissingQuery { name: String, path: PathBuf },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("query file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("recipe file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("recipe file has an unexpected shape: {0}")]
    RecipeShape(String),
}

/// Runtime settings, loadable from a JSON file next to the binary; every
/// field has a sensible default.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub api_base_url: String,
    /// Denomination everything is normalized into.
    pub primary_denomination: String,
    pub secondary_denomination: String,
    /// Currency query whose price is the secondary-to-primary exchange rate.
    /// Always revalued first in a pass (the item valuations depend on it).
    pub exchange_rate_item: String,
    pub queries_dir: PathBuf,
    pub recipes_file: PathBuf,
    pub database_path: Option<PathBuf>,
    pub liquidity_horizon_minutes: i64,
    pub bootstrap_cooldown_secs: u64,
    pub item_cooldown_secs: u64,
    pub retry_backoff_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.pathofexile.com/api/trade/".to_string(),
            primary_denomination: "chaos".to_string(),
            secondary_denomination: "exalted".to_string(),
            exchange_rate_item: "chaos_in_exalt".to_string(),
            queries_dir: PathBuf::from("search_queries"),
            recipes_file: PathBuf::from("recipes.yaml"),
            database_path: None,
            liquidity_horizon_minutes: crate::domain::DEFAULT_LIQUIDITY_HORIZON_MINUTES,
            bootstrap_cooldown_secs: 30,
            item_cooldown_secs: 60,
            retry_backoff_secs: 60,
        }
    }
}

impl ScannerConfig {
    /// Load the config file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Configured database path, or the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
            .map(|dirs| dirs.data_dir().join("item_database.db"))
            .unwrap_or_else(|| PathBuf::from("item_database.db"))
    }

    pub fn bootstrap_cooldown(&self) -> Duration {
        Duration::from_secs(self.bootstrap_cooldown_secs)
    }

    pub fn item_cooldown(&self) -> Duration {
        Duration::from_secs(self.item_cooldown_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

/// Directory of per-item search query documents.
#[derive(Clone, Debug)]
pub struct QueryLibrary {
    dir: PathBuf,
}

impl QueryLibrary {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// All configured item names (file stems), in directory order.
    pub fn query_names(&self) -> Result<Vec<String>, ConfigError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }

    /// Load the query document for one item. Absence is a configuration
    /// error for that item only.
    pub fn load_query(&self, name: &str) -> Result<Value, ConfigError> {
        let path = self.dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(ConfigError::MissingQuery {
                name: name.to_string(),
                path,
            });
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Clone the query with the trade price filter pinned to one denomination,
/// creating the intermediate filter objects when the query lacks them.
pub fn with_currency_filter(query: &Value, denomination: &str) -> Value {
    let mut query = query.clone();

    let filters = ensure_object(&mut query, &["query", "filters", "trade_filters", "filters"]);
    let price = filters
        .entry("price")
        .or_insert_with(|| json!({}));
    if let Some(price) = price.as_object_mut() {
        price.insert("option".to_string(), Value::String(denomination.to_string()));
    }

    query
}

fn ensure_object<'a>(
    value: &'a mut Value,
    path: &[&str],
) -> &'a mut serde_json::Map<String, Value> {
    let mut current = value;
    for key in path {
        if !current.is_object() {
            *current = json!({});
        }
        current = current
            .as_object_mut()
            .expect("just ensured an object")
            .entry(key.to_string())
            .or_insert_with(|| json!({}));
    }
    if !current.is_object() {
        *current = json!({});
    }
    current.as_object_mut().expect("just ensured an object")
}

/// One named group of recipes, in the order they appear in the file.
#[derive(Clone, Debug, PartialEq)]
pub struct RecipeGroup {
    pub name: String,
    pub recipes: Vec<(String, RecipeDefinition)>,
}

/// Load the recipe book: a YAML mapping of group name to recipe name to
/// definition. Group and recipe order is preserved.
pub fn load_recipe_groups(path: &Path) -> Result<Vec<RecipeGroup>, ConfigError> {
    let raw = fs::read_to_string(path)?;
    parse_recipe_groups(&raw)
}

fn parse_recipe_groups(raw: &str) -> Result<Vec<RecipeGroup>, ConfigError> {
    let document: serde_yaml::Value = serde_yaml::from_str(raw)?;
    let groups = document
        .as_mapping()
        .ok_or_else(|| ConfigError::RecipeShape("top level must be a mapping".to_string()))?;

    let mut parsed = Vec::with_capacity(groups.len());
    for (group_name, entries) in groups {
        let group_name = group_name
            .as_str()
            .ok_or_else(|| ConfigError::RecipeShape("group names must be strings".to_string()))?;
        let entries = entries.as_mapping().ok_or_else(|| {
            ConfigError::RecipeShape(format!("group \"{group_name}\" must be a mapping"))
        })?;

        let mut recipes = Vec::with_capacity(entries.len());
        for (recipe_name, definition) in entries {
            let recipe_name = recipe_name.as_str().ok_or_else(|| {
                ConfigError::RecipeShape("recipe names must be strings".to_string())
            })?;
            let definition: RecipeDefinition = serde_yaml::from_value(definition.clone())?;
            recipes.push((recipe_name.to_string(), definition));
        }

        parsed.push(RecipeGroup {
            name: group_name.to_string(),
            recipes,
        });
    }

    Ok(parsed)
}
