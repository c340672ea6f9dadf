//! Import configuration
//!
//! Loaded from a JSON file; every field has a default so a missing file or a
//! partial file is valid.

use crate::error::{Error, Result};
use crate::resolution::ResolutionMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Columns every import file must carry
    #[serde(default = "default_required_columns")]
    pub required_columns: Vec<String>,
    /// Prefix stripped from required column names before keyword matching
    #[serde(default = "default_column_prefix")]
    pub column_prefix: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Prefix for ids synthesized when a row has none
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
    #[serde(default = "default_accepted_mime_types")]
    pub accepted_mime_types: Vec<String>,
    #[serde(default)]
    pub resolution_mode: ResolutionMode,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            required_columns: default_required_columns(),
            column_prefix: default_column_prefix(),
            delimiter: default_delimiter(),
            id_prefix: default_id_prefix(),
            accepted_extensions: default_accepted_extensions(),
            accepted_mime_types: default_accepted_mime_types(),
            resolution_mode: ResolutionMode::default(),
        }
    }
}

fn default_required_columns() -> Vec<String> {
    [
        "product_id",
        "product_name",
        "product_price",
        "product_category",
        "product_stock",
        "product_description",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_column_prefix() -> String {
    "product_".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_id_prefix() -> String {
    "PROD".to_string()
}

fn default_accepted_extensions() -> Vec<String> {
    vec!["csv".to_string()]
}

fn default_accepted_mime_types() -> Vec<String> {
    vec![
        "text/csv".to_string(),
        "application/csv".to_string(),
        "application/vnd.ms-excel".to_string(),
    ]
}

impl ImportConfig {
    /// Load configuration from a JSON file, or defaults if it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.delimiter.is_ascii() {
            return Err(Error::InvalidConfig(format!(
                "delimiter '{}' must be a single ASCII character",
                self.delimiter
            )));
        }
        if self.required_columns.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one required column must be configured".to_string(),
            ));
        }
        if self.id_prefix.is_empty() {
            return Err(Error::InvalidConfig("id_prefix must not be empty".to_string()));
        }
        Ok(())
    }

    /// The delimiter as the single byte the csv reader expects
    pub fn delimiter_byte(&self) -> u8 {
        if self.delimiter.is_ascii() {
            self.delimiter as u8
        } else {
            b','
        }
    }

    /// Bare keywords matched against headers, e.g. "price" for "product_price"
    pub fn required_keywords(&self) -> Vec<String> {
        self.required_columns
            .iter()
            .map(|column| {
                let lower = column.trim().to_lowercase();
                match lower.strip_prefix(&self.column_prefix.to_lowercase()) {
                    Some(bare) if !bare.is_empty() => bare.to_string(),
                    _ => lower,
                }
            })
            .collect()
    }

    /// Whether a file with this name and MIME type is a recognized tabular type
    pub fn accepts_file(&self, file_name: &str, mime_type: Option<&str>) -> bool {
        if let Some(mime) = mime_type {
            let mime = mime.trim().to_lowercase();
            if self.accepted_mime_types.iter().any(|m| m.eq_ignore_ascii_case(&mime)) {
                return true;
            }
        }

        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.accepted_extensions
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
