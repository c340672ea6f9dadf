//! Header validation for product import files
//!
//! A header satisfies a required column when it contains the column's bare
//! keyword, so "product_price", "Price" and "unit_price" all satisfy
//! "product_price".

use crate::config::ImportConfig;

/// Normalized header names from the first line of `text`, or `None` if the
/// text has no lines.
pub fn read_headers(text: &str, delimiter: char) -> Option<Vec<String>> {
    let first_line = text.lines().next()?;
    Some(
        first_line
            .split(delimiter)
            .map(|h| h.trim().to_lowercase())
            .collect(),
    )
}

/// Required columns with no matching header, in configured order.
///
/// Text with no lines is missing every required column.
pub fn missing_columns(text: &str, config: &ImportConfig) -> Vec<String> {
    let headers = read_headers(text, config.delimiter).unwrap_or_default();

    config
        .required_columns
        .iter()
        .zip(config.required_keywords())
        .filter(|(_, keyword)| !headers.iter().any(|h| h.contains(keyword.as_str())))
        .map(|(column, _)| column.clone())
        .collect()
}

/// Check that every required column is present in the header line
pub fn validate_headers(text: &str, config: &ImportConfig) -> bool {
    if text.lines().next().is_none() {
        return false;
    }
    missing_columns(text, config).is_empty()
}
