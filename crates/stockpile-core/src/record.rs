//! Product records and field coercion

use serde::{Deserialize, Serialize};

/// A single product in an inventory record set.
///
/// `id` is the identity key: it is unique within any committed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub stock: u64,
    #[serde(default)]
    pub description: String,
}

impl Record {
    /// Create a record with only an id and name, other fields defaulted
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: 0.0,
            category: String::new(),
            stock: 0,
            description: String::new(),
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_stock(mut self, stock: u64) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Coerce a price field.
///
/// Reads the leading decimal number (so "19.99 USD" is 19.99 and ".5kg" is
/// 0.5). Anything without a leading number, or a non-finite one, is 0.
pub fn coerce_price(s: &str) -> f64 {
    let trimmed = s.trim();
    let end = leading_float_len(trimmed.as_bytes());
    match trimmed[..end].parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Length of the `[+-]digits[.digits][e[+-]digits]` prefix, or 0 if there is
/// no mantissa digit.
fn leading_float_len(bytes: &[u8]) -> usize {
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let mut i = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(i);
    let mut mantissa_digits = int_end - i;
    i = int_end;

    if bytes.get(i) == Some(&b'.') {
        let frac_end = digits_from(i + 1);
        mantissa_digits += frac_end - (i + 1);
        i = frac_end;
    }
    if mantissa_digits == 0 {
        return 0;
    }

    // An exponent only counts when it has digits
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            i = exp_end;
        }
    }
    i
}

/// Coerce a stock field.
///
/// Reads the leading integer (so "12.5" and "12 units" are 12). Anything
/// without leading digits is 0, and negative counts clamp to 0.
pub fn coerce_stock(s: &str) -> u64 {
    let trimmed = s.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 || negative {
        return 0;
    }

    // Saturate on overflow rather than fall back to zero
    digits[..end].parse::<u64>().unwrap_or(u64::MAX)
}
