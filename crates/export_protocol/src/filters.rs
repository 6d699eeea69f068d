use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// Fixed, order-meaningful allow-list of columns the `users` export may
/// project. The order here is the default export order when the caller
/// does not request a subset.
pub const COLUMN_ALLOW_LIST: &[&str] = &[
    "id",
    "name",
    "email",
    "signup_date",
    "country_code",
    "subscription_tier",
    "lifetime_value",
];

/// A single requested column. Stored as a `&'static str` reference into
/// [`COLUMN_ALLOW_LIST`] so downstream code never has to re-validate it.
pub type ColumnSpec = &'static str;

pub fn default_columns() -> Vec<ColumnSpec> {
    COLUMN_ALLOW_LIST.to_vec()
}

/// The default export column order, re-exported for convenience.
pub static DEFAULT_COLUMNS: &[&str] = COLUMN_ALLOW_LIST;

/// One of the four subscription tiers a user may be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Basic => "basic",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ExportError> {
        match raw {
            "free" => Ok(SubscriptionTier::Free),
            "basic" => Ok(SubscriptionTier::Basic),
            "premium" => Ok(SubscriptionTier::Premium),
            "enterprise" => Ok(SubscriptionTier::Enterprise),
            other => Err(ExportError::Validation(format!(
                "invalid subscription_tier: {other}"
            ))),
        }
    }
}

/// Normalized, AND-combined filter predicates over the `users` table.
/// Absent fields contribute no clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    pub country_code: Option<String>,
    pub subscription_tier: Option<SubscriptionTier>,
    /// Stored as a decimal string to avoid float formatting ambiguity; the
    /// row source parses it into the numeric type the driver expects.
    pub min_ltv: Option<String>,
}

impl Filters {
    /// Validate and normalize a raw `country_code` query parameter: exactly
    /// two uppercase ASCII letters.
    pub fn parse_country_code(raw: &str) -> Result<String, ExportError> {
        let upper = raw.to_ascii_uppercase();
        if upper.len() == 2 && upper.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(upper)
        } else {
            Err(ExportError::Validation(format!(
                "country_code must be exactly two ASCII letters, got: {raw}"
            )))
        }
    }

    /// Validate a raw `min_ltv` query parameter: a non-negative finite
    /// decimal number.
    pub fn parse_min_ltv(raw: &str) -> Result<String, ExportError> {
        let value: f64 = raw
            .parse()
            .map_err(|_| ExportError::Validation(format!("min_ltv is not numeric: {raw}")))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ExportError::Validation(format!(
                "min_ltv must be a non-negative finite number, got: {raw}"
            )));
        }
        // Re-render through the parsed value so "007.50" etc. normalize,
        // while keeping full precision for typical LTV magnitudes.
        Ok(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.country_code.is_none() && self.subscription_tier.is_none() && self.min_ltv.is_none()
    }
}

/// Parse and validate a comma-separated `columns` query parameter against
/// [`COLUMN_ALLOW_LIST`]. Duplicates are forbidden. An empty/absent value
/// yields the default column order.
pub fn parse_columns(raw: Option<&str>) -> Result<Vec<ColumnSpec>, ExportError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(default_columns());
    };

    let mut seen = std::collections::HashSet::new();
    let mut columns = Vec::new();
    for requested in raw.split(',').map(str::trim) {
        let canonical = COLUMN_ALLOW_LIST
            .iter()
            .find(|c| **c == requested)
            .ok_or_else(|| ExportError::Validation(format!("unknown column: {requested}")))?;
        if !seen.insert(*canonical) {
            return Err(ExportError::Validation(format!(
                "duplicate column: {requested}"
            )));
        }
        columns.push(*canonical);
    }

    if columns.is_empty() {
        return Err(ExportError::Validation(
            "columns must not be empty".to_string(),
        ));
    }

    Ok(columns)
}

/// Validate a single-character dialect value (delimiter or quote char).
///
/// Rejects anything beyond a single-byte ASCII character at the HTTP
/// boundary (400), rather than letting it reach the CSV encoder, which
/// would only surface the same rejection after `initiate` has already
/// returned 202 and the pipeline has started.
pub fn parse_dialect_char(raw: &str, field_name: &str) -> Result<char, ExportError> {
    let mut chars = raw.chars();
    let first = chars
        .next()
        .ok_or_else(|| ExportError::Validation(format!("{field_name} must not be empty")))?;
    if chars.next().is_some() {
        return Err(ExportError::Validation(format!(
            "{field_name} must be a single character, got: {raw}"
        )));
    }
    if !first.is_ascii() {
        return Err(ExportError::Validation(format!(
            "{field_name} must be a single-byte ASCII character, got: {raw}"
        )));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_code_must_be_two_uppercase_letters() {
        assert_eq!(Filters::parse_country_code("us").unwrap(), "US");
        assert!(Filters::parse_country_code("USA").is_err());
        assert!(Filters::parse_country_code("U1").is_err());
    }

    #[test]
    fn min_ltv_rejects_negative_and_non_numeric() {
        assert!(Filters::parse_min_ltv("-1").is_err());
        assert!(Filters::parse_min_ltv("not-a-number").is_err());
        assert!(Filters::parse_min_ltv("0").is_ok());
        assert!(Filters::parse_min_ltv("1500.50").is_ok());
    }

    #[test]
    fn columns_reject_unknown_and_duplicates() {
        assert!(parse_columns(Some("id,bogus")).is_err());
        assert!(parse_columns(Some("id,id")).is_err());
        assert_eq!(parse_columns(Some("id,email")).unwrap(), vec!["id", "email"]);
    }

    #[test]
    fn absent_columns_yields_default_order() {
        assert_eq!(parse_columns(None).unwrap(), default_columns());
    }

    #[test]
    fn dialect_char_must_be_single_character() {
        assert_eq!(parse_dialect_char(",", "delimiter").unwrap(), ',');
        assert!(parse_dialect_char(",,", "delimiter").is_err());
        assert!(parse_dialect_char("", "delimiter").is_err());
    }

    #[test]
    fn dialect_char_rejects_non_ascii() {
        // A single Unicode scalar value, but not single-byte ASCII -- must
        // be rejected rather than silently truncated downstream.
        assert!(parse_dialect_char("„", "quoteChar").is_err());
    }
}
