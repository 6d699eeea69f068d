//! Filter-to-SQL translation.
//!
//! Every predicate binds through a parameter placeholder; no filter value
//! is ever interpolated into the query text. Column names come only from
//! `export_protocol::COLUMN_ALLOW_LIST`, which is a compile-time constant,
//! so they are safe to interpolate directly.

use export_protocol::Filters;
use sqlx::{Postgres, QueryBuilder};

/// Append `WHERE <AND-combined predicates>` to `builder` for every filter
/// present in `filters`. A no-op (appends nothing) when `filters` is empty.
fn push_where_clause<'a>(builder: &mut QueryBuilder<'a, Postgres>, filters: &'a Filters) {
    let mut first = true;
    macro_rules! prefix {
        () => {
            if first {
                builder.push(" WHERE ");
                first = false;
            } else {
                builder.push(" AND ");
            }
        };
    }

    if let Some(country_code) = &filters.country_code {
        prefix!();
        builder.push("country_code = ");
        builder.push_bind(country_code);
    }

    if let Some(tier) = &filters.subscription_tier {
        prefix!();
        builder.push("subscription_tier = ");
        builder.push_bind(tier.as_str());
    }

    if let Some(min_ltv) = &filters.min_ltv {
        prefix!();
        builder.push("lifetime_value >= ");
        builder.push_bind(min_ltv.parse::<f64>().unwrap_or(0.0));
    }
}

/// Build `SELECT COUNT(*) FROM users <where>`.
pub fn build_count_query(filters: &Filters) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM users");
    push_where_clause(&mut builder, filters);
    builder
}

/// Build `DECLARE <cursor_name> CURSOR FOR SELECT <cols::text> FROM users
/// <where>`. Every column is cast to `text` so the row source can read
/// every value back as `Option<String>` uniformly, regardless of its
/// underlying SQL type -- Postgres's own text serialization already
/// matches the canonical textual representation the CSV encoder expects
/// (plain decimals, `YYYY-MM-DD` dates, no locale formatting).
pub fn build_declare_cursor_query<'a>(
    cursor_name: &str,
    columns: &[&str],
    filters: &'a Filters,
) -> QueryBuilder<'a, Postgres> {
    let projection = columns
        .iter()
        .map(|c| format!("{c}::text"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut builder = QueryBuilder::new(format!(
        "DECLARE {cursor_name} CURSOR FOR SELECT {projection} FROM users"
    ));
    push_where_clause(&mut builder, filters);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_protocol::filters::SubscriptionTier;

    #[test]
    fn no_filters_produces_no_where_clause() {
        let mut builder = build_declare_cursor_query("c_abc", &["id"], &Filters::default());
        assert_eq!(
            builder.sql(),
            "DECLARE c_abc CURSOR FOR SELECT id::text FROM users"
        );
    }

    #[test]
    fn filters_are_and_combined() {
        let filters = Filters {
            country_code: Some("US".to_string()),
            subscription_tier: Some(SubscriptionTier::Premium),
            min_ltv: Some("100.0".to_string()),
        };
        let mut builder = build_declare_cursor_query("c_abc", &["id", "email"], &filters);
        assert_eq!(
            builder.sql(),
            "DECLARE c_abc CURSOR FOR SELECT id::text, email::text FROM users WHERE country_code = $1 AND subscription_tier = $2 AND lifetime_value >= $3"
        );
    }
}
