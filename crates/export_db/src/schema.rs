//! The `users` table schema.
//!
//! The row source only ever reads from a `users` table it assumes already
//! exists; this DDL statement is kept here so integration tests and local
//! development can stand one up without a separate migration tool.

pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    signup_date DATE NOT NULL,
    country_code CHAR(2) NOT NULL,
    subscription_tier TEXT NOT NULL,
    lifetime_value NUMERIC NOT NULL
)
"#;
