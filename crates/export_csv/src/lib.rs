//! RFC-4180-style CSV encoding with a configurable delimiter and quote
//! character.
//!
//! This crate only formats already-stringified fields; turning database
//! values into their canonical textual representation (no locale
//! formatting, ISO-8601 UTC timestamps) is the caller's job. That keeps the
//! encoder itself small, synchronous, and exactly one record deep: it never
//! buffers more than the record it is currently writing.

use std::io::Write;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsvError {
    #[error("delimiter and quote character must differ")]
    DelimiterEqualsQuote,

    #[error("{field_name} must be a single-byte ASCII character, got: {value:?}")]
    NotAscii { field_name: &'static str, value: char },

    #[error("io error writing csv: {0}")]
    Io(String),
}

impl From<std::io::Error> for CsvError {
    fn from(err: std::io::Error) -> Self {
        CsvError::Io(err.to_string())
    }
}

/// The pair (delimiter, quote character) governing CSV serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    delimiter: char,
    quote: char,
}

impl CsvDialect {
    /// Fatal if `delimiter == quote`, or if either is not a single-byte
    /// ASCII character: the writer below encodes both as a single byte, so
    /// anything beyond single-byte ASCII (e.g. `„`, U+201E) would otherwise
    /// be silently truncated into invalid UTF-8 instead of rejected.
    pub fn new(delimiter: char, quote: char) -> Result<Self, CsvError> {
        if delimiter == quote {
            return Err(CsvError::DelimiterEqualsQuote);
        }
        if !delimiter.is_ascii() {
            return Err(CsvError::NotAscii {
                field_name: "delimiter",
                value: delimiter,
            });
        }
        if !quote.is_ascii() {
            return Err(CsvError::NotAscii {
                field_name: "quote",
                value: quote,
            });
        }
        Ok(Self { delimiter, quote })
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    fn needs_quoting(&self, field: &str) -> bool {
        field.contains(self.delimiter)
            || field.contains(self.quote)
            || field.contains('\n')
            || field.contains('\r')
    }

    /// Write one field, quoting it (and doubling any embedded quote
    /// characters) only when necessary.
    fn write_field<W: Write>(&self, w: &mut W, field: &str) -> Result<(), CsvError> {
        if self.needs_quoting(field) {
            let mut buf = String::with_capacity(field.len() + 2);
            buf.push(self.quote);
            for ch in field.chars() {
                if ch == self.quote {
                    buf.push(self.quote);
                }
                buf.push(ch);
            }
            buf.push(self.quote);
            w.write_all(buf.as_bytes())?;
        } else {
            w.write_all(field.as_bytes())?;
        }
        Ok(())
    }
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
        }
    }
}

/// Write the header line: every column name quoted, separated by the
/// dialect's delimiter, terminated by a single `\n`.
pub fn write_header<W: Write>(
    w: &mut W,
    dialect: &CsvDialect,
    columns: &[&str],
) -> Result<(), CsvError> {
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            w.write_all(&[dialect.delimiter as u8])?;
        }
        w.write_all(&[dialect.quote as u8])?;
        w.write_all(column.as_bytes())?;
        w.write_all(&[dialect.quote as u8])?;
    }
    w.write_all(b"\n")?;
    Ok(())
}

/// Write one data record. `fields` must be in the same order as the header
/// columns; a `None` entry (a missing key in the source row) renders as an
/// empty field.
pub fn write_record<W: Write>(
    w: &mut W,
    dialect: &CsvDialect,
    fields: &[Option<&str>],
) -> Result<(), CsvError> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            w.write_all(&[dialect.delimiter as u8])?;
        }
        if let Some(value) = field {
            dialect.write_field(w, value)?;
        }
    }
    w.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_record(dialect: &CsvDialect, fields: &[Option<&str>]) -> String {
        let mut buf = Vec::new();
        write_record(&mut buf, dialect, fields).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn header_quotes_every_column() {
        let dialect = CsvDialect::default();
        let mut buf = Vec::new();
        write_header(&mut buf, &dialect, &["id", "email"]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "\"id\",\"email\"\n");
    }

    #[test]
    fn custom_delimiter_header() {
        let dialect = CsvDialect::new('|', '"').unwrap();
        let mut buf = Vec::new();
        write_header(&mut buf, &dialect, &["id", "email"]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "\"id\"|\"email\"\n");
    }

    #[test]
    fn plain_field_is_not_quoted() {
        let dialect = CsvDialect::default();
        assert_eq!(encode_record(&dialect, &[Some("alice")]), "alice\n");
    }

    #[test]
    fn field_with_delimiter_is_quoted() {
        let dialect = CsvDialect::default();
        assert_eq!(
            encode_record(&dialect, &[Some("alice"), Some("a,b")]),
            "alice,\"a,b\"\n"
        );
    }

    #[test]
    fn embedded_quote_is_doubled() {
        let dialect = CsvDialect::default();
        let field = r#"She said "hi", loudly"#;
        assert_eq!(
            encode_record(&dialect, &[Some(field)]),
            "\"She said \"\"hi\"\", loudly\"\n"
        );
    }

    #[test]
    fn newline_and_carriage_return_force_quoting() {
        let dialect = CsvDialect::default();
        assert_eq!(encode_record(&dialect, &[Some("a\nb")]), "\"a\nb\"\n");
        assert_eq!(encode_record(&dialect, &[Some("a\rb")]), "\"a\rb\"\n");
    }

    #[test]
    fn missing_field_renders_empty() {
        let dialect = CsvDialect::default();
        assert_eq!(encode_record(&dialect, &[Some("alice"), None]), "alice,\n");
    }

    #[test]
    fn delimiter_equal_to_quote_is_rejected() {
        assert_eq!(
            CsvDialect::new(',', ','),
            Err(CsvError::DelimiterEqualsQuote)
        );
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        assert_eq!(
            CsvDialect::new('„', '"'),
            Err(CsvError::NotAscii { field_name: "delimiter", value: '„' })
        );
    }

    #[test]
    fn non_ascii_quote_is_rejected() {
        assert_eq!(
            CsvDialect::new(',', '„'),
            Err(CsvError::NotAscii { field_name: "quote", value: '„' })
        );
    }

    #[test]
    fn empty_result_is_header_only() {
        let dialect = CsvDialect::default();
        let columns = [
            "id",
            "name",
            "email",
            "signup_date",
            "country_code",
            "subscription_tier",
            "lifetime_value",
        ];
        let mut buf = Vec::new();
        write_header(&mut buf, &dialect, &columns).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "\"id\",\"name\",\"email\",\"signup_date\",\"country_code\",\"subscription_tier\",\"lifetime_value\"\n"
        );
    }
}
