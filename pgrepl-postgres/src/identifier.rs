//! Validation of identifiers that end up interpolated into SQL text.
//!
//! DDL statements can't take bind parameters for identifiers, so table names are parsed
//! into their parts and re-rendered with [`quote_identifier`] before use.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use pg_escape::quote_identifier;
use thiserror::Error;

/// Maximum length of a Postgres identifier in bytes (`NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Errors returned when an identifier can't be used safely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier in `{0}` cannot be empty")]
    Empty(String),

    #[error("identifier `{0}` exceeds {MAX_IDENTIFIER_LENGTH} bytes")]
    TooLong(String),

    #[error(
        "identifier `{0}` contains invalid characters, wrap it in double quotes to use it verbatim"
    )]
    InvalidCharacters(String),

    #[error("identifier `{0}` has an unterminated quote")]
    UnterminatedQuote(String),

    #[error("`{0}` has more than two dot-separated parts")]
    TooManyParts(String),

    #[error(
        "replication slot name `{0}` must be 1 to {MAX_IDENTIFIER_LENGTH} characters of lower case letters, numbers and underscores"
    )]
    InvalidSlotName(String),
}

/// A table reference, optionally schema qualified, as Postgres resolves it.
///
/// Unquoted parts are folded to lower case and quoted parts are kept verbatim, which is
/// the same resolution Postgres applies to the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdentifier {
    pub schema: Option<String>,
    pub name: String,
}

impl TableIdentifier {
    /// Parses `input` as `table`, `schema.table` or their double-quoted forms.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        let trimmed = input.trim();
        let mut parts = Vec::with_capacity(2);
        let mut chars = trimmed.chars().peekable();

        loop {
            let part = match chars.peek() {
                Some('"') => parse_quoted_part(&mut chars, trimmed)?,
                _ => parse_unquoted_part(&mut chars, trimmed)?,
            };

            if part.is_empty() {
                return Err(IdentifierError::Empty(input.to_owned()));
            }
            if part.len() > MAX_IDENTIFIER_LENGTH {
                return Err(IdentifierError::TooLong(part));
            }
            parts.push(part);

            match chars.next() {
                None => break,
                Some('.') => continue,
                Some(_) => return Err(IdentifierError::InvalidCharacters(input.to_owned())),
            }
        }

        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => Ok(Self { schema: None, name }),
            (Some(schema), Some(name), None) => Ok(Self {
                schema: Some(schema),
                name,
            }),
            _ => Err(IdentifierError::TooManyParts(input.to_owned())),
        }
    }

    /// Returns the identifier rendered with each part quoted.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_name = quote_identifier(&self.name);
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quoted_name),
            None => quoted_name.into_owned(),
        }
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_quoted_identifier())
    }
}

/// Consumes a double-quoted part, unescaping doubled quotes.
fn parse_quoted_part(chars: &mut Peekable<Chars<'_>>, input: &str) -> Result<String, IdentifierError> {
    // Opening quote.
    chars.next();

    let mut part = String::new();
    loop {
        match chars.next() {
            Some('"') if chars.peek() == Some(&'"') => {
                chars.next();
                part.push('"');
            }
            Some('"') => return Ok(part),
            Some('\0') => return Err(IdentifierError::InvalidCharacters(input.to_owned())),
            Some(c) => part.push(c),
            None => return Err(IdentifierError::UnterminatedQuote(input.to_owned())),
        }
    }
}

/// Consumes an unquoted part up to the next dot and folds it to lower case.
fn parse_unquoted_part(
    chars: &mut Peekable<Chars<'_>>,
    input: &str,
) -> Result<String, IdentifierError> {
    let mut part = String::new();
    while let Some(&c) = chars.peek() {
        if c == '.' {
            break;
        }

        let valid = if part.is_empty() {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_' || c == '$'
        };
        if !valid {
            return Err(IdentifierError::InvalidCharacters(input.to_owned()));
        }

        part.push(c.to_ascii_lowercase());
        chars.next();
    }

    Ok(part)
}

/// Validates a replication slot name the way Postgres does on slot creation.
pub fn validate_slot_name(slot_name: &str) -> Result<(), IdentifierError> {
    let valid_chars = slot_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if slot_name.is_empty() || slot_name.len() > MAX_IDENTIFIER_LENGTH || !valid_chars {
        return Err(IdentifierError::InvalidSlotName(slot_name.to_owned()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquoted_names_fold_to_lower_case() {
        let table = TableIdentifier::parse("Foo").unwrap();
        assert_eq!(table.schema, None);
        assert_eq!(table.name, "foo");
        assert_eq!(table.as_quoted_identifier(), "foo");
    }

    #[test]
    fn schema_qualified_names_are_split() {
        let table = TableIdentifier::parse("public.orders").unwrap();
        assert_eq!(table.schema.as_deref(), Some("public"));
        assert_eq!(table.name, "orders");
        assert_eq!(table.as_quoted_identifier(), "public.orders");
    }

    #[test]
    fn quoted_names_are_kept_verbatim() {
        let table = TableIdentifier::parse(r#""Sales"."Order ""Lines""""#).unwrap();
        assert_eq!(table.schema.as_deref(), Some("Sales"));
        assert_eq!(table.name, r#"Order "Lines""#);
        assert_eq!(
            table.as_quoted_identifier(),
            r#""Sales"."Order ""Lines""""#
        );
    }

    #[test]
    fn rejects_injection_attempts() {
        assert!(matches!(
            TableIdentifier::parse("foo; drop table bar"),
            Err(IdentifierError::InvalidCharacters(_))
        ));
        assert!(matches!(
            TableIdentifier::parse("foo--"),
            Err(IdentifierError::InvalidCharacters(_))
        ));
        assert!(matches!(
            TableIdentifier::parse(r#""foo"bar"#),
            Err(IdentifierError::InvalidCharacters(_))
        ));
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(matches!(
            TableIdentifier::parse(""),
            Err(IdentifierError::Empty(_))
        ));
        assert!(matches!(
            TableIdentifier::parse("public."),
            Err(IdentifierError::Empty(_))
        ));
        assert!(matches!(
            TableIdentifier::parse(r#""unterminated"#),
            Err(IdentifierError::UnterminatedQuote(_))
        ));
        assert!(matches!(
            TableIdentifier::parse("a.b.c"),
            Err(IdentifierError::TooManyParts(_))
        ));
        assert!(matches!(
            TableIdentifier::parse(&"t".repeat(64)),
            Err(IdentifierError::TooLong(_))
        ));
    }

    #[test]
    fn slot_names_follow_postgres_rules() {
        assert!(validate_slot_name("test_slot").is_ok());
        assert!(validate_slot_name("slot_42").is_ok());
        assert!(validate_slot_name(&"s".repeat(63)).is_ok());

        assert!(validate_slot_name("").is_err());
        assert!(validate_slot_name("Test_Slot").is_err());
        assert!(validate_slot_name("test-slot").is_err());
        assert!(validate_slot_name(&"s".repeat(64)).is_err());
    }
}
