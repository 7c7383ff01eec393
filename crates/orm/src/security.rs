//! Identifier validation
//!
//! Table and column names reach the SQL compiler and the document filters as
//! plain strings, so both validate them here before use. Values are never
//! interpolated; they always travel as bound parameters.

use crate::error::QueryError;

/// Characters allowed in identifiers (alphanumeric, underscore, dollar)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_$";

/// Longest identifier accepted by every supported engine (PostgreSQL limit)
const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate a table or column name.
///
/// Dotted paths (`profile.city`) are accepted as long as every segment is a
/// valid identifier; document stores address nested fields that way.
pub fn validate_identifier(identifier: &str) -> Result<(), QueryError> {
    if identifier.is_empty() || identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(QueryError::InvalidIdentifier(identifier.to_string()));
    }

    for segment in identifier.split('.') {
        let mut chars = segment.chars();
        let first = match chars.next() {
            Some(c) => c,
            None => return Err(QueryError::InvalidIdentifier(identifier.to_string())),
        };
        if first.is_ascii_digit() || !ALLOWED_IDENTIFIER_CHARS.contains(first) {
            return Err(QueryError::InvalidIdentifier(identifier.to_string()));
        }
        if chars.any(|c| !ALLOWED_IDENTIFIER_CHARS.contains(c)) {
            return Err(QueryError::InvalidIdentifier(identifier.to_string()));
        }
    }

    Ok(())
}

/// Escape an identifier by doubling the quote character and wrapping it.
pub fn escape_identifier(identifier: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    let escaped = identifier.replace(quote, &doubled);
    format!("{}{}{}", quote, escaped, quote)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("api_tokens").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("profile.city").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1users").is_err());
        assert!(validate_identifier("users; DROP TABLE users").is_err());
        assert!(validate_identifier("name\"").is_err());
        assert!(validate_identifier("profile.").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("user_table", '"'), "\"user_table\"");
        assert_eq!(escape_identifier("table\"name", '"'), "\"table\"\"name\"");
        assert_eq!(escape_identifier("users", '`'), "`users`");
    }
}
