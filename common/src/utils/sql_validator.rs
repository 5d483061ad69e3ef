//! SQL fragment validator.
//!
//! Table and column names are interpolated into generated SQL (quoted), and
//! filter predicates are passed through verbatim. Both are checked here first.

use crate::errors::AppError;

/// Validates identifiers and raw predicates before they reach generated SQL.
pub struct SqlValidator;

/// Maximum identifier length accepted (PostgreSQL's NAMEDATALEN - 1).
const MAX_IDENTIFIER_LEN: usize = 63;

/// Tokens that would let a predicate escape its WHERE clause.
const FORBIDDEN_PREDICATE_TOKENS: [&str; 3] = [";", "--", "/*"];

impl SqlValidator {
    /// Validates a table or column name.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for empty, overlong or control-character names.
    pub fn validate_identifier(name: &str) -> Result<(), AppError> {
        if name.is_empty() {
            return Err(AppError::Validation("identifier must not be empty".into()));
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(AppError::Validation(format!(
                "identifier too long ({} > {}): {}",
                name.len(),
                MAX_IDENTIFIER_LEN,
                name
            )));
        }
        if name.chars().any(|c| c.is_control() || c == '\0') {
            return Err(AppError::Validation(format!(
                "identifier contains control characters: {:?}",
                name
            )));
        }
        Ok(())
    }

    /// Validates a raw filter predicate (the body of a WHERE clause).
    ///
    /// # Errors
    /// Returns `AppError::UnsafeSql` if the predicate is blank or contains
    /// statement separators or comments.
    pub fn validate_predicate(predicate: &str) -> Result<(), AppError> {
        if predicate.trim().is_empty() {
            return Err(AppError::UnsafeSql("empty filter predicate".into()));
        }
        for token in FORBIDDEN_PREDICATE_TOKENS {
            if predicate.contains(token) {
                return Err(AppError::UnsafeSql(format!(
                    "forbidden token in filter predicate: {}",
                    token
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(SqlValidator::validate_identifier("customers").is_ok());
        assert!(SqlValidator::validate_identifier("weird `name`").is_ok());
        assert!(SqlValidator::validate_identifier("").is_err());
        assert!(SqlValidator::validate_identifier(&"x".repeat(64)).is_err());
        assert!(SqlValidator::validate_identifier("bad\nname").is_err());
    }

    #[test]
    fn test_predicate_rules() {
        assert!(SqlValidator::validate_predicate("amount > 30").is_ok());
        assert!(SqlValidator::validate_predicate("amount > 30; DROP TABLE x").is_err());
        assert!(SqlValidator::validate_predicate("1=1 -- trailing").is_err());
        assert!(SqlValidator::validate_predicate("   ").is_err());
    }
}
