//! Helpers shared by the data-access layer.

pub mod sql_validator;

pub use sql_validator::SqlValidator;
