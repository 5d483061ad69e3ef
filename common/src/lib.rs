//! Shared building blocks for the data-access workspace.
//!
//! - `errors`: the workspace-wide error type
//! - `config`: service configuration loaded from the environment
//! - `models`: connection configuration, records, query results and frames
//! - `utils`: identifier and filter predicate validation
//! - `response` / `middleware`: HTTP plumbing shared by services

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;

pub use errors::{AppError, AppResult};
