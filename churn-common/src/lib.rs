//! # Churn Common Library
//!
//! Shared code for the churn scoring services:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - SQLite initialization and lock retry
//! - Domain schema and validated records
//! - Model artifact and scorer capability seams

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod schema;

pub use error::{Error, Result};
pub use schema::{DomainSchema, FieldValue, Record, ValidationError};
