//! Shared types, error taxonomy, checksum helpers and configuration for
//! the ringgate object store gateway.

pub mod checksum;
pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
