//! # tripcover-shared
//!
//! Identifiers, wire enums and constants shared by the store, the coverage
//! engine and the HTTP server.

pub mod constants;
pub mod error;
pub mod types;

pub use error::ParseEnumError;
pub use types::*;
