//! # Datatalker Common Library
//!
//! Shared code for the datatalker crates including:
//! - Error type shared by configuration and startup code
//! - TOML configuration model and resolution
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
