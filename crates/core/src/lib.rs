//! Core types and configuration for the barmatch system.
//!
//! This crate provides shared types used across all other crates:
//! - Sides, order identifiers and bars
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
