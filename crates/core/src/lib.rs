//! Core types and utilities for the stockflow consumer
//!
//! This crate provides shared types used across all components:
//! - Price events and their decoder
//! - Batches and aggregate records
//! - Pipeline configuration
//! - Error taxonomy

pub mod types;
pub mod decoder;
pub mod config;
pub mod errors;

pub use types::*;
pub use decoder::*;
pub use config::*;
pub use errors::*;
