//! # pea-core
//!
//! Core types shared across all Pea crates.
//!
//! This crate provides:
//! - PeaError enum for unified error handling
//! - PeaResult alias used by every other crate
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `error`: Error types and result aliases

pub mod error;

// Re-export commonly used types
pub use error::{PeaError, PeaResult};
