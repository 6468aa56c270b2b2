//! # Plate Common Library
//!
//! Shared code for the plate illustration services:
//! - Error type
//! - Configuration loading (`plate.toml`, environment overrides)
//! - Progress snapshots and the per-job progress channel
//! - SSE response helpers for progress subscriptions

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
