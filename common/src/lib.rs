//! Shared utilities for the remote dump tooling
//!
//! This crate provides common functionality used across components:
//! - Structured logging initialization

pub mod logging;

pub use logging::init_logging;
