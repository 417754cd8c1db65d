//! # Core Runtime Module
//!
//! Foundational infrastructure shared by every other crate:
//! - Configuration ([`config::IngestConfig`]), built once and passed by reference
//! - Logging and tracing setup
//! - Event bus for auth and transfer events
//!
//! ## Overview
//!
//! Nothing in this crate performs I/O on behalf of a provider. It only
//! establishes the conventions (errors, log fields, events) the provider
//! and core crates build on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::IngestConfig;
pub use error::{Error, Result};
