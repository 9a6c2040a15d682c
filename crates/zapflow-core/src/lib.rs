//! Core domain + application logic for ZapFlow.
//!
//! This crate is framework-agnostic. The automation-server HTTP client and
//! the system link opener live behind ports (traits) implemented in adapter
//! crates.

pub mod channel;
pub mod config;
pub mod domain;
pub mod errors;
pub mod import;
pub mod liaison;
pub mod logging;
pub mod phone;
pub mod queue;
pub mod session;
pub mod store;
pub mod template;
pub mod utils;

pub use errors::{Error, Result};
