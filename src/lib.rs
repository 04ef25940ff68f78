//! This crate contains the core logic of the reqhub request coordinator.
//!
//! It defines the main modules for request coordination, the HTTP client
//! wrapper, configuration, and logging.

pub mod client;
pub mod config;
pub mod core;
pub mod logging;
pub(crate) mod utils;
