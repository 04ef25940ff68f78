//! Core abstractions for reqhub
//!
//! This module provides the request coordinator, the typed key space, and
//! the traits that form the seam to the external HTTP collaborator.

pub mod container;
pub mod coordinator;
pub mod error;
pub mod key;
pub mod traits;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use container::ClientContainer;
pub use coordinator::{CoordinatorStats, RequestCoordinator};
pub use error::{ErrorContext, FetchError, FetchResult};
pub use key::{GroupTag, KeySelector, KeyToken, RequestKey};
pub use traits::*;
