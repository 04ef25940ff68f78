//! Dependency injection container
//!
//! This module provides the composition root that replaces module-level
//! singletons: the application builds one container, which owns the single
//! coordinator instance and the transport, and hands both to callers by
//! reference.

use std::sync::Arc;

use super::{
    coordinator::RequestCoordinator,
    error::FetchResult,
    traits::{ApiResponse, HttpTransport},
};
use crate::{client::ApiClient, config::Config};

/// Main dependency injection container
pub struct ClientContainer {
    /// Loaded application configuration
    config: Arc<Config>,

    /// The process-wide request coordinator
    coordinator: Arc<RequestCoordinator<ApiResponse>>,

    /// External HTTP client collaborator
    transport: Arc<dyn HttpTransport>,
}

impl ClientContainer {
    /// Create a container with a fresh coordinator.
    ///
    /// The transport is always injected; reqhub does not ship a socket-level
    /// HTTP client of its own.
    pub fn new(config: Config, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            coordinator: Arc::new(RequestCoordinator::new()),
            transport,
        }
    }

    /// Create a container with custom components.
    pub fn with_components(
        config: Config,
        coordinator: Arc<RequestCoordinator<ApiResponse>>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            coordinator,
            transport,
        }
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the shared coordinator
    pub fn coordinator(&self) -> &Arc<RequestCoordinator<ApiResponse>> {
        &self.coordinator
    }

    /// Get the transport
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        self.transport.clone()
    }

    /// Build an API client wired to this container's components.
    pub fn api_client(&self) -> FetchResult<ApiClient> {
        ApiClient::new(
            &self.config,
            self.coordinator.clone(),
            self.transport.clone(),
        )
    }
}
