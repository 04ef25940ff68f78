//! Core traits and exchange types for reqhub
//!
//! This module defines the seams that decouple the coordinator from the
//! external HTTP collaborator: the transport trait, the executor contract,
//! and the request/response exchange types.

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{BoxFuture, Shared};
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value as JsonValue;

use super::error::FetchResult;

/// Shared handle to the eventual outcome of one underlying transfer.
///
/// Cloning a handle attaches another caller to the same settlement; the
/// transfer itself is never re-run.
pub type ResultHandle<T> = Shared<BoxFuture<'static, FetchResult<T>>>;

/// Capability that requests the underlying transfer abort.
///
/// Best-effort: invoking it only asks the transport to stop, the
/// coordinator never verifies the abort took effect.
pub type CancelFn = Box<dyn FnOnce() + Send + Sync>;

/// What an executor produces when invoked: the transfer future and the
/// capability to abort it.
pub struct Execution<T> {
    pub future: BoxFuture<'static, FetchResult<T>>,
    pub cancel: CancelFn,
}

/// An outgoing API request as handed to the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<JsonValue>,
}

/// Undecoded transport response: status plus raw body bytes.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Decoded API response; the unit the coordinator caches and shares.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: JsonValue,
}

/// Trait for the external HTTP client collaborator.
///
/// Implementations perform the actual transfer and return the raw payload;
/// they never touch coordinator state and never interpret payload shape.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the transfer described by `request`.
    async fn fetch(&self, request: ApiRequest) -> FetchResult<RawResponse>;
}
