//! Thin HTTP wrapper over the request coordinator
//!
//! Call sites describe a logical API call; the wrapper derives its key,
//! applies the per-call cache policy, stamps conventional headers, and
//! delegates the transfer to the injected transport through the
//! coordinator. Cancellation is wired as a best-effort signal raced
//! against the transfer.

pub mod request_id;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use tokio::sync::oneshot;

use crate::{
    config::Config,
    config_error,
    core::{
        coordinator::RequestCoordinator,
        error::{FetchError, FetchResult},
        key::{GroupTag, KeySelector, RequestKey},
        traits::{ApiRequest, ApiResponse, CancelFn, Execution, HttpTransport},
    },
    utils::request as request_utils,
};

use request_id::RequestIdGenerator;

static JSON_CONTENT_TYPE: Lazy<HeaderValue> =
    Lazy::new(|| HeaderValue::from_static("application/json"));

/// Per-call coordination policy.
///
/// `from_cache` opts the call into result reuse; `clear_cache` drops any
/// stored result for the key before issuing, forcing fresh work.
#[derive(Debug, Clone, Default)]
pub struct CallPolicy {
    pub request_id: Option<RequestKey>,
    pub request_group: Vec<GroupTag>,
    pub from_cache: bool,
    pub clear_cache: bool,
}

/// One logical API call.
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<JsonValue>,
    pub policy: CallPolicy,
}

impl ApiCall {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            policy: CallPolicy::default(),
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Explicit logical identity; otherwise derived from method and URL.
    pub fn request_id(mut self, key: impl Into<RequestKey>) -> Self {
        self.policy.request_id = Some(key.into());
        self
    }

    pub fn group(mut self, tag: impl Into<GroupTag>) -> Self {
        self.policy.request_group.push(tag.into());
        self
    }

    pub fn from_cache(mut self, from_cache: bool) -> Self {
        self.policy.from_cache = from_cache;
        self
    }

    pub fn clear_cache(mut self, clear_cache: bool) -> Self {
        self.policy.clear_cache = clear_cache;
        self
    }
}

/// API client that coordinates every call it issues.
pub struct ApiClient {
    coordinator: Arc<RequestCoordinator<ApiResponse>>,
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    default_headers: HeaderMap,
    request_id_header: HeaderName,
    id_generator: RequestIdGenerator,
    cache_enabled: bool,
    cache_methods: HashSet<Method>,
    no_cache_regex: Vec<Regex>,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        coordinator: Arc<RequestCoordinator<ApiResponse>>,
        transport: Arc<dyn HttpTransport>,
    ) -> FetchResult<Self> {
        let default_headers = build_headers(&config.client.headers)?;
        let request_id_header = HeaderName::from_bytes(config.client.request_id_header.as_bytes())
            .map_err(|e| config_error!("Invalid request id header name: {e}"))?;
        let cache_methods = config
            .cache
            .methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        let no_cache_regex = config
            .cache
            .no_cache_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| config_error!("Invalid no-cache pattern {p}: {e}")))
            .collect::<FetchResult<Vec<_>>>()?;

        Ok(Self {
            coordinator,
            transport,
            base_url: config.client.base_url.clone(),
            default_headers,
            request_id_header,
            id_generator: RequestIdGenerator::from_config(&config.client),
            cache_enabled: config.cache.enabled,
            cache_methods,
            no_cache_regex,
        })
    }

    /// Issue a call through the coordinator and await its settlement.
    pub async fn request(&self, call: ApiCall) -> FetchResult<ApiResponse> {
        let query = request_utils::canonical_query(&call.query);
        let url = request_utils::append_query(
            &request_utils::join_url(&self.base_url, &call.path),
            &query,
        );

        let key = match call.policy.request_id.clone() {
            Some(key) => key,
            None => request_utils::derive_request_key(&call.method, &url),
        };

        if call.policy.clear_cache {
            self.coordinator.invalidate(key.clone());
        }

        let cacheable = call.policy.from_cache && self.is_cacheable(&call.method, &url);
        if cacheable {
            if let Some(cached) = self.coordinator.fetch_cached(&key) {
                debug!("Cache hit: {key}");
                return cached.await;
            }
        }

        let request = self.build_request(&call, url)?;
        let transport = self.transport.clone();
        let handle = self
            .coordinator
            .issue(key.clone(), call.policy.request_group.clone(), move || {
                build_execution(transport, request)
            });

        if cacheable {
            self.coordinator
                .cache(key, call.policy.request_group, handle.clone());
        }

        handle.await
    }

    pub async fn get(&self, path: &str) -> FetchResult<ApiResponse> {
        self.request(ApiCall::new(Method::GET, path)).await
    }

    pub async fn post(&self, path: &str, body: JsonValue) -> FetchResult<ApiResponse> {
        self.request(ApiCall::new(Method::POST, path).body(body)).await
    }

    pub async fn put(&self, path: &str, body: JsonValue) -> FetchResult<ApiResponse> {
        self.request(ApiCall::new(Method::PUT, path).body(body)).await
    }

    pub async fn delete(&self, path: &str) -> FetchResult<ApiResponse> {
        self.request(ApiCall::new(Method::DELETE, path)).await
    }

    /// Cancel pending calls by key or group tag.
    pub async fn cancel(&self, selector: impl Into<KeySelector>) -> Vec<RequestKey> {
        self.coordinator.cancel(selector).await
    }

    /// Drop cached results by key or group tag.
    pub fn invalidate(&self, selector: impl Into<KeySelector>) -> Vec<RequestKey> {
        self.coordinator.invalidate(selector)
    }

    pub fn coordinator(&self) -> &Arc<RequestCoordinator<ApiResponse>> {
        &self.coordinator
    }

    fn is_cacheable(&self, method: &Method, url: &str) -> bool {
        if !self.cache_enabled || !self.cache_methods.contains(method) {
            return false;
        }
        for re in &self.no_cache_regex {
            if re.is_match(url) {
                debug!("URL {url} matches no-cache pattern, skipping cache");
                return false;
            }
        }
        true
    }

    fn build_request(&self, call: &ApiCall, url: String) -> FetchResult<ApiRequest> {
        let mut headers = self.default_headers.clone();
        if call.body.is_some() {
            headers.insert(header::CONTENT_TYPE, JSON_CONTENT_TYPE.clone());
        }
        if !headers.contains_key(&self.request_id_header) {
            let request_id = self.id_generator.generate();
            let value = HeaderValue::from_str(&request_id)
                .map_err(|e| config_error!("Generated request id is not header-safe: {e}"))?;
            headers.insert(self.request_id_header.clone(), value);
        }

        Ok(ApiRequest {
            method: call.method.clone(),
            url,
            headers,
            body: call.body.clone(),
        })
    }
}

fn build_headers(headers: &HashMap<String, String>) -> FetchResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| config_error!("Invalid default header name {name}: {e}"))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| config_error!("Invalid default header value for {name}: {e}"))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Wire a transfer future and its abort capability together.
fn build_execution(transport: Arc<dyn HttpTransport>, request: ApiRequest) -> Execution<ApiResponse> {
    let url = request.url.clone();
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    let future = async move {
        tokio::select! {
            biased;
            _ = cancel_rx => {
                debug!("Transfer aborted: {url}");
                Err(FetchError::Cancelled(format!("request to {url} was cancelled")))
            }
            outcome = fetch_and_decode(transport, request) => outcome,
        }
    }
    .boxed();

    let cancel: CancelFn = Box::new(move || {
        // The transfer may already have settled; nothing to do then.
        let _ = cancel_tx.send(());
    });

    Execution { future, cancel }
}

async fn fetch_and_decode(
    transport: Arc<dyn HttpTransport>,
    request: ApiRequest,
) -> FetchResult<ApiResponse> {
    let method = request.method.clone();
    let url = request.url.clone();
    let raw = transport.fetch(request).await?;

    if !raw.status.is_success() {
        warn!("{method} {url} answered {}", raw.status);
        return Err(FetchError::Transport(format!(
            "{method} {url} failed with status {}",
            raw.status
        )));
    }

    let body = if raw.body.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&raw.body)
            .map_err(|e| FetchError::Decode(format!("invalid JSON payload from {url}: {e}")))?
    };

    debug!("{method} {url} settled with status {}", raw.status);
    Ok(ApiResponse {
        status: raw.status,
        body,
    })
}
