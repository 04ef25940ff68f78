use std::collections::HashMap;
use std::fmt;
use std::fs;

use http::{Method, Uri};
use log::{debug, trace};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::config_error;
use crate::core::error::FetchResult;

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub client: Client,

    #[serde(default)]
    #[validate(nested)]
    pub cache: Cache,

    #[serde(default)]
    pub log: Log,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> FetchResult<Self>
    where
        P: AsRef<std::path::Path> + fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .map_err(|e| config_error!("Unable to read conf file from {path}: {e}"))?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> FetchResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)
            .map_err(|e| config_error!("Unable to parse yaml conf: {e}"))?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()
            .map_err(|e| config_error!("Conf file validation failed: {e}"))?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_default()
    }
}

/// Settings for the wrapped API client.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Client::validate_base_url"))]
pub struct Client {
    /// Absolute http(s) URL every call path is joined onto.
    pub base_url: String,

    /// Optional per-request timeout in seconds, applied by the transport.
    pub timeout: Option<u64>,

    /// Default headers merged into every outgoing request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "Client::default_request_id_header")]
    pub request_id_header: String,

    #[serde(default = "Client::default_request_id_algorithm")]
    #[validate(custom(function = "Client::validate_algorithm"))]
    pub request_id_algorithm: String,

    #[serde(default)]
    pub range_id: RangeId,
}

pub const ALGORITHM_UUID: &str = "uuid";
pub const ALGORITHM_RANGE_ID: &str = "range_id";

impl Client {
    fn default_request_id_header() -> String {
        "X-Request-Id".to_string()
    }

    fn default_request_id_algorithm() -> String {
        ALGORITHM_UUID.to_string()
    }

    fn validate_algorithm(algorithm: &String) -> Result<(), ValidationError> {
        if algorithm == ALGORITHM_UUID || algorithm == ALGORITHM_RANGE_ID {
            Ok(())
        } else {
            Err(ValidationError::new(
                "algorithm must be either 'uuid' or 'range_id'",
            ))
        }
    }

    fn validate_base_url(&self) -> Result<(), ValidationError> {
        let uri: Uri = self
            .base_url
            .parse()
            .map_err(|_| ValidationError::new("base_url_invalid"))?;

        let scheme_ok = matches!(uri.scheme_str(), Some("http") | Some("https"));
        if !scheme_ok || uri.authority().is_none() {
            return Err(ValidationError::new("base_url_must_be_absolute_http"));
        }

        Ok(())
    }
}

impl Default for Client {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: None,
            headers: HashMap::new(),
            request_id_header: Self::default_request_id_header(),
            request_id_algorithm: Self::default_request_id_algorithm(),
            range_id: RangeId::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RangeId {
    #[serde(default = "RangeId::default_char_set")]
    pub char_set: String,
    #[serde(default = "RangeId::default_length")]
    pub length: u32,
}

impl RangeId {
    pub fn default_char_set() -> String {
        "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string()
    }

    pub fn default_length() -> u32 {
        16
    }
}

impl Default for RangeId {
    fn default() -> Self {
        Self {
            char_set: Self::default_char_set(),
            length: Self::default_length(),
        }
    }
}

/// Result-cache policy for the wrapped client.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Cache {
    #[serde(default = "Cache::default_enabled")]
    pub enabled: bool,

    /// Methods whose results may be cached.
    #[serde(default = "Cache::default_methods")]
    #[validate(custom(function = "validate_methods"))]
    pub methods: Vec<String>,

    /// URLs matching any of these patterns are never cached.
    #[serde(default)]
    #[validate(custom(function = "validate_regexes"))]
    pub no_cache_patterns: Vec<String>,
}

impl Cache {
    fn default_enabled() -> bool {
        true
    }

    fn default_methods() -> Vec<String> {
        vec!["GET".to_string()]
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            methods: Self::default_methods(),
            no_cache_patterns: Vec::new(),
        }
    }
}

fn validate_methods(methods: &[String]) -> Result<(), ValidationError> {
    for m in methods {
        if m.parse::<Method>().is_err() {
            return Err(ValidationError::new("invalid_http_method"));
        }
    }
    Ok(())
}

fn validate_regexes(patterns: &[String]) -> Result<(), ValidationError> {
    for pattern in patterns {
        if Regex::new(pattern).is_err() {
            return Err(ValidationError::new("invalid_regex_pattern"));
        }
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Log {
    /// Log file path; empty means stderr only.
    #[serde(default)]
    pub path: String,

    #[serde(default = "Log::default_level")]
    pub level: String,
}

impl Log {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            path: String::new(),
            level: Self::default_level(),
        }
    }
}
