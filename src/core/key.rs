//! Typed request identity
//!
//! Request keys give logical identity to calls: two calls with equal keys
//! are "the same request" regardless of timing, and share one transfer.
//! Group tags live in the same key space, so a key handed to a bulk
//! operation may name either a direct entry or a whole group.

use std::fmt;
use std::slice;

use uuid::Uuid;

/// Opaque unique token for callers that need a key nothing else can
/// collide with. Equality and hashing are by the wrapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyToken(Uuid);

impl KeyToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical identity of a request.
///
/// `Name` keys are call-site supplied stable strings; `Token` keys are
/// opaque one-off identities. A `Name` never equals a `Token`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    Name(String),
    Token(KeyToken),
}

impl RequestKey {
    pub fn name(name: impl Into<String>) -> Self {
        RequestKey::Name(name.into())
    }

    /// Mint a fresh token key, guaranteed not to collide with any other key.
    pub fn token() -> Self {
        RequestKey::Token(KeyToken::new())
    }
}

impl From<&str> for RequestKey {
    fn from(name: &str) -> Self {
        RequestKey::Name(name.to_string())
    }
}

impl From<String> for RequestKey {
    fn from(name: String) -> Self {
        RequestKey::Name(name)
    }
}

impl From<KeyToken> for RequestKey {
    fn from(token: KeyToken) -> Self {
        RequestKey::Token(token)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKey::Name(name) => write!(f, "{name}"),
            RequestKey::Token(token) => write!(f, "{token}"),
        }
    }
}

/// Tag attached to requests and cache entries for bulk operations.
///
/// Tags share the request key space: `invalidate`/`cancel` match a key
/// against entry ids and group memberships alike.
pub type GroupTag = RequestKey;

/// Key selection for bulk operations: everything, one key, or a sequence.
#[derive(Debug, Clone)]
pub enum KeySelector {
    All,
    One(RequestKey),
    Many(Vec<RequestKey>),
}

impl KeySelector {
    /// The explicitly selected keys. Empty for `All`.
    pub fn selected(&self) -> &[RequestKey] {
        match self {
            KeySelector::All => &[],
            KeySelector::One(key) => slice::from_ref(key),
            KeySelector::Many(keys) => keys,
        }
    }

    /// Whether an entry with the given id and group tags is selected.
    ///
    /// Group matching is by membership, not equality: an entry tagged with
    /// several groups is selectable through any of them.
    pub fn matches(&self, key: &RequestKey, groups: &[GroupTag]) -> bool {
        match self {
            KeySelector::All => true,
            _ => self
                .selected()
                .iter()
                .any(|selected| selected == key || groups.contains(selected)),
        }
    }
}

impl From<RequestKey> for KeySelector {
    fn from(key: RequestKey) -> Self {
        KeySelector::One(key)
    }
}

impl From<&str> for KeySelector {
    fn from(name: &str) -> Self {
        KeySelector::One(RequestKey::from(name))
    }
}

impl From<String> for KeySelector {
    fn from(name: String) -> Self {
        KeySelector::One(RequestKey::from(name))
    }
}

impl From<Vec<RequestKey>> for KeySelector {
    fn from(keys: Vec<RequestKey>) -> Self {
        KeySelector::Many(keys)
    }
}

impl From<&[RequestKey]> for KeySelector {
    fn from(keys: &[RequestKey]) -> Self {
        KeySelector::Many(keys.to_vec())
    }
}
