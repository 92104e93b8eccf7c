//! Queued action records.
//!
//! A [`QueuedAction`] carries everything needed to reconstruct one HTTP
//! request: target URL, verb, optional headers and an opaque encoded body.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{ActionId, ActionType, SyncError};

/// Content type of an HTML form submission.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Content type of a JSON body.
pub const JSON: &str = "application/json";

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
}

impl HttpMethod {
    /// Canonical upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            _ => Err(SyncError::InvalidMethod(s.to_string())),
        }
    }
}

/// An action as submitted by the caller, before the store stamps it.
#[derive(Clone, PartialEq, Eq)]
pub struct NewAction {
    /// Symbolic action tag.
    pub action_type: ActionType,
    /// Target URL (absolute, or relative to the backend base URL).
    pub url: String,
    /// HTTP verb.
    pub method: HttpMethod,
    /// Request headers. Empty means the default form content type applies.
    pub headers: BTreeMap<String, String>,
    /// Encoded request body.
    pub body: Vec<u8>,
}

impl NewAction {
    /// Create a new action with no headers and an empty body.
    pub fn new(action_type: impl Into<ActionType>, method: HttpMethod, url: &str) -> Self {
        Self {
            action_type: action_type.into(),
            url: url.to_string(),
            method,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// Set a request header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Set the encoded body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

impl fmt::Debug for NewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAction")
            .field("action_type", &self.action_type)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &format!("[{} bytes]", self.body.len()))
            .finish()
    }
}

/// A durable queued action.
///
/// Immutable once created. Destroyed only when its replay succeeds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Store-assigned id; insertion order.
    pub id: ActionId,
    /// Symbolic action tag.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Target URL.
    pub url: String,
    /// HTTP verb.
    pub method: HttpMethod,
    /// Request headers as submitted.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Encoded request body.
    #[serde(with = "body_base64")]
    pub body: Vec<u8>,
    /// Creation time in unix milliseconds.
    pub timestamp: i64,
    /// Always false while the action is resident in the queue.
    pub synced: bool,
}

impl QueuedAction {
    /// Stamp a new action with its id and creation time.
    pub fn from_new(id: ActionId, action: NewAction, timestamp: i64) -> Self {
        Self {
            id,
            action_type: action.action_type,
            url: action.url,
            method: action.method,
            headers: action.headers,
            body: action.body,
            timestamp,
            synced: false,
        }
    }

    /// Headers to send on replay.
    ///
    /// When no `Content-Type` was supplied the form content type is added.
    pub fn effective_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        let has_content_type = headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"));
        if !has_content_type {
            headers.insert("Content-Type".to_string(), FORM_URLENCODED.to_string());
        }
        headers
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(SyncError::Serialization)
    }
}

impl fmt::Debug for QueuedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedAction")
            .field("id", &self.id)
            .field("action_type", &self.action_type)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body", &format!("[{} bytes]", self.body.len()))
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
