//! Target configuration: one database endpoint plus its delivery policy

use crate::error::{ClientError, ConfigError};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use url::Url;

/// Longest accepted Target description
pub const MAX_DESCRIPTION_LEN: usize = 100;

/// Credential kept out of logs and encoded at rest
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Plaintext value, for building request headers only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(self.0.as_bytes()))
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        String::from_utf8(bytes)
            .map(Secret)
            .map_err(serde::de::Error::custom)
    }
}

/// Write consistency requested from clustered v1 servers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    Any,
    One,
    Quorum,
    All,
}

impl Consistency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Consistency::Any => "any",
            Consistency::One => "one",
            Consistency::Quorum => "quorum",
            Consistency::All => "all",
        }
    }
}

/// One configured destination database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    /// Unique label, the key jobs select a Target by
    pub description: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<Secret>,
    /// v2 API token
    pub token: Option<Secret>,
    /// Database (v1) or bucket (v2)
    pub database: String,
    /// Presence selects the v2 protocol
    pub organization: Option<String>,
    pub retention_policy: Option<String>,
    pub consistency: Option<Consistency>,
    /// Fail the publication when this Target fails
    pub expose_exceptions: bool,
    /// Honour the environment proxy settings
    pub use_proxy: bool,
    /// Publish every matching build, not only jobs that select this Target
    pub global_listener: bool,
    /// Regex over the job path, blank matches everything
    pub global_listener_filter: Option<String>,
    /// Time points at the scheduled time instead of the publication time
    pub job_scheduled_time_as_timestamp: bool,
}

impl Target {
    pub fn new(
        description: impl Into<String>,
        url: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            url: url.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Organization, if one is configured and not blank
    pub fn organization(&self) -> Option<&str> {
        self.organization
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
    }

    pub fn is_v2(&self) -> bool {
        self.organization().is_some()
    }

    pub fn parsed_url(&self) -> Result<Url, ClientError> {
        let url = Url::parse(self.url.trim()).map_err(|e| ClientError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ClientError::InvalidUrl {
                url: self.url.clone(),
                reason: format!("unsupported scheme '{other}'"),
            }),
        }
    }

    /// Description rules shared by the store and the job-level selection
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTarget {
            description: self.description.clone(),
            reason: reason.to_string(),
        };

        if self.description.trim().is_empty() {
            return Err(invalid("description is required"));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(invalid("description is longer than 100 characters"));
        }
        if let Some(filter) = self.global_listener_filter.as_deref() {
            if !filter.trim().is_empty() {
                regex::Regex::new(filter)
                    .map_err(|e| invalid(&format!("global listener filter: {e}")))?;
            }
        }
        Ok(())
    }
}
