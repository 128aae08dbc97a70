// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Attestation service configuration.
//!
//! The configuration is a small JSON document naming the service endpoint and
//! the API key used to authenticate against it:
//!
//! ```json
//! {
//!     "service_url": "https://api.trust.example.com",
//!     "api_key": "c2VjcmV0LWFwaS1rZXk=",
//!     "base_url": "https://portal.trust.example.com",
//!     "timeout_secs": 30
//! }
//! ```
//!
//! `base_url` (where the signing keys are published) and `timeout_secs` are
//! optional.  Everything is validated before any network call is attempted.

use base64::{engine::general_purpose, Engine as _};
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Plain HTTP is only spoken to the in-process responder of the unit tests
pub(crate) const LOOPBACK_HTTP_ALLOWED: bool = cfg!(test);

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("reading config: {0}")]
    Read(String),
    #[error("parsing config: {0}")]
    Parse(String),
    #[error("missing field in config: {0}")]
    MissingField(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid API key, must be a base64 string: {0}")]
    InvalidApiKey(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Read(e)
            | Error::Parse(e)
            | Error::MissingField(e)
            | Error::InvalidUrl(e)
            | Error::InvalidApiKey(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

#[derive(Clone, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    service_url: String,
    #[serde(default)]
    api_key: String,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

/// Validated connection parameters for the attestation service
#[derive(Clone)]
pub struct Config {
    service_url: Url,
    base_url: Url,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // the API key is a credential, keep it out of logs
        f.debug_struct("Config")
            .field("service_url", &self.service_url.as_str())
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Build a configuration from its parts, applying the same checks as
    /// [`Config::from_json`]
    pub fn new(service_url: &str, api_key: &str) -> Result<Self, Error> {
        Self::validate(RawConfig {
            service_url: service_url.to_string(),
            api_key: api_key.to_string(),
            ..Default::default()
        })
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(j: &str) -> Result<Self, Error> {
        let raw: RawConfig = serde_json::from_str(j).map_err(|e| Error::Parse(e.to_string()))?;

        Self::validate(raw)
    }

    /// Read, parse and validate the configuration file at `path`
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let j = fs::read_to_string(path)
            .map_err(|e| Error::Read(format!("{}: {e}", path.display())))?;

        Self::from_json(&j)
    }

    /// Override the timeout applied to every request made with this config
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the base URL the signing keys are fetched from
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, Error> {
        self.base_url = parse_url(base_url)?;
        Ok(self)
    }

    pub fn service_url(&self) -> &Url {
        &self.service_url
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn validate(raw: RawConfig) -> Result<Self, Error> {
        if raw.service_url.is_empty() {
            return Err(Error::MissingField("service_url".to_string()));
        }

        if raw.api_key.is_empty() {
            return Err(Error::MissingField("api_key".to_string()));
        }

        let service_url = parse_url(&raw.service_url)?;

        // either alphabet is accepted
        general_purpose::STANDARD
            .decode(&raw.api_key)
            .or_else(|_| general_purpose::URL_SAFE.decode(&raw.api_key))
            .map_err(|e| Error::InvalidApiKey(e.to_string()))?;

        let base_url = match raw.base_url.as_deref() {
            None | Some("") => service_url.clone(),
            Some(u) => parse_url(u)?,
        };

        let timeout = match raw.timeout_secs {
            Some(0) => return Err(Error::Parse("timeout_secs must be positive".to_string())),
            Some(s) => Duration::from_secs(s),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            service_url,
            base_url,
            api_key: raw.api_key,
            timeout,
        })
    }
}

fn parse_url(s: &str) -> Result<Url, Error> {
    let u = Url::parse(s).map_err(|e| Error::InvalidUrl(format!("{s}: {e}")))?;

    if u.cannot_be_a_base() {
        return Err(Error::InvalidUrl(format!("{s}: not an absolute URL")));
    }

    match u.scheme() {
        "https" => Ok(u),
        "http" if LOOPBACK_HTTP_ALLOWED && is_loopback(&u) => Ok(u),
        _ => Err(Error::InvalidUrl(format!("{s}: not an https URL"))),
    }
}

fn is_loopback(u: &Url) -> bool {
    u.host_str()
        .and_then(|h| h.parse::<IpAddr>().ok())
        .map_or(false, |ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEST_API_KEY: &str = "c2VjcmV0LWFwaS1rZXk=";

    #[test]
    fn from_json_ok() {
        let j = format!(
            r#"{{
                "service_url": "https://api.trust.example.com",
                "api_key": "{TEST_API_KEY}",
                "timeout_secs": 5
            }}"#
        );

        let c = Config::from_json(&j).unwrap();

        assert_eq!(c.service_url().as_str(), "https://api.trust.example.com/");
        assert_eq!(c.base_url(), c.service_url());
        assert_eq!(c.api_key(), TEST_API_KEY);
        assert_eq!(c.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn base_url_is_kept_separate() {
        let j = format!(
            r#"{{
                "service_url": "https://api.trust.example.com",
                "base_url": "https://portal.trust.example.com",
                "api_key": "{TEST_API_KEY}"
            }}"#
        );

        let c = Config::from_json(&j).unwrap();

        assert_eq!(c.base_url().as_str(), "https://portal.trust.example.com/");
        assert_eq!(c.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn empty_api_key() {
        let r = Config::new("https://api.trust.example.com", "");

        assert_eq!(r.unwrap_err(), Error::MissingField("api_key".to_string()));
    }

    #[test]
    fn missing_service_url() {
        let j = format!(r#"{{ "api_key": "{TEST_API_KEY}" }}"#);

        assert!(matches!(
            Config::from_json(&j),
            Err(Error::MissingField(f)) if f == "service_url"
        ));
    }

    #[test]
    fn relative_url() {
        assert!(matches!(
            Config::new("/appraisal/v1", TEST_API_KEY),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            Config::new("mailto:someone@example.com", TEST_API_KEY),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn plain_http_rejected() {
        assert!(matches!(
            Config::new("http://api.trust.example.com", TEST_API_KEY),
            Err(Error::InvalidUrl(_))
        ));

        let c = Config::new("https://api.trust.example.com", TEST_API_KEY).unwrap();
        assert!(matches!(
            c.with_base_url("http://portal.trust.example.com"),
            Err(Error::InvalidUrl(_))
        ));

        let j = format!(
            r#"{{
                "service_url": "https://api.trust.example.com",
                "base_url": "http://portal.trust.example.com",
                "api_key": "{TEST_API_KEY}"
            }}"#
        );
        assert!(matches!(Config::from_json(&j), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn api_key_not_base64() {
        assert!(matches!(
            Config::new("https://api.trust.example.com", "not base64!"),
            Err(Error::InvalidApiKey(_))
        ));
    }

    #[test]
    fn api_key_url_safe_alphabet() {
        assert!(Config::new("https://api.trust.example.com", "a-_b").is_ok());
        assert!(Config::new("https://api.trust.example.com", "a+/b").is_ok());
    }

    #[test]
    fn zero_timeout() {
        let j = format!(
            r#"{{
                "service_url": "https://api.trust.example.com",
                "api_key": "{TEST_API_KEY}",
                "timeout_secs": 0
            }}"#
        );

        assert!(matches!(Config::from_json(&j), Err(Error::Parse(_))));
    }

    #[test]
    fn load_json_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{ "service_url": "https://api.trust.example.com", "api_key": "{TEST_API_KEY}" }}"#
        )
        .unwrap();

        let c = Config::load_json(f.path()).unwrap();

        assert_eq!(c.api_key(), TEST_API_KEY);
    }

    #[test]
    fn load_json_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            Config::load_json(dir.path().join("nope.json")),
            Err(Error::Read(_))
        ));
    }

    #[test]
    fn debug_hides_api_key() {
        let c = Config::new("https://api.trust.example.com", TEST_API_KEY).unwrap();

        assert!(!format!("{c:?}").contains(TEST_API_KEY));
    }
}
