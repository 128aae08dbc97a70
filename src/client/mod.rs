// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The client module turns TEE evidence into a signed attestation token.
//!
//! A [`TokenRequest`] is assembled (and validated) from [`Evidence`], the
//! policies the service should appraise it against, and an optional request
//! identifier.  The [`Connector`] then performs the authenticated exchange
//! with the attestation service and returns the token together with the
//! correlation identifiers reported by the service.
//!
//! # Example
//!
//! ```no_run
//! use trusttoken::client::Connector;
//! use trusttoken::config::Config;
//! use trusttoken::evidence::Tee;
//!
//! let cfg = Config::load_json("config.json").expect("loading config");
//! let connector = Connector::new(&cfg).expect("creating connector");
//!
//! let adapter = Tee::Tdx.adapter();
//! let policy_ids = ["4e5b6c1e-0f5a-4d44-9a69-2e4de4b0c2a1"];
//!
//! let rsp = connector
//!     .attest(adapter.as_ref(), Some(b"hello".as_slice()), true, &policy_ids, Some("job-42"))
//!     .expect("fetching attestation token");
//!
//! println!("trace id: {}", rsp.trace_id);
//! ```
//!
//! [`Evidence`]: crate::evidence::Evidence

pub use self::connector::{Connector, TokenResponse};
pub use self::connector::{ATTEST_PATH, HEADER_API_KEY, HEADER_REQUEST_ID, HEADER_TRACE_ID};
pub use self::request::{parse_policy_ids, validate_policy_ids, RequestId, TokenRequest};
pub use self::request::{user_data_from_base64, user_data_from_public_key_pem};

pub(crate) use self::connector::endpoint;

mod connector;
mod request;

use crate::{config, evidence};
use std::error::Error as StdError;
use std::time::Duration;

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::Error),
    #[error(transparent)]
    Evidence(#[from] evidence::Error),
    #[error("policy id {0} is not a valid UUID")]
    InvalidPolicyId(String),
    #[error("invalid request id: {0}")]
    InvalidRequestId(String),
    #[error("invalid user data: {0}")]
    InvalidUserData(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("attestation service returned {status}: {body}")]
    Service {
        status: u16,
        body: String,
        trace_id: Option<String>,
    },
    #[error("malformed service response: {0}")]
    Response(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "{:?}", e),
            Error::Evidence(e) => write!(f, "{:?}", e),
            Error::InvalidPolicyId(e)
            | Error::InvalidRequestId(e)
            | Error::InvalidUserData(e)
            | Error::Transport(e)
            | Error::Timeout(e)
            | Error::Response(e) => {
                write!(f, "{}", e)
            }
            Error::Service {
                status,
                body,
                trace_id,
            } => {
                write!(f, "{status} {body} (trace id: {trace_id:?})")
            }
        }
    }
}

impl Error {
    /// The trace identifier the service attached to a failed exchange, if any
    pub fn trace_id(&self) -> Option<&str> {
        match self {
            Error::Service { trace_id, .. } => trace_id.as_deref(),
            _ => None,
        }
    }
}

/// Build the blocking HTTP client shared by the token and key endpoints:
/// HTTPS only, TLS 1.2 or later, certificate validation on, bounded by
/// `timeout`.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .https_only(!config::LOOPBACK_HTTP_ALLOWED)
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .user_agent(format!("trusttoken/{}", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Flatten an error and its sources into a single line
pub(crate) fn error_chain(e: &dyn StdError) -> String {
    let mut s = e.to_string();
    let mut source = e.source();

    while let Some(cause) = source {
        s.push_str(": ");
        s.push_str(&cause.to_string());
        source = cause.source();
    }

    s
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(error_chain(&e))
        } else {
            Error::Transport(error_chain(&e))
        }
    }
}
