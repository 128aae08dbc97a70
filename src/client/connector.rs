// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::request::{optional_request_id, validate_policy_ids, TokenRequest};
use super::{error_chain, http_client, Error};
use crate::config::{self, Config};
use crate::evidence::EvidenceAdapter;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::Url;
use serde::Deserialize;

pub const ATTEST_PATH: &str = "appraisal/v1/attest";

pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_REQUEST_ID: &str = "request-id";
pub const HEADER_TRACE_ID: &str = "trace-id";

const MIME_JSON: &str = "application/json";

/// What the attestation service hands back for a successful exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    /// The signed attestation token, opaque at this layer
    pub token: String,
    /// Service-side trace identifier
    pub trace_id: String,
    /// Echo of the caller's request identifier
    pub request_id: Option<String>,
}

#[derive(Deserialize)]
struct AttestResponse {
    token: String,
}

/// Resolve `path` relative to `base`, keeping any path prefix `base` has
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, config::Error> {
    let mut u = base.clone();

    if !u.path().ends_with('/') {
        let p = format!("{}/", u.path());
        u.set_path(&p);
    }

    u.join(path)
        .map_err(|e| config::Error::InvalidUrl(format!("{base}{path}: {e}")))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Authenticated client of the attestation service
#[derive(Debug, Clone)]
pub struct Connector {
    cfg: Config,
    http: Client,
}

impl Connector {
    pub fn new(cfg: &Config) -> Result<Self, Error> {
        let http = http_client(cfg.timeout())
            .map_err(|e| Error::Transport(format!("building HTTP client: {}", error_chain(&e))))?;

        Ok(Self {
            cfg: cfg.clone(),
            http,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Send `req` to the attest endpoint and return the signed token along
    /// with the correlation identifiers.  Exactly one request is made; retry
    /// policy is left to the caller.
    pub fn collect_token(&self, req: &TokenRequest) -> Result<TokenResponse, Error> {
        let url = endpoint(self.cfg.service_url(), ATTEST_PATH)?;

        debug!(
            "requesting token from {url} ({} policies, request id {:?})",
            req.policy_ids().len(),
            req.request_id()
        );

        let mut rb = self
            .http
            .post(url)
            .header(HEADER_API_KEY, self.cfg.api_key())
            .header(ACCEPT, MIME_JSON)
            .json(&req.to_wire());

        if let Some(rid) = req.request_id() {
            rb = rb.header(HEADER_REQUEST_ID, rid.as_str());
        }

        let rsp = rb.send()?;

        let status = rsp.status();
        let trace_id = header_value(rsp.headers(), HEADER_TRACE_ID);
        let request_id = header_value(rsp.headers(), HEADER_REQUEST_ID);

        let body = rsp.text()?;

        if !status.is_success() {
            return Err(Error::Service {
                status: status.as_u16(),
                body,
                trace_id,
            });
        }

        let AttestResponse { token } = serde_json::from_str(&body)
            .map_err(|e| Error::Response(format!("decoding attest response: {e}")))?;

        let trace_id = trace_id
            .ok_or_else(|| Error::Response(format!("missing {HEADER_TRACE_ID} header")))?;

        info!("{HEADER_TRACE_ID}: {trace_id}");

        Ok(TokenResponse {
            token,
            trace_id,
            // the service only echoes identifiers it was given
            request_id: req.request_id().and(request_id),
        })
    }

    /// Validate the caller's inputs, collect evidence bound to `user_data`
    /// through `adapter` and exchange it for a token.  Nothing is collected
    /// nor sent unless every input is valid.
    pub fn attest<S: AsRef<str>>(
        &self,
        adapter: &dyn EvidenceAdapter,
        user_data: Option<&[u8]>,
        event_log: bool,
        policy_ids: &[S],
        request_id: Option<&str>,
    ) -> Result<TokenResponse, Error> {
        let policy_ids = validate_policy_ids(policy_ids)?;
        let request_id = optional_request_id(request_id)?;

        let evidence = adapter.collect(user_data, event_log)?;

        debug!("collected {} evidence", adapter.tee());

        let req = TokenRequest::new(evidence, policy_ids, request_id);

        self.collect_token(&req)
    }
}
