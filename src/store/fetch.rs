// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::memo_signingkeystore::MemoSigningKeyStore;
use crate::client::{endpoint, error_chain, http_client, HEADER_API_KEY};
use crate::config::Config;
use log::{debug, info};
use reqwest::header::ACCEPT;

pub const CERTS_PATH: &str = "certs";

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(error_chain(&e))
    } else {
        Error::KeyFetch(error_chain(&e))
    }
}

/// Retrieve the service's token signing keys from `{base_url}/certs`.  The
/// document is a JWKS; every key must carry a kid, an alg and an x5c chain.
pub fn fetch_signing_keys(cfg: &Config) -> Result<MemoSigningKeyStore, Error> {
    let url = endpoint(cfg.base_url(), CERTS_PATH).map_err(|e| Error::KeyFetch(e.to_string()))?;

    let http = http_client(cfg.timeout())
        .map_err(|e| Error::KeyFetch(format!("building HTTP client: {}", error_chain(&e))))?;

    debug!("fetching signing keys from {url}");

    let rsp = http
        .get(url)
        .header(HEADER_API_KEY, cfg.api_key())
        .header(ACCEPT, "application/json")
        .send()
        .map_err(transport_error)?;

    let status = rsp.status();
    let body = rsp.text().map_err(transport_error)?;

    if !status.is_success() {
        return Err(Error::KeyFetch(format!(
            "service returned {}: {body}",
            status.as_u16()
        )));
    }

    let keys = MemoSigningKeyStore::from_json(&body)?;

    info!("fetched {} signing keys", keys.len());

    Ok(keys)
}
