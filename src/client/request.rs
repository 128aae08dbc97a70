// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::Error;
use crate::evidence::Evidence;
use base64::{engine::general_purpose, Engine as _};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

const REQUEST_ID_PATTERN: &str = r"^[a-zA-Z0-9_ /.-]{1,128}$";

fn request_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(REQUEST_ID_PATTERN).expect("request id pattern compiles"))
}

/// A caller-chosen correlation string: 1 to 128 characters among
/// alphanumerics, `_`, space, `-`, `.` and `/`
#[derive(Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn parse(s: &str) -> Result<Self, Error> {
        if !request_id_re().is_match(s) {
            return Err(Error::InvalidRequestId(format!(
                "{s:?}: must be at most 128 characters long and contain only \
                alphanumeric characters, _, space, -, . or /"
            )));
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate every policy id, failing on the first one that is not a UUID
pub fn validate_policy_ids<S: AsRef<str>>(ids: &[S]) -> Result<Vec<Uuid>, Error> {
    ids.iter()
        .map(|id| {
            let id = id.as_ref();
            Uuid::parse_str(id).map_err(|_| Error::InvalidPolicyId(id.to_string()))
        })
        .collect()
}

/// Split a comma separated list of policy ids and validate each of them.  An
/// empty string yields no policies.
pub fn parse_policy_ids(s: &str) -> Result<Vec<Uuid>, Error> {
    if s.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<&str> = s.split(',').collect();

    validate_policy_ids(&ids)
}

/// An empty request id means "none"
pub(crate) fn optional_request_id(s: Option<&str>) -> Result<Option<RequestId>, Error> {
    match s {
        None | Some("") => Ok(None),
        Some(s) => RequestId::parse(s).map(Some),
    }
}

/// Decode user data supplied as standard base64
pub fn user_data_from_base64(s: &str) -> Result<Vec<u8>, Error> {
    general_purpose::STANDARD
        .decode(s)
        .map_err(|e| Error::InvalidUserData(format!("base64 decoding: {e}")))
}

/// The body of the first PEM block in `data` (for a public key file, its DER
/// encoding), to be bound as user data.  The bytes are taken as they are,
/// whatever the key format.
pub fn user_data_from_public_key_pem(data: &[u8]) -> Result<Vec<u8>, Error> {
    let block =
        pem::parse(data).map_err(|e| Error::InvalidUserData(format!("no PEM block found: {e}")))?;

    Ok(block.into_contents())
}

/// A validated request for an attestation token.  Once built it cannot be
/// modified.
#[derive(Debug, PartialEq, Eq)]
pub struct TokenRequest {
    evidence: Evidence,
    policy_ids: Vec<Uuid>,
    request_id: Option<RequestId>,
}

impl TokenRequest {
    /// Assemble a token request, validating the policy ids (UUIDs) and the
    /// request id.  No I/O takes place.
    pub fn build<S: AsRef<str>>(
        evidence: Evidence,
        policy_ids: &[S],
        request_id: Option<&str>,
    ) -> Result<Self, Error> {
        let policy_ids = validate_policy_ids(policy_ids)?;
        let request_id = optional_request_id(request_id)?;

        Ok(Self::new(evidence, policy_ids, request_id))
    }

    /// Assemble a token request from already validated parts
    pub fn new(evidence: Evidence, policy_ids: Vec<Uuid>, request_id: Option<RequestId>) -> Self {
        Self {
            evidence,
            policy_ids,
            request_id,
        }
    }

    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    pub fn user_data(&self) -> Option<&[u8]> {
        self.evidence.user_data()
    }

    pub fn policy_ids(&self) -> &[Uuid] {
        &self.policy_ids
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub(crate) fn to_wire(&self) -> AttestRequest {
        let b64 = |v: &[u8]| general_purpose::STANDARD.encode(v);

        AttestRequest {
            quote: b64(self.evidence.quote()),
            runtime_data: self.evidence.user_data().map(b64),
            policy_ids: if self.policy_ids.is_empty() {
                None
            } else {
                Some(self.policy_ids.clone())
            },
            event_log: self.evidence.event_log().map(b64),
        }
    }
}

/// Body of the attest endpoint; binary fields travel as standard base64
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize)]
pub(crate) struct AttestRequest {
    pub quote: String,
    pub runtime_data: Option<String>,
    pub policy_ids: Option<Vec<Uuid>>,
    pub event_log: Option<String>,
}
