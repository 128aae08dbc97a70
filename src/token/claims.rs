// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// The claims-set of a token whose signature and signing key chain have been
/// verified.  It can only be obtained from [`Verifier::verify`].
///
/// [`Verifier::verify`]: super::Verifier::verify
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VerifiedClaims(Map<String, Value>);

impl VerifiedClaims {
    pub(crate) fn from_payload(raw: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice::<Map<String, Value>>(raw)
            .map(Self)
            .map_err(|e| Error::Parse(format!("payload is not a JSON object: {e}")))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Map the claims onto a caller-defined type
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}
