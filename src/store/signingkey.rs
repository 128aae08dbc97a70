// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm};
use jsonwebtoken::Algorithm;

/// A token signing key advertised by the attestation service
#[derive(Clone, Debug, PartialEq)]
pub struct SigningKeyEntry {
    /// Key identifier, matched against the `kid` in the token header
    pub kid: String,

    /// The signature algorithm the key is meant for
    pub alg: Algorithm,

    /// DER encoded certificates from the `x5c` member, leaf first.  They are
    /// not parsed until the chain is validated.
    pub chain: Vec<Vec<u8>>,

    /// The public key parameters, which must match the leaf certificate
    pub params: AlgorithmParameters,
}

fn signature_algorithm(ka: KeyAlgorithm) -> Option<Algorithm> {
    match ka {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        // key encryption algorithms
        _ => None,
    }
}

impl TryFrom<&Jwk> for SigningKeyEntry {
    type Error = Error;

    fn try_from(jwk: &Jwk) -> Result<Self, Error> {
        let kid = jwk
            .common
            .key_id
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::MalformedKeySet("key without kid".to_string()))?;

        let ka = jwk
            .common
            .key_algorithm
            .ok_or_else(|| Error::MalformedKeySet(format!("key {kid}: missing alg")))?;

        let alg = signature_algorithm(ka).ok_or_else(|| {
            Error::MalformedKeySet(format!("key {kid}: {ka:?} is not a signature algorithm"))
        })?;

        let x5c = match &jwk.common.x509_chain {
            Some(c) if !c.is_empty() => c,
            _ => {
                return Err(Error::MalformedKeySet(format!(
                    "key {kid}: missing x5c certificate chain"
                )))
            }
        };

        let chain = x5c
            .iter()
            .enumerate()
            .map(|(i, c)| {
                general_purpose::STANDARD.decode(c).map_err(|e| {
                    Error::MalformedKeySet(format!("key {kid}: x5c[{i}]: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            kid,
            alg,
            chain,
            params: jwk.algorithm.clone(),
        })
    }
}
