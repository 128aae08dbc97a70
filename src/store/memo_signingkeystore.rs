// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::signingkey::SigningKeyEntry;
use super::ISigningKeyStore;
use jsonwebtoken::jwk::JwkSet;
use log::debug;
use std::collections::HashMap;

/// The store where the service's signing keys are stashed.  Keys are indexed
/// by their kid.
#[derive(Debug, Default, Clone)]
pub struct MemoSigningKeyStore {
    p: HashMap<String, SigningKeyEntry>,
}

impl MemoSigningKeyStore {
    /// Returns a new empty MemoSigningKeyStore
    pub fn new() -> Self {
        Self { p: HashMap::new() }
    }

    /// Returns a MemoSigningKeyStore holding the keys of the given JWKS
    pub fn from_json(j: &str) -> Result<Self, Error> {
        let mut s = Self::new();
        s.load_json(j)?;
        Ok(s)
    }

    /// Add to an existing (and possibly empty) MemoSigningKeyStore the keys
    /// found in the given JWKS document.  The whole document is rejected if
    /// any key is malformed or if two keys share a kid; keys loaded earlier
    /// are replaced by newer keys with the same kid.
    pub fn load_json(&mut self, j: &str) -> Result<(), Error> {
        let set: JwkSet =
            serde_json::from_str(j).map_err(|e| Error::MalformedKeySet(e.to_string()))?;

        let mut loaded = HashMap::new();

        for jwk in set.keys.iter() {
            let k = SigningKeyEntry::try_from(jwk)?;

            if loaded.contains_key(&k.kid) {
                return Err(Error::MalformedKeySet(format!("duplicate kid {}", k.kid)));
            }

            debug!("loaded signing key {} ({:?})", k.kid, k.alg);

            loaded.insert(k.kid.clone(), k);
        }

        self.p.extend(loaded);

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.p.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p.is_empty()
    }

    /// The identifiers of the stashed keys, in no particular order
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.p.keys().map(String::as_str)
    }
}

impl ISigningKeyStore for MemoSigningKeyStore {
    fn lookup(&self, kid: &str) -> Option<SigningKeyEntry> {
        self.p.get(kid).cloned()
    }
}
