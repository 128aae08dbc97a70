// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The token module provides a [`Verifier`] that checks an attestation token
//! issued by the attestation service and, on success, hands back its
//! [`VerifiedClaims`].
//!
//! A token is a JWS in compact serialization.  Its `kid` header selects one
//! of the service's signing keys; the key's `x5c` certificate chain must lead
//! to a [`TrustedRoot`] pinned by the caller, and the token signature must
//! verify under the leaf certificate.
//!
//! # Example
//!
//! ```no_run
//! use trusttoken::config::Config;
//! use trusttoken::store::{fetch_signing_keys, TrustedRoot};
//! use trusttoken::token::Verifier;
//!
//! let cfg = Config::load_json("config.json").expect("loading config");
//! let root = TrustedRoot::from_pem_file("root.pem").expect("loading root");
//!
//! let keys = fetch_signing_keys(&cfg).expect("fetching signing keys");
//!
//! let token = std::fs::read_to_string("token.jwt").expect("reading token");
//!
//! let claims = Verifier::new(&root)
//!     .verify(token.trim(), &keys)
//!     .expect("verifying token");
//!
//! println!("{:?}", claims.get("attester_type"));
//! ```
//!
//! [`TrustedRoot`]: crate::store::TrustedRoot

pub use self::claims::VerifiedClaims;
pub use self::errors::Error;
pub use self::verifier::Verifier;

mod base64;
mod claims;
mod errors;
mod verifier;

use crate::store::{ISigningKeyStore, TrustedRoot};

/// Shorthand for `Verifier::new(root).verify(token, keys)`
pub fn verify<S: ISigningKeyStore + ?Sized>(
    token: &str,
    keys: &S,
    root: &TrustedRoot,
) -> Result<VerifiedClaims, Error> {
    Verifier::new(root).verify(token, keys)
}
