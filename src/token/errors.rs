// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use jsonwebtoken::Algorithm;

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("malformed token: {0}")]
    Parse(String),
    #[error("no signing key with kid {0}")]
    UnknownKey(String),
    #[error("certificate chain broken at link {link}: {reason}")]
    ChainValidation { link: usize, reason: String },
    #[error("token algorithm {token:?} does not match key algorithm {key:?}")]
    AlgorithmMismatch { token: Algorithm, key: Algorithm },
    #[error("invalid token signature: {0}")]
    SignatureInvalid(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(e) | Error::UnknownKey(e) | Error::SignatureInvalid(e) => {
                write!(f, "{}", e)
            }
            Error::ChainValidation { link, reason } => {
                write!(f, "link {}: {}", link, reason)
            }
            Error::AlgorithmMismatch { token, key } => {
                write!(f, "{:?} != {:?}", token, key)
            }
        }
    }
}
