// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("fetching signing keys: {0}")]
    KeyFetch(String),
    #[error("fetching signing keys timed out: {0}")]
    Timeout(String),
    #[error("malformed key set: {0}")]
    MalformedKeySet(String),
    #[error("invalid trusted root: {0}")]
    InvalidRoot(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::KeyFetch(e)
            | Error::Timeout(e)
            | Error::MalformedKeySet(e)
            | Error::InvalidRoot(e) => {
                write!(f, "{}", e)
            }
        }
    }
}
