// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("evidence collection failed: {0}")]
    Collection(String),
    #[error("event log collection failed: {0}")]
    EventLog(String),
    #[error("unsupported TEE: {0}")]
    Unsupported(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Collection(e) | Error::EventLog(e) | Error::Unsupported(e) => {
                write!(f, "{}", e)
            }
        }
    }
}
