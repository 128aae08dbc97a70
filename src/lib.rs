// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Client for a remote attestation service issuing signed trust tokens.
//!
//! This crate collects hardware attestation evidence from a confidential
//! computing guest (Intel TDX or AMD SEV-SNP), exchanges it with the
//! attestation service for a signed token, and verifies tokens against the
//! service's signing keys and a caller-pinned root certificate.
//!
//! The API allows:
//! * Collecting a quote bound to caller-supplied user data ([`evidence`])
//! * Building a validated token request and sending it to the service ([`client`])
//! * Fetching the service's token signing keys ([`store`])
//! * Verifying a token's signature and certificate chain ([`token`])

pub mod client;
pub mod config;
pub mod evidence;
pub mod store;
pub mod token;

#[cfg(test)]
pub(crate) mod testutil;
