// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::signingkey::SigningKeyEntry;

/// Interface to the store where the service's token signing keys are stashed.
pub trait ISigningKeyStore {
    /// Lookup a signing key from the store given its key identifier
    fn lookup(&self, kid: &str) -> Option<SigningKeyEntry>;
}
