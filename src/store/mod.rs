// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The store module holds the material tokens are verified against: the
//! service's signing keys (fetched from its JWKS endpoint or loaded from a
//! local copy) and the caller-pinned [`TrustedRoot`].

pub use self::errors::Error;
pub use self::fetch::{fetch_signing_keys, CERTS_PATH};
pub use self::isigningkeystore::ISigningKeyStore;
pub use self::memo_signingkeystore::MemoSigningKeyStore;
pub use self::signingkey::SigningKeyEntry;
pub use self::trustroot::TrustedRoot;

pub(crate) use self::trustroot::display_name;

mod errors;
mod fetch;
mod isigningkeystore;
mod memo_signingkeystore;
mod signingkey;
mod trustroot;
