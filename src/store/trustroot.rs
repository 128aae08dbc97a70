// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use openssl::x509::{X509NameRef, X509Ref, X509};
use std::fmt;
use std::fs;
use std::path::Path;

/// The certificate that terminates every signing key's chain.  It is pinned
/// by the caller and never taken from the service.
#[derive(Clone)]
pub struct TrustedRoot {
    cert: X509,
}

impl TrustedRoot {
    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        X509::from_pem(pem)
            .map(|cert| Self { cert })
            .map_err(|e| Error::InvalidRoot(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        X509::from_der(der)
            .map(|cert| Self { cert })
            .map_err(|e| Error::InvalidRoot(e.to_string()))
    }

    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let pem = fs::read(path)
            .map_err(|e| Error::InvalidRoot(format!("{}: {e}", path.display())))?;

        Self::from_pem(&pem)
    }

    pub fn certificate(&self) -> &X509Ref {
        &self.cert
    }
}

impl fmt::Debug for TrustedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrustedRoot({})", display_name(self.cert.subject_name()))
    }
}

/// Render a distinguished name as `CN=..., O=...`
pub(crate) fn display_name(name: &X509NameRef) -> String {
    name.entries()
        .map(|e| {
            let k = e.object().nid().short_name().unwrap_or("?");
            let v = String::from_utf8_lossy(e.data().as_slice());
            format!("{k}={v}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}
