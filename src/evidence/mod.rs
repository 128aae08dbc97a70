// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The evidence module hides TEE-specific evidence gathering behind the
//! [`EvidenceAdapter`] capability.  An adapter is chosen once, at
//! construction time, from the [`Tee`] the workload runs in; callers only see
//! opaque [`Evidence`] bound to the user data they supplied.
//!
//! # Example
//!
//! ```no_run
//! use trusttoken::evidence::Tee;
//!
//! let tee = Tee::detect().expect("running inside a TEE");
//! let adapter = tee.adapter();
//!
//! let evidence = adapter
//!     .collect(Some(b"bind me".as_slice()), true)
//!     .expect("collecting evidence");
//! ```

pub use self::errors::Error;
pub use self::tsm::{SnpAdapter, TdxAdapter};

mod errors;
mod tsm;

use openssl::hash::{hash, MessageDigest};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Size of the report data field the TEE embeds in its quote
pub const REPORT_DATA_LEN: usize = 64;

/// Hardware-originated proof of a TEE instance's identity, bound to the user
/// data it was produced for
#[derive(PartialEq, Eq)]
pub struct Evidence {
    tee: Tee,
    quote: Vec<u8>,
    user_data: Option<Vec<u8>>,
    event_log: Option<Vec<u8>>,
}

impl fmt::Debug for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evidence")
            .field("tee", &self.tee)
            .field("quote_len", &self.quote.len())
            .field("user_data_len", &self.user_data.as_ref().map(Vec::len))
            .field("event_log_len", &self.event_log.as_ref().map(Vec::len))
            .finish()
    }
}

impl Evidence {
    pub fn new(
        tee: Tee,
        quote: Vec<u8>,
        user_data: Option<Vec<u8>>,
        event_log: Option<Vec<u8>>,
    ) -> Self {
        Self {
            tee,
            quote,
            user_data,
            event_log,
        }
    }

    pub fn tee(&self) -> Tee {
        self.tee
    }

    /// The raw quote / report bytes
    pub fn quote(&self) -> &[u8] {
        &self.quote
    }

    pub fn user_data(&self) -> Option<&[u8]> {
        self.user_data.as_deref()
    }

    pub fn event_log(&self) -> Option<&[u8]> {
        self.event_log.as_deref()
    }
}

/// Uniform capability over TEE technologies: produce evidence bound to the
/// supplied user data, optionally with the platform event log attached.
pub trait EvidenceAdapter {
    fn tee(&self) -> Tee;

    /// Collect evidence binding `user_data`.  When `event_log` is set the
    /// TEE event log is gathered too and its absence is an error.
    fn collect(&self, user_data: Option<&[u8]>, event_log: bool) -> Result<Evidence, Error>;
}

pub type BoxedAdapter = Box<dyn EvidenceAdapter + Send + Sync>;

/// Supported TEE technologies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tee {
    Tdx,
    SevSnp,
}

const TDX_GUEST_DEVICE: &str = "/dev/tdx_guest";
const SEV_GUEST_DEVICE: &str = "/dev/sev-guest";

impl Tee {
    /// Look at the guest devices exposed by the kernel to find out which TEE
    /// we are running in
    pub fn detect() -> Option<Tee> {
        if Path::new(TDX_GUEST_DEVICE).exists() {
            Some(Tee::Tdx)
        } else if Path::new(SEV_GUEST_DEVICE).exists() {
            Some(Tee::SevSnp)
        } else {
            None
        }
    }

    /// Return the evidence adapter for this TEE, using the default kernel
    /// interfaces
    pub fn adapter(&self) -> BoxedAdapter {
        match self {
            Tee::Tdx => Box::new(TdxAdapter::default()),
            Tee::SevSnp => Box::new(SnpAdapter::default()),
        }
    }
}

impl fmt::Display for Tee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tee::Tdx => write!(f, "tdx"),
            Tee::SevSnp => write!(f, "sev-snp"),
        }
    }
}

impl FromStr for Tee {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tdx" => Ok(Tee::Tdx),
            "snp" | "sev-snp" | "sevsnp" => Ok(Tee::SevSnp),
            other => Err(Error::Unsupported(other.to_string())),
        }
    }
}

/// Compute the report data binding `user_data` into the quote: the SHA-512
/// digest of the user data, or all zeroes when there is nothing to bind.
pub fn report_data(user_data: Option<&[u8]>) -> Result<[u8; REPORT_DATA_LEN], Error> {
    let mut rd = [0u8; REPORT_DATA_LEN];

    if let Some(ud) = user_data {
        let sum = hash(MessageDigest::sha512(), ud)
            .map_err(|e| Error::Collection(format!("hashing user data: {e}")))?;
        rd.copy_from_slice(&sum);
    }

    Ok(rd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_from_str() {
        assert_eq!("tdx".parse::<Tee>(), Ok(Tee::Tdx));
        assert_eq!("TDX".parse::<Tee>(), Ok(Tee::Tdx));
        assert_eq!("sev-snp".parse::<Tee>(), Ok(Tee::SevSnp));
        assert_eq!(
            "sgx".parse::<Tee>(),
            Err(Error::Unsupported("sgx".to_string()))
        );
    }

    #[test]
    fn tee_display_round_trips() {
        for t in [Tee::Tdx, Tee::SevSnp] {
            assert_eq!(t.to_string().parse::<Tee>(), Ok(t));
        }
    }

    #[test]
    fn report_data_without_user_data_is_zero() {
        assert_eq!(report_data(None).unwrap(), [0u8; REPORT_DATA_LEN]);
    }

    #[test]
    fn report_data_is_sha512_of_user_data() {
        let rd = report_data(Some(b"hello".as_slice())).unwrap();
        let expected = hash(MessageDigest::sha512(), b"hello").unwrap();

        assert_eq!(rd.as_slice(), &*expected);
        assert_ne!(rd, report_data(Some(b"hello!".as_slice())).unwrap());
    }

    #[test]
    fn evidence_debug_omits_contents() {
        let e = Evidence::new(Tee::Tdx, vec![0xaa; 8], Some(b"secret".to_vec()), None);

        let s = format!("{e:?}");
        assert!(s.contains("quote_len: 8"));
        assert!(!s.contains("secret"));
    }
}
