// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::base64::decode_str;
use super::claims::VerifiedClaims;
use super::errors::Error;
use crate::store::{display_name, ISigningKeyStore, SigningKeyEntry, TrustedRoot};
use jsonwebtoken::jwk::AlgorithmParameters;
use jsonwebtoken::{Algorithm, DecodingKey};
use log::debug;
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::bn::{BigNum, BigNumContext};
use openssl::pkey::Id;
use openssl::error::ErrorStack;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509Ref, X509StoreContext, X509VerifyResult, X509};
use std::cmp::Ordering;

/// A compact JWS split into its parts.  Nothing in here is trusted yet.
struct Jws<'a> {
    kid: String,
    alg: Algorithm,
    signed: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> Jws<'a> {
    fn parse(token: &'a str) -> Result<Self, Error> {
        let parts: Vec<&str> = token.split('.').collect();

        if parts.len() != 3 {
            return Err(Error::Parse(format!(
                "expecting 3 dot-separated segments, found {}",
                parts.len()
            )));
        }

        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::Parse("empty segment".to_string()));
        }

        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| Error::Parse(format!("header: {e}")))?;

        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Parse("header carries no kid".to_string()))?;

        Ok(Self {
            kid,
            alg: header.alg,
            signed: &token[..parts[0].len() + 1 + parts[1].len()],
            payload: parts[1],
            signature: parts[2],
        })
    }

    fn claims(&self) -> Result<VerifiedClaims, Error> {
        let raw = decode_str(self.payload).map_err(|e| Error::Parse(format!("payload: {e}")))?;

        VerifiedClaims::from_payload(&raw)
    }
}

fn broken<S: Into<String>>(link: usize, reason: S) -> Error {
    Error::ChainValidation {
        link,
        reason: reason.into(),
    }
}

fn check_validity(cert: &X509Ref, now: &Asn1TimeRef) -> Result<(), String> {
    let subject = || display_name(cert.subject_name());

    if cert
        .not_before()
        .compare(now)
        .map_err(|e| e.to_string())?
        == Ordering::Greater
    {
        return Err(format!(
            "{} is not valid before {}",
            subject(),
            cert.not_before()
        ));
    }

    if cert
        .not_after()
        .compare(now)
        .map_err(|e| e.to_string())?
        == Ordering::Less
    {
        return Err(format!("{} expired on {}", subject(), cert.not_after()));
    }

    Ok(())
}

fn check_issued(cert: &X509Ref, issuer: &X509Ref) -> Result<(), String> {
    let r = issuer.issued(cert);
    if r != X509VerifyResult::OK {
        return Err(format!(
            "{} is not the issuer of {}: {}",
            display_name(issuer.subject_name()),
            display_name(cert.subject_name()),
            r.error_string()
        ));
    }

    let key = issuer.public_key().map_err(|e| e.to_string())?;

    match cert.verify(&key) {
        Ok(true) => Ok(()),
        Ok(false) => Err(format!(
            "signature on {} does not verify under {}",
            display_name(cert.subject_name()),
            display_name(issuer.subject_name())
        )),
        Err(e) => Err(e.to_string()),
    }
}

/// Path validation proper (CA flags, path length, key usage) with `root` as
/// the only trust anchor.  On failure, returns the depth of the offending
/// certificate.
fn check_path(root: &X509Ref, certs: &[X509]) -> Result<(), (usize, String)> {
    let setup = |e: ErrorStack| (0usize, e.to_string());

    let mut builder = X509StoreBuilder::new().map_err(setup)?;
    builder.add_cert(root.to_owned()).map_err(setup)?;
    let store = builder.build();

    let mut untrusted = Stack::new().map_err(setup)?;
    for c in &certs[1..] {
        untrusted.push(c.clone()).map_err(setup)?;
    }

    let mut ctx = X509StoreContext::new().map_err(setup)?;
    let failed = ctx
        .init(&store, &certs[0], &untrusted, |c| {
            Ok(match c.verify_cert()? {
                true => None,
                false => Some((c.error_depth() as usize, c.error())),
            })
        })
        .map_err(setup)?;

    match failed {
        None => Ok(()),
        Some((depth, r)) => Err((depth, r.error_string().to_string())),
    }
}

fn bignum(b64: &str) -> Result<BigNum, String> {
    let v = decode_str(b64).map_err(|e| format!("key parameter: {e}"))?;
    BigNum::from_slice(&v).map_err(|e| e.to_string())
}

/// The published key parameters must be those of the leaf certificate
fn check_key_binding(leaf: &X509Ref, params: &AlgorithmParameters) -> Result<(), String> {
    let pkey = leaf.public_key().map_err(|e| e.to_string())?;

    let same = match params {
        AlgorithmParameters::RSA(p) => {
            let rsa = pkey
                .rsa()
                .map_err(|_| "leaf certificate key is not an RSA key".to_string())?;

            let (n, e) = (bignum(&p.n)?, bignum(&p.e)?);

            rsa.n().ucmp(&n) == Ordering::Equal && rsa.e().ucmp(&e) == Ordering::Equal
        }
        AlgorithmParameters::EllipticCurve(p) => {
            let ec = pkey
                .ec_key()
                .map_err(|_| "leaf certificate key is not an EC key".to_string())?;

            let mut ctx = BigNumContext::new().map_err(|e| e.to_string())?;
            let mut x = BigNum::new().map_err(|e| e.to_string())?;
            let mut y = BigNum::new().map_err(|e| e.to_string())?;

            ec.public_key()
                .affine_coordinates(ec.group(), &mut x, &mut y, &mut ctx)
                .map_err(|e| e.to_string())?;

            let (px, py) = (bignum(&p.x)?, bignum(&p.y)?);

            x.ucmp(&px) == Ordering::Equal && y.ucmp(&py) == Ordering::Equal
        }
        _ => return Err("unsupported key type".to_string()),
    };

    if !same {
        return Err("leaf certificate key does not match the published key".to_string());
    }

    Ok(())
}

fn decoding_key(leaf: &X509Ref) -> Result<DecodingKey, String> {
    let pkey = leaf.public_key().map_err(|e| e.to_string())?;
    let pem = pkey.public_key_to_pem().map_err(|e| e.to_string())?;

    match pkey.id() {
        Id::RSA => DecodingKey::from_rsa_pem(&pem),
        Id::EC => DecodingKey::from_ec_pem(&pem),
        Id::ED25519 => DecodingKey::from_ed_pem(&pem),
        other => return Err(format!("unsupported leaf key type {}", other.as_raw())),
    }
    .map_err(|e| e.to_string())
}

/// Verifies attestation tokens against signing keys that chain to a pinned
/// root certificate
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    root: &'a TrustedRoot,
}

impl<'a> Verifier<'a> {
    pub fn new(root: &'a TrustedRoot) -> Self {
        Self { root }
    }

    /// Verify `token` and return its claims.  The token is accepted only if
    /// its kid names a key in `keys`, that key's certificate chain leads to
    /// the trusted root, the algorithms agree and the signature verifies
    /// under the leaf certificate.  The first failing step ends verification.
    pub fn verify<S: ISigningKeyStore + ?Sized>(
        &self,
        token: &str,
        keys: &S,
    ) -> Result<VerifiedClaims, Error> {
        let jws = Jws::parse(token)?;

        let entry = keys
            .lookup(&jws.kid)
            .ok_or_else(|| Error::UnknownKey(jws.kid.clone()))?;

        let leaf = self.validate_chain(&entry)?;

        if jws.alg != entry.alg {
            return Err(Error::AlgorithmMismatch {
                token: jws.alg,
                key: entry.alg,
            });
        }

        let key = decoding_key(&leaf).map_err(Error::SignatureInvalid)?;

        match jsonwebtoken::crypto::verify(jws.signature, jws.signed.as_bytes(), &key, jws.alg) {
            Ok(true) => {}
            Ok(false) => {
                return Err(Error::SignatureInvalid(
                    "signature does not verify under the leaf certificate key".to_string(),
                ))
            }
            Err(e) => return Err(Error::SignatureInvalid(e.to_string())),
        }

        debug!("token signed with key {} ({:?}) verified", entry.kid, entry.alg);

        jws.claims()
    }

    /// Walk the chain from the leaf (link 0) up to the trusted root (link n,
    /// n being the chain length) and return the leaf certificate
    fn validate_chain(&self, entry: &SigningKeyEntry) -> Result<X509, Error> {
        let root = self.root.certificate();

        let mut certs = entry
            .chain
            .iter()
            .enumerate()
            .map(|(i, der)| {
                X509::from_der(der).map_err(|e| broken(i, format!("parsing certificate: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if certs.is_empty() {
            return Err(broken(0, "empty certificate chain"));
        }

        check_key_binding(&certs[0], &entry.params).map_err(|r| broken(0, r))?;

        let now = Asn1Time::days_from_now(0).map_err(|e| broken(0, e.to_string()))?;

        for (i, cert) in certs.iter().enumerate() {
            check_validity(cert, &now).map_err(|r| broken(i, r))?;

            let issuer = certs.get(i + 1).map(|c| &**c).unwrap_or(root);

            check_issued(cert, issuer).map_err(|r| broken(i, r))?;
        }

        check_validity(root, &now).map_err(|r| broken(certs.len(), format!("trusted root: {r}")))?;

        check_path(root, &certs).map_err(|(link, r)| broken(link, r))?;

        Ok(certs.swap_remove(0))
    }
}
