// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Test fixtures: a one-shot HTTP responder and a throwaway PKI.

use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, BigNumContext, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509NameBuilder, X509};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Canned HTTP response
pub(crate) struct Reply {
    status: u16,
    body: String,
    headers: Vec<(String, String)>,
    delay: Option<Duration>,
}

impl Reply {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: Vec::new(),
            delay: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Wait before answering
    pub fn delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }
}

/// What the responder received
pub(crate) struct Captured {
    pub line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub(crate) struct Server {
    pub url: String,
    handle: JoinHandle<Captured>,
}

impl Server {
    /// Wait for the exchange to complete and return the request
    pub fn request(self) -> Captured {
        self.handle.join().unwrap()
    }
}

/// Serve exactly one HTTP exchange on a local port
pub(crate) fn serve_once(reply: Reply) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let captured = read_request(&mut stream);

        if let Some(d) = reply.delay {
            thread::sleep(d);
        }

        let mut out = format!(
            "HTTP/1.1 {} Canned\r\nContent-Length: {}\r\nConnection: close\r\n",
            reply.status,
            reply.body.len()
        );
        for (k, v) in &reply.headers {
            out.push_str(&format!("{k}: {v}\r\n"));
        }
        out.push_str("\r\n");
        out.push_str(&reply.body);

        // the client may have given up already
        let _ = stream.write_all(out.as_bytes());

        captured
    });

    Server { url, handle }
}

/// A URL nothing listens on
pub(crate) fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(p) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break p;
        }
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let len: usize = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);

    let mut body = buf[(head_end + 4).min(buf.len())..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Captured {
        line,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    }
}

pub(crate) fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

pub(crate) fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

/// Extensions put on an issued certificate
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Profile {
    /// CA:TRUE, keyCertSign
    Ca,
    /// CA:FALSE, digitalSignature
    Signing,
    /// critical CA:FALSE and no key usage at all
    EndEntity,
}

/// Issue a certificate for `key`, signed by `issuer` or self-signed, valid
/// from `not_before` to `not_after` (seconds since the epoch)
pub(crate) fn issue_with_validity(
    cn: &str,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    profile: Profile,
    not_before: i64,
    not_after: i64,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("O", "Trust Token Test").unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

    let mut b = X509::builder().unwrap();
    b.set_version(2).unwrap();
    b.set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    b.set_subject_name(&name).unwrap();
    match issuer {
        Some((c, _)) => b.set_issuer_name(c.subject_name()).unwrap(),
        None => b.set_issuer_name(&name).unwrap(),
    }
    b.set_pubkey(key).unwrap();
    b.set_not_before(&Asn1Time::from_unix(not_before).unwrap())
        .unwrap();
    b.set_not_after(&Asn1Time::from_unix(not_after).unwrap())
        .unwrap();

    match profile {
        Profile::Ca => {
            b.append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                .unwrap();
            b.append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        }
        Profile::Signing => {
            b.append_extension(BasicConstraints::new().build().unwrap())
                .unwrap();
            b.append_extension(KeyUsage::new().digital_signature().build().unwrap())
                .unwrap();
        }
        Profile::EndEntity => {
            b.append_extension(BasicConstraints::new().critical().build().unwrap())
                .unwrap();
        }
    }

    let ski = SubjectKeyIdentifier::new()
        .build(&b.x509v3_context(None, None))
        .unwrap();
    b.append_extension(ski).unwrap();

    if let Some((c, _)) = issuer {
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&b.x509v3_context(Some(c), None))
            .unwrap();
        b.append_extension(aki).unwrap();
    }

    let signer = issuer.map(|(_, k)| k).unwrap_or(key);
    b.sign(signer, MessageDigest::sha384()).unwrap();
    b.build()
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

const DAY: i64 = 24 * 60 * 60;

/// Issue a certificate valid from yesterday for the next 30 days
pub(crate) fn issue(
    cn: &str,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    profile: Profile,
) -> X509 {
    let t = now();
    issue_with_validity(cn, key, issuer, profile, t - DAY, t + 30 * DAY)
}

/// Root CA -> signing CA -> token signing leaf
pub(crate) struct Pki {
    pub root: X509,
    pub ca: X509,
    pub ca_key: PKey<Private>,
    pub leaf: X509,
    pub leaf_key: PKey<Private>,
}

impl Pki {
    pub fn new() -> Self {
        Self::with_leaf_key(rsa_key())
    }

    pub fn with_leaf_key(leaf_key: PKey<Private>) -> Self {
        let root_key = rsa_key();
        let root = issue("Test Root CA", &root_key, None, Profile::Ca);

        let ca_key = rsa_key();
        let ca = issue("Test Signing CA", &ca_key, Some((&root, &root_key)), Profile::Ca);

        let leaf = issue("Test Token Signing", &leaf_key, Some((&ca, &ca_key)), Profile::Signing);

        Self {
            root,
            ca,
            ca_key,
            leaf,
            leaf_key,
        }
    }

    /// The x5c order used by the service: leaf, signing CA, root
    pub fn chain(&self) -> Vec<X509> {
        vec![self.leaf.clone(), self.ca.clone(), self.root.clone()]
    }

    pub fn root_pem(&self) -> Vec<u8> {
        self.root.to_pem().unwrap()
    }
}

fn b64url(v: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(v)
}

/// JWK carrying the public half of `key` and `chain` as x5c
pub(crate) fn jwk(kid: &str, alg: &str, key: &PKey<Private>, chain: &[X509]) -> serde_json::Value {
    let x5c: Vec<String> = chain
        .iter()
        .map(|c| general_purpose::STANDARD.encode(c.to_der().unwrap()))
        .collect();

    match key.id() {
        Id::RSA => {
            let rsa = key.rsa().unwrap();
            serde_json::json!({
                "kty": "RSA",
                "alg": alg,
                "kid": kid,
                "n": b64url(&rsa.n().to_vec()),
                "e": b64url(&rsa.e().to_vec()),
                "x5c": x5c,
            })
        }
        Id::EC => {
            let ec = key.ec_key().unwrap();
            let mut ctx = BigNumContext::new().unwrap();
            let mut x = BigNum::new().unwrap();
            let mut y = BigNum::new().unwrap();
            ec.public_key()
                .affine_coordinates(ec.group(), &mut x, &mut y, &mut ctx)
                .unwrap();
            serde_json::json!({
                "kty": "EC",
                "crv": "P-256",
                "alg": alg,
                "kid": kid,
                "x": b64url(&x.to_vec_padded(32).unwrap()),
                "y": b64url(&y.to_vec_padded(32).unwrap()),
                "x5c": x5c,
            })
        }
        other => panic!("unsupported test key {}", other.as_raw()),
    }
}

pub(crate) fn jwks(keys: Vec<serde_json::Value>) -> String {
    serde_json::json!({ "keys": keys }).to_string()
}

/// Sign `claims` as a compact JWS
pub(crate) fn sign_token(
    claims: &serde_json::Value,
    kid: Option<&str>,
    alg: Algorithm,
    key: &PKey<Private>,
) -> String {
    let mut h = Header::new(alg);
    h.kid = kid.map(str::to_string);

    let k = match key.id() {
        Id::RSA => EncodingKey::from_rsa_pem(&key.rsa().unwrap().private_key_to_pem().unwrap()),
        Id::EC => EncodingKey::from_ec_pem(&key.private_key_to_pem_pkcs8().unwrap()),
        other => panic!("unsupported test key {}", other.as_raw()),
    }
    .unwrap();

    jsonwebtoken::encode(&h, claims, &k).unwrap()
}
