// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use std::error::Error;
use std::fs;
use std::process;
use trusttoken::client::{self, Connector, RequestId, TokenRequest, TokenResponse};
use trusttoken::config::Config;
use trusttoken::evidence::Tee;
use trusttoken::store::{fetch_signing_keys, MemoSigningKeyStore, TrustedRoot};
use trusttoken::token::{VerifiedClaims, Verifier};

#[derive(Parser)]
#[command(name = "trusttoken")]
enum TrustTokenCli {
    Token(TokenArgs),
    Verify(VerifyArgs),
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Collect evidence from this TEE and exchange it for a signed \
    attestation token")]
struct TokenArgs {
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// User data to bind to the evidence, base64 encoded
    #[arg(short, long)]
    user_data: Option<String>,

    /// PEM public key file whose DER encoding is bound to the evidence,
    /// unless --user-data is given
    #[arg(short = 'f', long)]
    pub_path: Option<String>,

    /// Comma separated list of policy ids
    #[arg(short, long, default_value = "")]
    policy_ids: String,

    #[arg(short, long)]
    request_id: Option<String>,

    /// Do not attach the TDX event log
    #[arg(long)]
    no_eventlog: bool,

    /// TEE to collect evidence from (tdx, sev-snp), detected when omitted
    #[arg(long)]
    tee: Option<Tee>,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Verify an attestation token against the service signing keys \
    and a trusted root certificate")]
struct VerifyArgs {
    #[arg(short, long, default_value = "config.json")]
    config: String,

    #[arg(short, long, default_value = "token.jwt")]
    token: String,

    #[arg(long, default_value = "root.pem")]
    root: String,

    /// Use the signing keys in this JWKS file instead of fetching them
    #[arg(long)]
    jwks: Option<String>,
}

fn main() {
    env_logger::init();

    let r = match TrustTokenCli::parse() {
        TrustTokenCli::Token(args) => match token(&args) {
            Ok(rsp) => {
                println!("Trace Id: {}", rsp.trace_id);
                if let Some(rid) = rsp.request_id {
                    println!("Request Id: {rid}");
                }
                println!("{}", rsp.token);
                Ok(())
            }
            Err(e) => {
                if let Some(tid) = e
                    .downcast_ref::<client::Error>()
                    .and_then(client::Error::trace_id)
                {
                    println!("Trace Id: {tid}");
                }
                Err(format!("token collection failed: {e}"))
            }
        },

        TrustTokenCli::Verify(args) => match verify(&args) {
            Ok(claims) => match serde_json::to_string_pretty(&claims) {
                Ok(j) => {
                    println!("{j}");
                    Ok(())
                }
                Err(e) => Err(format!("printing claims failed: {e}")),
            },
            Err(e) => Err(format!("verification failed: {e}")),
        },
    };

    if let Err(e) = r {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn user_data(args: &TokenArgs) -> Result<Option<Vec<u8>>, Box<dyn Error>> {
    if let Some(b64) = &args.user_data {
        return Ok(Some(client::user_data_from_base64(b64)?));
    }

    if let Some(path) = &args.pub_path {
        let pem = fs::read(path)?;
        return Ok(Some(client::user_data_from_public_key_pem(&pem)?));
    }

    Ok(None)
}

fn token(args: &TokenArgs) -> Result<TokenResponse, Box<dyn Error>> {
    let cfg = Config::load_json(&args.config)?;

    let user_data = user_data(args)?;
    let policy_ids = client::parse_policy_ids(&args.policy_ids)?;
    let request_id = match args.request_id.as_deref() {
        None | Some("") => None,
        Some(s) => Some(RequestId::parse(s)?),
    };

    let tee = match args.tee {
        Some(t) => t,
        None => Tee::detect().ok_or("no supported TEE found")?,
    };

    // only TDX guests expose an event log
    let event_log = tee == Tee::Tdx && !args.no_eventlog;

    let evidence = tee.adapter().collect(user_data.as_deref(), event_log)?;

    let req = TokenRequest::new(evidence, policy_ids, request_id);

    Ok(Connector::new(&cfg)?.collect_token(&req)?)
}

fn verify(args: &VerifyArgs) -> Result<VerifiedClaims, Box<dyn Error>> {
    let root = TrustedRoot::from_pem_file(&args.root)?;

    let keys = match &args.jwks {
        Some(path) => MemoSigningKeyStore::from_json(&fs::read_to_string(path)?)?,
        None => fetch_signing_keys(&Config::load_json(&args.config)?)?,
    };

    let token = fs::read_to_string(&args.token)?;

    Ok(Verifier::new(&root).verify(token.trim(), &keys)?)
}
