// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Evidence adapters backed by the Linux configfs-tsm report interface.
//!
//! A report is requested by creating an entry under the `tsm/report`
//! directory, writing the 64 bytes of report data to `inblob` and reading the
//! signed quote back from `outblob`.  The `provider` attribute tells which
//! TEE driver served the request.

use super::errors::Error;
use super::{report_data, Evidence, EvidenceAdapter, Tee};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};

const TSM_REPORT_ROOT: &str = "/sys/kernel/config/tsm/report";
const CCEL_TABLE_DATA: &str = "/sys/firmware/acpi/tables/data/CCEL";

const TDX_PROVIDER: &str = "tdx_guest";
const SNP_PROVIDER: &str = "sev_guest";

static ENTRY_SEQ: AtomicUsize = AtomicUsize::new(0);

fn unique_entry_name() -> String {
    format!(
        "trusttoken-{}-{}",
        process::id(),
        ENTRY_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Request one report from configfs-tsm, cleaning up the report entry
/// afterwards
fn tsm_report(root: &Path, entry: &str, provider: &str, inblob: &[u8]) -> Result<Vec<u8>, Error> {
    let entry = root.join(entry);

    fs::create_dir_all(&entry).map_err(|e| {
        Error::Collection(format!(
            "creating report entry {}: {e}",
            entry.display()
        ))
    })?;

    let r = read_report(&entry, provider, inblob);

    if let Err(e) = fs::remove_dir(&entry) {
        warn!("removing report entry {}: {e}", entry.display());
    }

    r
}

fn read_report(entry: &Path, provider: &str, inblob: &[u8]) -> Result<Vec<u8>, Error> {
    let p = fs::read_to_string(entry.join("provider"))
        .map_err(|e| Error::Collection(format!("reading report provider: {e}")))?;

    if p.trim() != provider {
        return Err(Error::Collection(format!(
            "report served by {}, expecting {provider}",
            p.trim()
        )));
    }

    fs::write(entry.join("inblob"), inblob)
        .map_err(|e| Error::Collection(format!("writing report data: {e}")))?;

    let outblob = fs::read(entry.join("outblob"))
        .map_err(|e| Error::Collection(format!("reading report: {e}")))?;

    if outblob.is_empty() {
        return Err(Error::Collection("empty report".to_string()));
    }

    Ok(outblob)
}

/// Intel TDX adapter: TD quote from configfs-tsm, event log from the ACPI
/// CCEL table
#[derive(Debug, Clone)]
pub struct TdxAdapter {
    tsm_root: PathBuf,
    ccel: PathBuf,
    entry: Option<String>,
}

impl Default for TdxAdapter {
    fn default() -> Self {
        Self::with_paths(TSM_REPORT_ROOT, CCEL_TABLE_DATA)
    }
}

impl TdxAdapter {
    /// Use alternate locations for the configfs-tsm report directory and the
    /// CCEL table
    pub fn with_paths<P: Into<PathBuf>, Q: Into<PathBuf>>(tsm_root: P, ccel: Q) -> Self {
        Self {
            tsm_root: tsm_root.into(),
            ccel: ccel.into(),
            entry: None,
        }
    }

    fn event_log(&self) -> Result<Vec<u8>, Error> {
        let log = fs::read(&self.ccel)
            .map_err(|e| Error::EventLog(format!("{}: {e}", self.ccel.display())))?;

        if log.is_empty() {
            return Err(Error::EventLog(format!("{} is empty", self.ccel.display())));
        }

        Ok(log)
    }
}

impl EvidenceAdapter for TdxAdapter {
    fn tee(&self) -> Tee {
        Tee::Tdx
    }

    fn collect(&self, user_data: Option<&[u8]>, event_log: bool) -> Result<Evidence, Error> {
        let rd = report_data(user_data)?;

        let entry = self.entry.clone().unwrap_or_else(unique_entry_name);
        let quote = tsm_report(&self.tsm_root, &entry, TDX_PROVIDER, &rd)?;

        debug!("collected TD quote ({} bytes)", quote.len());

        let log = if event_log {
            let l = self.event_log()?;
            debug!("collected CCEL event log ({} bytes)", l.len());
            Some(l)
        } else {
            None
        };

        Ok(Evidence::new(
            Tee::Tdx,
            quote,
            user_data.map(<[u8]>::to_vec),
            log,
        ))
    }
}

/// AMD SEV-SNP adapter: attestation report from configfs-tsm.  SNP guests do
/// not expose an event log, so asking for one fails.
#[derive(Debug, Clone)]
pub struct SnpAdapter {
    tsm_root: PathBuf,
    entry: Option<String>,
}

impl Default for SnpAdapter {
    fn default() -> Self {
        Self::with_path(TSM_REPORT_ROOT)
    }
}

impl SnpAdapter {
    pub fn with_path<P: Into<PathBuf>>(tsm_root: P) -> Self {
        Self {
            tsm_root: tsm_root.into(),
            entry: None,
        }
    }
}

impl EvidenceAdapter for SnpAdapter {
    fn tee(&self) -> Tee {
        Tee::SevSnp
    }

    fn collect(&self, user_data: Option<&[u8]>, event_log: bool) -> Result<Evidence, Error> {
        if event_log {
            return Err(Error::EventLog(
                "SEV-SNP guests do not provide an event log".to_string(),
            ));
        }

        let rd = report_data(user_data)?;

        let entry = self.entry.clone().unwrap_or_else(unique_entry_name);
        let report = tsm_report(&self.tsm_root, &entry, SNP_PROVIDER, &rd)?;

        debug!("collected SNP report ({} bytes)", report.len());

        Ok(Evidence::new(
            Tee::SevSnp,
            report,
            user_data.map(<[u8]>::to_vec),
            None,
        ))
    }
}
