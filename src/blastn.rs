//! BLASTN invocation against the contaminant reference databases.
//!
//! Databases follow a fixed layout under the database root:
//! ```text
//! <db_root>/known-contam/hg38/hg38.*
//! <db_root>/known-contam/phix/phix.*
//! ```

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{Thresholds, MODULE_DIR};
use crate::m8::OUTFMT;

/// A contaminant reference database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Human reference genome (GRCh38).
    Hg38,
    /// PhiX174 sequencing control.
    Phix,
}

impl Target {
    /// Every target, in search order.
    pub const ALL: [Target; 2] = [Target::Hg38, Target::Phix];

    pub fn name(self) -> &'static str {
        match self {
            Target::Hg38 => "hg38",
            Target::Phix => "phix",
        }
    }

    /// Directory holding this target's database files.
    pub fn db_dir(self, db_root: &Path) -> PathBuf {
        db_root.join(MODULE_DIR).join(self.name())
    }

    /// Database prefix handed to `blastn -db`.
    pub fn db_prefix(self, db_root: &Path) -> PathBuf {
        self.db_dir(db_root).join(self.name())
    }

    /// Tabular output file for this target inside the run directory.
    pub fn output_path(self, tmp_dir: &Path) -> PathBuf {
        tmp_dir.join(format!("{}.m8", self.name()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fails unless every target's database directory is present.
pub fn check_target_databases(db_root: &Path) -> Result<()> {
    for target in Target::ALL {
        let dir = target.db_dir(db_root);
        if !dir.is_dir() {
            anyhow::bail!(
                "Reference database for '{}' not found: {}",
                target,
                dir.display()
            );
        }
    }
    Ok(())
}

/// One BLASTN search of the query genome against one target.
#[derive(Debug, Clone)]
pub struct BlastnSearch {
    pub query: PathBuf,
    pub db: PathBuf,
    pub out: PathBuf,
    pub threads: usize,
    pub thresholds: Thresholds,
}

impl BlastnSearch {
    pub fn new(
        target: Target,
        query: &Path,
        db_root: &Path,
        tmp_dir: &Path,
        threads: usize,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            query: query.to_path_buf(),
            db: target.db_prefix(db_root),
            out: target.output_path(tmp_dir),
            threads,
            thresholds,
        }
    }

    /// Argument vector, excluding the program name.
    ///
    /// Only the best HSP of the best subject is reported per query.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(22);
        args.push("-query".into());
        args.push(self.query.clone().into());
        args.push("-db".into());
        args.push(self.db.clone().into());
        args.push("-out".into());
        args.push(self.out.clone().into());
        args.push("-outfmt".into());
        args.push(OUTFMT.into());
        args.push("-max_target_seqs".into());
        args.push("1".into());
        args.push("-max_hsps".into());
        args.push("1".into());
        args.push("-qcov_hsp_perc".into());
        args.push(self.thresholds.qcov.to_string().into());
        args.push("-perc_identity".into());
        args.push(self.thresholds.pid.to_string().into());
        args.push("-evalue".into());
        args.push(self.thresholds.evalue.to_string().into());
        args.push("-num_threads".into());
        args.push(self.threads.to_string().into());
        args
    }

    /// Runs the search, blocking until BLASTN exits.
    ///
    /// Any output left by an earlier run is removed first.
    pub fn run(&self, blastn: &Path) -> Result<()> {
        if self.out.exists() {
            fs::remove_file(&self.out)
                .with_context(|| format!("Failed to remove stale output: {}", self.out.display()))?;
        }

        let args = self.args();
        debug!(
            "{} {}",
            blastn.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(blastn)
            .args(&args)
            .output()
            .with_context(|| format!("Failed to run {}", blastn.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "BLASTN failed against {} (exit code: {:?}): {}",
                self.db.display(),
                output.status.code(),
                stderr.trim()
            );
        }

        Ok(())
    }
}
