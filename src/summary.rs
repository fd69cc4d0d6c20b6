//! Machine-readable record of a finished run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::blastn::Target;
use crate::config::{RunConfig, Thresholds};

pub const SUMMARY_FILE: &str = "known_contam_summary.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub target: Target,
    /// Qualifying hits reported for this target.
    pub hits: usize,
    /// Contigs not already flagged by an earlier target.
    pub new_contigs: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub finished_at: String,
    pub input: PathBuf,
    pub db_root: PathBuf,
    pub threads: usize,
    pub thresholds: Thresholds,
    pub targets: Vec<TargetSummary>,
    pub flagged_contigs: usize,
    pub flagged_path: PathBuf,
}

impl RunSummary {
    pub fn new(config: &RunConfig, targets: Vec<TargetSummary>, flagged_contigs: usize) -> Self {
        Self {
            finished_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input: config.fna.clone(),
            db_root: config.db_root.clone(),
            threads: config.threads,
            thresholds: config.thresholds,
            targets,
            flagged_contigs,
            flagged_path: config.flagged_path(),
        }
    }

    /// Writes `known_contam_summary.json` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
