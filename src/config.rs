//! Run configuration
//!
//! Resolves command-line values into an immutable [`RunConfig`]. All
//! validation that must happen before BLASTN is launched lives here, in the
//! order it is reported: input genome, aligner executable, database root.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `-d` is not given.
pub const DB_ENV_VAR: &str = "IMAGEN_DB";

/// Name of the run directory under `<out>` and of the database subtree.
pub const MODULE_DIR: &str = "known-contam";

/// Executable the searches are run with.
pub const BLASTN: &str = "blastn";

/// Identifier list written into the run directory.
pub const FLAGGED_FILE: &str = "flagged_contigs";

/// Hit acceptance thresholds, passed straight through to BLASTN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum percent identity.
    pub pid: f64,
    /// Maximum e-value.
    pub evalue: f64,
    /// Minimum percent query coverage.
    pub qcov: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pid: 98.0,
            evalue: 1e-5,
            qcov: 25.0,
        }
    }
}

/// Parses a percentage in `0..=100` (used for `--pid` and `--qcov`).
pub fn parse_percent(s: &str) -> Result<f64, String> {
    let val: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !(0.0..=100.0).contains(&val) {
        Err(format!("Percentage must be between 0 and 100, got {}", val))
    } else {
        Ok(val)
    }
}

/// Parses a strictly positive, finite e-value.
pub fn parse_evalue(s: &str) -> Result<f64, String> {
    let val: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !val.is_finite() || val <= 0.0 {
        Err(format!("E-value must be a positive number, got {}", s))
    } else {
        Ok(val)
    }
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Input genome as given on the command line.
    pub fna: PathBuf,
    /// `<out>/known-contam`; every file this run writes goes here.
    pub tmp_dir: PathBuf,
    pub db_root: PathBuf,
    pub blastn: PathBuf,
    pub threads: usize,
    pub thresholds: Thresholds,
}

impl RunConfig {
    /// Validates inputs and creates the run directory.
    ///
    /// `env_db` is the value of [`DB_ENV_VAR`], passed in rather than read
    /// here so that the precedence rule is testable.
    ///
    /// # Errors
    /// Fails, before anything is written, when the input genome is missing,
    /// `blastn` is not on `PATH`, or no usable database root is found.
    pub fn new(
        fna: PathBuf,
        out_dir: PathBuf,
        threads: usize,
        db_flag: Option<PathBuf>,
        env_db: Option<OsString>,
        thresholds: Thresholds,
    ) -> Result<Self> {
        check_input(&fna)?;
        let blastn = find_executable(BLASTN)?;
        debug!("Found {}: {}", BLASTN, blastn.display());

        let db_root = resolve_db_root(db_flag, env_db)?;
        check_database(&db_root)?;

        let tmp_dir = out_dir.join(MODULE_DIR);
        fs::create_dir_all(&tmp_dir)
            .with_context(|| format!("Failed to create output directory: {}", tmp_dir.display()))?;

        Ok(Self {
            fna,
            tmp_dir,
            db_root,
            blastn,
            threads: resolve_threads(threads),
            thresholds,
        })
    }

    /// Path of the final identifier list.
    pub fn flagged_path(&self) -> PathBuf {
        self.tmp_dir.join(FLAGGED_FILE)
    }
}

/// Fails if the input genome does not exist or is not a regular file.
pub fn check_input(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Input file does not exist: {}", path.display());
    }
    if !path.is_file() {
        anyhow::bail!("Input path is not a file: {}", path.display());
    }
    Ok(())
}

/// Picks the database root: `-d` first, then the environment variable.
///
/// An empty environment value counts as unset.
pub fn resolve_db_root(db_flag: Option<PathBuf>, env_db: Option<OsString>) -> Result<PathBuf> {
    if let Some(path) = db_flag {
        return Ok(path);
    }
    match env_db {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => anyhow::bail!(
            "No reference database specified.\n\
             Use -d <PATH> or set the {} environment variable.",
            DB_ENV_VAR
        ),
    }
}

/// Fails if the database root is not an existing directory.
pub fn check_database(db_root: &Path) -> Result<()> {
    if !db_root.is_dir() {
        anyhow::bail!("Database directory not found: {}", db_root.display());
    }
    Ok(())
}

/// `0` means "all available CPUs".
pub fn resolve_threads(threads: usize) -> usize {
    if threads == 0 {
        num_cpus::get()
    } else {
        threads
    }
}

/// Locates an executable on `PATH`.
pub fn find_executable(name: &str) -> Result<PathBuf> {
    env::var_os("PATH")
        .and_then(|paths| find_in_path(name, &paths))
        .ok_or_else(|| {
            anyhow::anyhow!("{} not found in PATH. Please install it or add it to your PATH.", name)
        })
}

/// First entry of a `PATH`-style list holding an executable file `name`.
pub fn find_in_path(name: &str, paths: &OsStr) -> Option<PathBuf> {
    env::split_paths(paths)
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
