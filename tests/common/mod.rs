//! Test fixture: a fake `blastn` on `PATH`, a database layout, an input genome.
//!
//! The fake aligner copies `<fixture>/canned/<target>.m8` to the `-out` path
//! when that file exists, appends the `-db` value to `<fixture>/calls.log`,
//! and exits 2 when `FAKE_BLAST_FAIL` is set.

#![allow(dead_code)]

use assert_cmd::Command;
use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FAKE_BLASTN: &str = r#"#!/bin/sh
db=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -db) db="$2"; shift 2 ;;
    -out) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "$db" >> "$FAKE_BLAST_DIR/calls.log"
if [ -n "$FAKE_BLAST_FAIL" ]; then
  echo "BLAST Database error: No alias or index file found" >&2
  exit 2
fi
name=$(basename "$db")
if [ -f "$FAKE_BLAST_DIR/canned/$name.m8" ]; then
  cp "$FAKE_BLAST_DIR/canned/$name.m8" "$out"
fi
exit 0
"#;

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fx = Self { dir };

        fs::create_dir_all(fx.bin_dir()).unwrap();
        fs::create_dir_all(fx.root().join("canned")).unwrap();
        let script = fx.bin_dir().join("blastn");
        fs::write(&script, FAKE_BLASTN).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        for target in ["hg38", "phix"] {
            fs::create_dir_all(fx.db_root().join("known-contam").join(target)).unwrap();
        }
        fs::write(fx.genome(), ">A\nACGTACGT\n>B\nGGGGCCCC\n>C\nTTTTAAAA\n").unwrap();
        fx
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root().join("bin")
    }

    pub fn db_root(&self) -> PathBuf {
        self.root().join("db")
    }

    pub fn genome(&self) -> PathBuf {
        self.root().join("genome.fna")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root().join("out")
    }

    pub fn flagged_path(&self) -> PathBuf {
        self.out_dir().join("known-contam").join("flagged_contigs")
    }

    /// Rows the fake aligner will report for `target`.
    pub fn set_hits(&self, target: &str, rows: &[String]) {
        fs::write(self.root().join("canned").join(format!("{}.m8", target)), rows.concat()).unwrap();
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.root().join("calls.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn flagged(&self) -> Vec<String> {
        let mut contigs: Vec<String> = fs::read_to_string(self.flagged_path())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        contigs.sort();
        contigs
    }

    /// The binary with the fake aligner first on `PATH` and no `IMAGEN_DB`.
    pub fn command(&self) -> Command {
        let mut paths = vec![self.bin_dir()];
        if let Some(path) = env::var_os("PATH") {
            paths.extend(env::split_paths(&path));
        }

        let mut cmd = Command::cargo_bin("known-contam").unwrap();
        cmd.env("PATH", env::join_paths(paths).unwrap())
            .env("FAKE_BLAST_DIR", self.root())
            .env_remove("FAKE_BLAST_FAIL")
            .env_remove("IMAGEN_DB")
            .env("RUST_LOG", "warn");
        cmd
    }
}

/// A qualifying-looking tabular row with the given identity, e-value and
/// query span.
pub fn hit(query: &str, pident: f64, evalue: &str, aligned: usize, qlen: usize) -> String {
    format!(
        "{q}\tref_1\t{p}\t{a}\t0\t0\t1\t{a}\t1\t{a}\t{e}\t900\t{l}\t5386\n",
        q = query,
        p = pident,
        a = aligned,
        e = evalue,
        l = qlen
    )
}
