//! Contaminant screen: search every target, collect hit contigs, write them.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::blastn::{check_target_databases, BlastnSearch, Target};
use crate::config::{RunConfig, Thresholds, FLAGGED_FILE};
use crate::m8::M8Reader;
use crate::seqio;
use crate::summary::{RunSummary, TargetSummary, SUMMARY_FILE};

/// Unique contig identifiers, kept in the order they were first seen.
#[derive(Debug, Default, Clone)]
pub struct FlaggedContigs {
    seen: FxHashSet<String>,
    order: Vec<String>,
}

impl FlaggedContigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the contig was already flagged.
    pub fn insert(&mut self, contig: &str) -> bool {
        if self.seen.contains(contig) {
            return false;
        }
        self.seen.insert(contig.to_string());
        self.order.push(contig.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Writes one identifier per line. An empty set yields an empty file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for contig in self.iter() {
            writeln!(writer, "{}", contig)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Per-file tally from [`collect_hits`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitCounts {
    /// Rows read from the file.
    pub rows: usize,
    /// Rows meeting the thresholds.
    pub passing: usize,
    /// Contigs flagged for the first time by this file.
    pub new_contigs: usize,
}

/// Adds the query of every qualifying hit in `path` to `flagged`.
///
/// A missing file counts as zero hits.
pub fn collect_hits(
    path: &Path,
    thresholds: &Thresholds,
    flagged: &mut FlaggedContigs,
) -> Result<HitCounts> {
    let mut counts = HitCounts::default();
    if !path.exists() {
        debug!("No BLAST output at {}, treating as zero hits", path.display());
        return Ok(counts);
    }

    for hit in M8Reader::open(path)? {
        let hit = hit?;
        counts.rows += 1;
        if !hit.passes(thresholds) {
            continue;
        }
        counts.passing += 1;
        if flagged.insert(&hit.query_name) {
            counts.new_contigs += 1;
        }
    }

    if counts.passing < counts.rows {
        warn!(
            "{}: {} of {} hits fall outside the thresholds and were ignored",
            path.display(),
            counts.rows - counts.passing,
            counts.rows
        );
    }
    Ok(counts)
}

/// Returns a query path BLASTN can read, decompressing gzipped input into
/// the run directory.
pub fn prepare_query(fna: &Path, tmp_dir: &Path) -> Result<PathBuf> {
    if seqio::is_gzipped(fna)? {
        let dest = tmp_dir.join("query.fna");
        let n = seqio::decompress_fasta(fna, &dest)
            .with_context(|| format!("Failed to decompress {}", fna.display()))?;
        info!("   decompressed {} contigs to {}", n, dest.display());
        return Ok(dest);
    }

    let n = seqio::count_records(fna)
        .with_context(|| format!("Failed to read input genome {}", fna.display()))?;
    if n == 0 {
        warn!("Input genome {} contains no sequences", fna.display());
    }
    info!("   {} contigs in {}", n, fna.display());
    Ok(fna.to_path_buf())
}

/// Deletes the identifier list and summary of an earlier run in `tmp_dir`,
/// so a failed re-run cannot leave them looking current.
pub fn remove_previous_results(tmp_dir: &Path) -> Result<()> {
    for path in [tmp_dir.join(FLAGGED_FILE), tmp_dir.join(SUMMARY_FILE)] {
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stale output: {}", path.display()))?;
        }
    }
    Ok(())
}

/// Runs the full screen for one genome.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    remove_previous_results(&config.tmp_dir)?;
    check_target_databases(&config.db_root)?;
    let query = prepare_query(&config.fna, &config.tmp_dir)?;

    info!("## Searching database with BLASTN");
    for target in Target::ALL {
        info!("   {}", target);
        BlastnSearch::new(
            target,
            &query,
            &config.db_root,
            &config.tmp_dir,
            config.threads,
            config.thresholds,
        )
        .run(&config.blastn)?;
    }

    info!("## Identifying contigs with hits to db");
    let mut flagged = FlaggedContigs::new();
    let mut targets = Vec::with_capacity(Target::ALL.len());
    for target in Target::ALL {
        let counts = collect_hits(
            &target.output_path(&config.tmp_dir),
            &config.thresholds,
            &mut flagged,
        )?;
        debug!("   {}: {} hits, {} new contigs", target, counts.passing, counts.new_contigs);
        targets.push(TargetSummary {
            target,
            hits: counts.passing,
            new_contigs: counts.new_contigs,
        });
    }

    let out = config.flagged_path();
    flagged.write(&out)?;
    if flagged.is_empty() {
        info!("   no contigs flagged: {}", out.display());
    } else {
        info!("   {} flagged contigs: {}", flagged.len(), out.display());
    }

    let summary = RunSummary::new(config, targets, flagged.len());
    summary.save(&config.tmp_dir)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(query: &str, pident: f64, evalue: &str, qstart: usize, qend: usize, qlen: usize) -> String {
        format!(
            "{}\tref\t{}\t{}\t0\t0\t{}\t{}\t1\t{}\t{}\t500\t{}\t5386\n",
            query,
            pident,
            qend - qstart + 1,
            qstart,
            qend,
            qend - qstart + 1,
            evalue,
            qlen
        )
    }

    #[test]
    fn test_flagged_set_is_unique_and_ordered() {
        let mut flagged = FlaggedContigs::new();
        assert!(flagged.insert("B"));
        assert!(flagged.insert("A"));
        assert!(!flagged.insert("B"));
        assert_eq!(flagged.len(), 2);
        assert_eq!(flagged.iter().collect::<Vec<_>>(), vec!["B", "A"]);
    }

    #[test]
    fn test_missing_output_is_zero_hits() {
        let dir = tempfile::tempdir().unwrap();
        let mut flagged = FlaggedContigs::new();
        let counts = collect_hits(
            &dir.path().join("hg38.m8"),
            &Thresholds::default(),
            &mut flagged,
        )
        .unwrap();
        assert_eq!(counts, HitCounts::default());
        assert!(flagged.is_empty());
    }

    #[test]
    fn test_union_across_targets() {
        let dir = tempfile::tempdir().unwrap();
        let hg38 = dir.path().join("hg38.m8");
        let phix = dir.path().join("phix.m8");
        fs::write(&hg38, row("A", 99.0, "1e-50", 1, 500, 1000) + &row("B", 99.5, "0.0", 1, 900, 1000)).unwrap();
        fs::write(&phix, row("B", 100.0, "0.0", 1, 1000, 1000)).unwrap();

        let t = Thresholds::default();
        let mut flagged = FlaggedContigs::new();
        let c1 = collect_hits(&hg38, &t, &mut flagged).unwrap();
        let c2 = collect_hits(&phix, &t, &mut flagged).unwrap();

        assert_eq!(c1.new_contigs, 2);
        assert_eq!(c2.passing, 1);
        assert_eq!(c2.new_contigs, 0);
        assert_eq!(flagged.iter().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_rows_outside_thresholds_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hg38.m8");
        let rows = [
            row("pass", 98.0, "1e-5", 1, 250, 1000),
            row("low_pid", 97.5, "1e-30", 1, 900, 1000),
            row("high_evalue", 99.9, "0.001", 1, 900, 1000),
            row("low_qcov", 99.9, "1e-30", 1, 200, 1000),
        ]
        .concat();
        fs::write(&path, rows).unwrap();

        let mut flagged = FlaggedContigs::new();
        let counts = collect_hits(&path, &Thresholds::default(), &mut flagged).unwrap();

        assert_eq!(counts.rows, 4);
        assert_eq!(counts.passing, 1);
        assert_eq!(flagged.iter().collect::<Vec<_>>(), vec!["pass"]);
    }

    #[test]
    fn test_rounded_evalue_at_custom_threshold_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hg38.m8");
        fs::write(&path, "A\tref\t99.000\t900\t0\t0\t1\t900\t1\t900\t2e-05\t900\t1000\t5386\n").unwrap();

        let t = Thresholds { pid: 98.0, evalue: 1.6e-5, qcov: 25.0 };
        let mut flagged = FlaggedContigs::new();
        let counts = collect_hits(&path, &t, &mut flagged).unwrap();

        assert_eq!(counts.passing, 1);
        assert_eq!(flagged.iter().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn test_remove_previous_results() {
        let dir = tempfile::tempdir().unwrap();
        let flagged = dir.path().join(FLAGGED_FILE);
        let summary = dir.path().join(SUMMARY_FILE);
        let m8 = dir.path().join("hg38.m8");
        fs::write(&flagged, "old_contig\n").unwrap();
        fs::write(&summary, "{}").unwrap();
        fs::write(&m8, "").unwrap();

        remove_previous_results(dir.path()).unwrap();
        assert!(!flagged.exists());
        assert!(!summary.exists());
        assert!(m8.exists());

        remove_previous_results(dir.path()).unwrap();
    }

    #[test]
    fn test_malformed_output_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phix.m8");
        fs::write(&path, "contig_1\tphix\n").unwrap();

        let mut flagged = FlaggedContigs::new();
        assert!(collect_hits(&path, &Thresholds::default(), &mut flagged).is_err());
    }

    #[test]
    fn test_write_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flagged_contigs");

        FlaggedContigs::new().write(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        let mut flagged = FlaggedContigs::new();
        flagged.insert("contig_3");
        flagged.insert("contig_1");
        flagged.write(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "contig_3\ncontig_1\n");
    }

    #[test]
    fn test_prepare_query_passes_plain_input_through() {
        let dir = tempfile::tempdir().unwrap();
        let fna = dir.path().join("genome.fna");
        fs::write(&fna, ">c1\nACGT\n>c2\nGGCC\n").unwrap();
        assert_eq!(prepare_query(&fna, dir.path()).unwrap(), fna);
    }

    #[test]
    fn test_prepare_query_rejects_non_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let fna = dir.path().join("genome.fna");
        fs::write(&fna, "not a fasta file\n").unwrap();
        assert!(prepare_query(&fna, dir.path()).is_err());
    }
}
