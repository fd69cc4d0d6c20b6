//! BLAST Tabular (m8) Parser Module
//!
//! Parses BLASTN output written with `-outfmt '6 std qlen slen'`.
//!
//! # Column layout (14 tab-separated columns)
//! ```text
//! Col  Type    Description
//! 1    string  Query sequence id (contig name)
//! 2    string  Subject sequence id
//! 3    float   Percent identity
//! 4    int     Alignment length
//! 5    int     Mismatches
//! 6    int     Gap opens
//! 7    int     Query start (1-based)
//! 8    int     Query end
//! 9    int     Subject start
//! 10   int     Subject end
//! 11   float   E-value
//! 12   float   Bit score
//! 13   int     Query length
//! 14   int     Subject length
//! ```
//!
//! # Example Usage
//! ```no_run
//! use known_contam::m8::M8Reader;
//!
//! let reader = M8Reader::open("hg38.m8").unwrap();
//! for hit in reader {
//!     let hit = hit.unwrap();
//!     println!("{} -> {} ({:.1}% identity)", hit.query_name, hit.target_name, hit.pident);
//! }
//! ```

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::config::Thresholds;

/// Output format handed to `blastn -outfmt`.
pub const OUTFMT: &str = "6 std qlen slen";

/// Number of columns produced by [`OUTFMT`].
pub const N_COLUMNS: usize = 14;

// ============================================================================
// Hit Record
// ============================================================================

/// One row of BLAST tabular output.
#[derive(Debug, Clone, PartialEq)]
pub struct BlastHit {
    pub query_name: String,
    pub target_name: String,
    /// Percent identity (0-100).
    pub pident: f64,
    pub aln_len: usize,
    pub mismatches: usize,
    pub gap_opens: usize,
    pub query_start: usize,
    pub query_end: usize,
    pub target_start: usize,
    pub target_end: usize,
    pub evalue: f64,
    pub bitscore: f64,
    pub query_len: usize,
    pub target_len: usize,
}

impl BlastHit {
    /// Parses a hit from a tab-separated line.
    ///
    /// # Errors
    /// Returns an error if the line has fewer than 14 fields or any numeric
    /// field cannot be parsed.
    pub fn parse_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < N_COLUMNS {
            anyhow::bail!(
                "Invalid BLAST tabular line: expected {} fields, found {}",
                N_COLUMNS,
                fields.len()
            );
        }

        Ok(Self {
            query_name: fields[0].to_string(),
            target_name: fields[1].to_string(),
            pident: fields[2].trim().parse().context("Invalid percent identity")?,
            aln_len: fields[3].trim().parse().context("Invalid alignment length")?,
            mismatches: fields[4].trim().parse().context("Invalid mismatch count")?,
            gap_opens: fields[5].trim().parse().context("Invalid gap open count")?,
            query_start: fields[6].trim().parse().context("Invalid query start")?,
            query_end: fields[7].trim().parse().context("Invalid query end")?,
            target_start: fields[8].trim().parse().context("Invalid subject start")?,
            target_end: fields[9].trim().parse().context("Invalid subject end")?,
            evalue: fields[10].trim().parse().context("Invalid e-value")?,
            bitscore: fields[11].trim().parse().context("Invalid bit score")?,
            query_len: fields[12].trim().parse().context("Invalid query length")?,
            target_len: fields[13].trim().parse().context("Invalid subject length")?,
        })
    }

    /// Percentage of the query covered by this HSP.
    ///
    /// Coordinates are 1-based and inclusive. Returns 0 if `query_len` is 0.
    pub fn query_coverage(&self) -> f64 {
        if self.query_len == 0 {
            return 0.0;
        }
        let span = self.query_start.abs_diff(self.query_end) + 1;
        (span as f64 / self.query_len as f64) * 100.0
    }

    /// True when the hit meets every threshold handed to BLASTN.
    ///
    /// Identity and e-value are compared at the precision BLASTN prints
    /// them, so a hit the aligner accepted is never rejected here because
    /// its printed value was rounded past the threshold.
    pub fn passes(&self, thresholds: &Thresholds) -> bool {
        self.pident >= printed_pident(thresholds.pid)
            && self.evalue <= printed_evalue(thresholds.evalue)
            && self.query_coverage() >= thresholds.qcov
    }
}

/// Rounds a percent identity to the three decimals of the `pident` column.
pub fn printed_pident(pident: f64) -> f64 {
    format!("{:.3}", pident).parse().unwrap_or(pident)
}

/// Rounds an e-value the way BLAST's tabular writer prints it.
///
/// ```text
/// < 1e-180   0.0
/// < 9e-4     one significant digit, exponent form
/// < 0.1      %4.3f
/// < 1        %3.2f
/// < 10       %2.1f
/// otherwise  %5.0f
/// ```
pub fn printed_evalue(evalue: f64) -> f64 {
    let printed = if evalue < 1.0e-180 {
        return 0.0;
    } else if evalue < 0.0009 {
        format!("{:.0e}", evalue)
    } else if evalue < 0.1 {
        format!("{:.3}", evalue)
    } else if evalue < 1.0 {
        format!("{:.2}", evalue)
    } else if evalue < 10.0 {
        format!("{:.1}", evalue)
    } else {
        format!("{:.0}", evalue)
    };
    printed.parse().unwrap_or(evalue)
}

// ============================================================================
// Reader
// ============================================================================

/// Sequential reader for BLAST tabular files.
///
/// Errors carry the file path and 1-based line number of the bad row.
pub struct M8Reader {
    reader: BufReader<File>,
    path: PathBuf,
    line_buf: String,
    line_no: usize,
}

impl M8Reader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open BLAST output: {}", path.display()))?;
        Ok(Self {
            reader: BufReader::with_capacity(1024 * 1024, file),
            path: path.to_path_buf(),
            line_buf: String::with_capacity(256),
            line_no: 0,
        })
    }

    /// Reads the next hit, skipping blank lines and `#` comment lines.
    pub fn read_next(&mut self) -> Result<Option<BlastHit>> {
        loop {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.line_buf.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let hit = BlastHit::parse_line(line).with_context(|| {
                format!(
                    "Unexpected BLAST output format at {}:{}",
                    self.path.display(),
                    self.line_no
                )
            })?;
            return Ok(Some(hit));
        }
    }
}

impl Iterator for M8Reader {
    type Item = Result<BlastHit>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(hit)) => Some(Ok(hit)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
