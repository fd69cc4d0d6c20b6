//! Sequence I/O Module
//!
//! FASTA reading for the input genome, with transparent gzip support.
//!
//! BLASTN only accepts uncompressed queries, so compressed genomes are
//! decompressed into the run directory with [`decompress_fasta`] before the
//! search starts.
//!
//! # Examples
//! ```no_run
//! use known_contam::seqio::FastaFile;
//!
//! let mut reader = FastaFile::open("genome.fna.gz").unwrap();
//! while let Some(record) = reader.read_next().unwrap() {
//!     println!("{}: {} bp", record.name, record.seq.len());
//! }
//! ```

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ============================================================================
// FASTA Format
// ============================================================================

/// A FASTA record containing sequence name and nucleotide sequence.
#[derive(Debug, Clone)]
pub struct FastaRecord {
    /// Sequence identifier (text after '>' up to first whitespace).
    pub name: String,
    /// Nucleotide sequence, concatenated from all sequence lines.
    pub seq: String,
}

/// Sequential FASTA reader over any byte source.
///
/// Handles multi-line sequences and strips trailing whitespace.
pub struct FastaReader<R: Read> {
    reader: BufReader<R>,
    line_buf: String,
    current_name: Option<String>,
}

impl<R: Read> FastaReader<R> {
    /// Wraps a reader and consumes the first header line.
    ///
    /// Leading blank lines are skipped. Anything else before the first
    /// header is an error, since BLASTN would reject the file too.
    pub fn new(inner: R) -> Result<Self> {
        let mut reader = Self {
            reader: BufReader::with_capacity(1024 * 1024, inner),
            line_buf: String::with_capacity(256),
            current_name: None,
        };

        loop {
            reader.line_buf.clear();
            if reader.reader.read_line(&mut reader.line_buf)? == 0 {
                return Ok(reader);
            }
            if reader.line_buf.trim().is_empty() {
                continue;
            }
            if !reader.line_buf.starts_with('>') {
                let found: String = reader.line_buf.trim_end().chars().take(50).collect();
                anyhow::bail!("Invalid FASTA: first line must start with '>', found: {}", found);
            }
            reader.current_name = Some(header_name(&reader.line_buf));
            return Ok(reader);
        }
    }

    /// Reads the next FASTA record.
    ///
    /// # Returns
    /// - `Ok(Some(record))` - Successfully read a record
    /// - `Ok(None)` - End of file reached
    /// - `Err(e)` - I/O error occurred
    pub fn read_next(&mut self) -> Result<Option<FastaRecord>> {
        let name = match self.current_name.take() {
            Some(n) => n,
            None => return Ok(None),
        };

        let mut seq = String::with_capacity(10000);

        loop {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                break;
            }

            if self.line_buf.starts_with('>') {
                self.current_name = Some(header_name(&self.line_buf));
                break;
            }
            seq.push_str(self.line_buf.trim_end());
        }

        Ok(Some(FastaRecord { name, seq }))
    }
}

fn header_name(line: &str) -> String {
    line[1..].split_whitespace().next().unwrap_or("").to_string()
}

/// Auto-detecting FASTA file reader.
///
/// Compression is detected from the gzip magic bytes rather than the file
/// extension, so `genome.fna` that is secretly gzipped still reads.
pub enum FastaFile {
    /// Plain text FASTA file.
    Plain(FastaReader<File>),
    /// Gzip-compressed FASTA file.
    Gzipped(FastaReader<MultiGzDecoder<File>>),
}

impl FastaFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open FASTA: {}", path.display()))?;

        let reader = if is_gzipped(path)? {
            FastaFile::Gzipped(FastaReader::new(MultiGzDecoder::new(file))?)
        } else {
            FastaFile::Plain(FastaReader::new(file)?)
        };
        Ok(reader)
    }

    pub fn read_next(&mut self) -> Result<Option<FastaRecord>> {
        match self {
            FastaFile::Plain(r) => r.read_next(),
            FastaFile::Gzipped(r) => r.read_next(),
        }
    }
}

/// Returns true when the file starts with the gzip magic number.
pub fn is_gzipped(path: &Path) -> Result<bool> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    Ok(n == 2 && magic == GZIP_MAGIC)
}

/// Counts records in a FASTA file (plain or gzipped).
pub fn count_records(path: &Path) -> Result<usize> {
    let mut reader = FastaFile::open(path)?;
    let mut n = 0;
    while reader.read_next()?.is_some() {
        n += 1;
    }
    Ok(n)
}

/// Decompresses a FASTA file into `dest`, one sequence line per record.
///
/// Returns the number of records written.
pub fn decompress_fasta(src: &Path, dest: &Path) -> Result<usize> {
    let mut reader = FastaFile::open(src)?;
    let mut writer = BufWriter::new(
        File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?,
    );

    let mut n = 0;
    while let Some(record) = reader.read_next()? {
        writeln!(writer, ">{}", record.name)?;
        writeln!(writer, "{}", record.seq)?;
        n += 1;
    }
    writer.flush()?;
    Ok(n)
}
