use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use std::env;
use std::path::PathBuf;
use std::time::Instant;

use known_contam::config::{self, RunConfig, Thresholds, DB_ENV_VAR};
use known_contam::screen;

#[derive(Parser)]
#[command(name = "known-contam")]
#[command(version)]
#[command(about = "Find contigs that match a database of known contaminants")]
#[command(long_about = r#"
known-contam - flag MAG contigs that match known contaminant references

Searches the input genome with BLASTN against two reference databases
(human hg38 and phiX) and reports every contig with a qualifying hit.

DATABASE LAYOUT:
  <db>/known-contam/hg38/hg38.*    BLAST nucleotide database
  <db>/known-contam/phix/phix.*    BLAST nucleotide database

OUTPUT FILES (under <out>/known-contam/):
  hg38.m8, phix.m8             BLASTN tabular output (-outfmt '6 std qlen slen')
  flagged_contigs              One contig identifier per line
  known_contam_summary.json    Thresholds and per-database hit counts

EXAMPLES:
  known-contam genome.fna out/ -d /path/to/imagen_db -t 8
  IMAGEN_DB=/path/to/imagen_db known-contam genome.fna.gz out/ --pid 95
"#)]
struct Args {
    /// Path to input genome in FASTA format (plain or gzipped)
    #[arg(value_name = "FNA", help_heading = "Input")]
    fna: PathBuf,

    /// Output directory to store results and intermediate files
    #[arg(value_name = "OUT", help_heading = "Output")]
    out: PathBuf,

    /// Path to reference database [default: $IMAGEN_DB]
    #[arg(short = 'd', long = "db", value_name = "PATH", help_heading = "Database")]
    db: Option<PathBuf>,

    /// Minimum % identity to reference
    #[arg(long, value_name = "PERCENT", default_value = "98",
          value_parser = config::parse_percent, help_heading = "Filtering")]
    pid: f64,

    /// Maximum e-value
    #[arg(long, value_name = "FLOAT", default_value = "1e-5",
          value_parser = config::parse_evalue, help_heading = "Filtering")]
    evalue: f64,

    /// Minimum percent query coverage
    #[arg(long, value_name = "PERCENT", default_value = "25",
          value_parser = config::parse_percent, help_heading = "Filtering")]
    qcov: f64,

    /// Number of CPUs to use (0 = all available)
    #[arg(short = 't', long, value_name = "NUM", default_value = "1", help_heading = "Runtime")]
    threads: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let start_time = Instant::now();

    let thresholds = Thresholds {
        pid: args.pid,
        evalue: args.evalue,
        qcov: args.qcov,
    };

    let config = RunConfig::new(
        args.fna,
        args.out,
        args.threads,
        args.db,
        env::var_os(DB_ENV_VAR),
        thresholds,
    )?;
    debug!("Database root: {}", config.db_root.display());
    debug!("Run directory: {}", config.tmp_dir.display());

    screen::run(&config)?;

    info!("Total time: {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(())
}
