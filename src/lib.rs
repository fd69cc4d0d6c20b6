//! known-contam - flag MAG contigs that match known contaminant references
//!
//! Runs BLASTN against human (hg38) and phiX databases and collects every
//! contig with a hit that meets the identity, coverage and e-value thresholds.
//!
//! # Modules
//! - `config`: argument resolution and pre-flight checks
//! - `seqio`: FASTA reading with gzip support
//! - `blastn`: reference targets and BLASTN invocation
//! - `m8`: BLAST tabular output parsing
//! - `screen`: the search / collect / write pipeline
//! - `summary`: JSON run summary

pub mod config;
pub mod seqio;
pub mod blastn;
pub mod m8;
pub mod screen;
pub mod summary;
