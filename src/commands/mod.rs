//! CLI command implementations for fgmig.
//!
//! - [`assemble`] - Assemble UMI groups of raw reads into consensus sequences
//! - [`haplotypes`] - Correct aligned consensuses and call significant haplotypes

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

pub mod assemble;
pub mod command;
pub mod common;
pub mod haplotypes;
