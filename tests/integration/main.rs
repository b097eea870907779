//! Integration tests for the fgmig binary.
//!
//! These tests run the actual `fgmig` commands on small TSV and FASTA inputs written to a
//! temporary directory and check the files they produce.

mod helpers;
mod test_assemble_command;
mod test_error_paths;
mod test_haplotypes_command;
