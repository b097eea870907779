#![deny(unsafe_code)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

//! Consensus assembly of molecular identifier groups.
//!
//! - [`phred`]: Phred scores and log-space probability math
//! - [`base_builder`]: likelihood-based calling of a single consensus column
//! - [`mig`]: raw reads grouped by UMI
//! - [`consensus`]: assembled consensus sequences and minor bases
//! - [`assembler`]: the thread-safe [`Assembler`]

pub mod assembler;
pub mod base_builder;
pub mod consensus;
pub mod mig;
pub mod phred;

pub use assembler::{Assembler, AssemblerOptions};
pub use base_builder::{ColumnCall, ConsensusBaseBuilder, DNA_BASES, base_index};
pub use consensus::{Consensus, ConsensusRead, MinorBase};
pub use mig::{Mate, Mig, Read};
pub use phred::{MAX_PHRED, MIN_PHRED, NO_CALL_BASE, PhredScore};
