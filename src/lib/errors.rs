//! Typed errors for fgmig library operations.

use thiserror::Error;

/// Result type alias for fgmig operations
pub type Result<T> = std::result::Result<T, FgmigError>;

/// Error type for fgmig operations
#[derive(Error, Debug)]
pub enum FgmigError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// A probability or frequency outside its valid range
    #[error("Invalid frequency threshold: {value} (must be between {min} and {max})")]
    InvalidFrequency {
        /// The invalid frequency value
        value: f64,
        /// Minimum valid value
        min: f64,
        /// Maximum valid value
        max: f64,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "FASTA", "aligned consensus TSV")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A consensus names a reference that is not in the library
    #[error("Reference sequence '{ref_name}' not found in the reference library")]
    ReferenceNotFound {
        /// The reference sequence name
        ref_name: String,
    },

    /// A mutation code could not be parsed or does not fit its reference
    #[error("Invalid mutation '{code}': {reason}")]
    InvalidMutation {
        /// The offending mutation code
        code: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Two distinct haplotypes of one reference have no mutation differences
    #[error(
        "Haplotypes {parent} and {child} of reference '{reference}' are distinct but have no \
         differing mutations"
    )]
    IndistinguishableHaplotypes {
        /// Reference both haplotypes belong to
        reference: String,
        /// Signature of the parent haplotype
        parent: String,
        /// Signature of the child haplotype
        child: String,
    },
}
