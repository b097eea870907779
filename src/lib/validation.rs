//! Input validation utilities.
//!
//! Common checks for command-line parameters and input files, all reporting failures as
//! [`FgmigError`] values with the offending parameter named.

use crate::errors::{FgmigError, Result};
use fgmig_consensus::phred::MAX_PHRED;
use std::fmt::Display;
use std::path::Path;

/// Validate that a file exists
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use fgmig_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/refs.fa", "References");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(FgmigError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that a probability lies in `[0, 1]`.
///
/// # Errors
/// Returns an error if the value is outside `[0, 1]` or not a number
///
/// # Example
/// ```
/// use fgmig_lib::validation::validate_probability;
///
/// validate_probability(0.05).unwrap();
/// assert!(validate_probability(1.5).is_err());
/// ```
pub fn validate_probability(value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(FgmigError::InvalidFrequency { value, min: 0.0, max: 1.0 });
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Errors
/// Returns an error if the value is not positive
///
/// # Example
/// ```
/// use fgmig_lib::validation::validate_positive;
///
/// validate_positive(10, "min-mig-coverage").unwrap();
/// assert!(validate_positive(0, "min-mig-coverage").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: PartialOrd + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(FgmigError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Validate that a quality score (integral or mean) lies within the Phred range `0..=93`.
///
/// # Errors
/// Returns an error if the quality is negative, above 93 or NaN
///
/// # Example
/// ```
/// use fgmig_lib::validation::validate_quality_score;
///
/// validate_quality_score(30u8, "min-base-quality").unwrap();
/// validate_quality_score(25.5, "min-mean-quality").unwrap();
/// assert!(validate_quality_score(-1.0, "min-mean-quality").is_err());
/// ```
pub fn validate_quality_score<T: Into<f64> + Copy + Display>(quality: T, name: &str) -> Result<()> {
    let value: f64 = quality.into();
    if !(0.0..=f64::from(MAX_PHRED)).contains(&value) {
        return Err(FgmigError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Phred quality must be between 0 and {MAX_PHRED}, got: {quality}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_file_exists() {
        let temp_file = NamedTempFile::new().unwrap();
        validate_file_exists(temp_file.path(), "Test file").unwrap();

        let err = validate_file_exists("/nonexistent/refs.fa", "References").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("References"));
        assert!(msg.contains("does not exist"));
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(0.05, true)]
    #[case(1.0, true)]
    #[case(-0.1, false)]
    #[case(1.01, false)]
    #[case(f64::NAN, false)]
    fn test_validate_probability(#[case] value: f64, #[case] ok: bool) {
        assert_eq!(validate_probability(value).is_ok(), ok);
    }

    #[rstest]
    #[case(1.0, true)]
    #[case(0.0, false)]
    #[case(-2.0, false)]
    fn test_validate_positive(#[case] value: f64, #[case] ok: bool) {
        assert_eq!(validate_positive(value, "pseudocount").is_ok(), ok);
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(25.0, true)]
    #[case(93.0, true)]
    #[case(93.5, false)]
    #[case(-0.5, false)]
    #[case(f64::NAN, false)]
    fn test_validate_quality_score(#[case] value: f64, #[case] ok: bool) {
        assert_eq!(validate_quality_score(value, "min-mean-quality").is_ok(), ok);
    }

    #[test]
    fn test_validate_quality_score_names_parameter() {
        validate_quality_score(30u8, "min-quality").unwrap();
        let err = validate_quality_score(100u8, "min-quality").unwrap_err();
        assert!(err.to_string().contains("min-quality"));
    }
}
