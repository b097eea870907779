//! Quality filters applied to called variants.

use super::Variant;
use crate::errors::{FgmigError, Result};
use std::fmt;

/// Identifier written to the filter column when every filter passes.
pub const PASS: &str = "PASS";

/// A single variant filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantFilter {
    /// Fails variants at positions covered by fewer than `threshold` consensuses.
    Coverage { threshold: u64 },
    /// Fails variants seen in a single consensus unless their frequency is at least
    /// `1 / frequency_threshold`.
    Singleton { frequency_threshold: u64 },
}

impl VariantFilter {
    /// Whether the variant passes this filter.
    #[must_use]
    pub fn evaluate(&self, variant: &Variant) -> bool {
        match *self {
            Self::Coverage { threshold } => variant.depth >= threshold,
            Self::Singleton { frequency_threshold } => {
                variant.count != 1 || variant.count.saturating_mul(frequency_threshold) >= variant.depth
            }
        }
    }

    /// Short id written to the filter column, e.g. `c100`.
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            Self::Coverage { threshold } => format!("c{threshold}"),
            Self::Singleton { frequency_threshold } => format!("si{frequency_threshold}"),
        }
    }

    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Coverage { threshold } => format!("Coverage below {threshold}"),
            Self::Singleton { frequency_threshold } => {
                format!("Singleton, frequency below {frequency_threshold}")
            }
        }
    }
}

impl fmt::Display for VariantFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id(), self.description())
    }
}

/// Thresholds for the standard filter set.
#[derive(Debug, Clone)]
pub struct VariantFilterOptions {
    pub coverage_threshold: u64,
    pub singleton_frequency_threshold: u64,
}

impl Default for VariantFilterOptions {
    fn default() -> Self {
        Self { coverage_threshold: 100, singleton_frequency_threshold: 10_000 }
    }
}

impl VariantFilterOptions {
    /// # Errors
    ///
    /// Returns an error if the singleton frequency threshold is zero.
    pub fn validate(&self) -> Result<()> {
        if self.singleton_frequency_threshold == 0 {
            return Err(FgmigError::InvalidParameter {
                parameter: "singleton-frequency-threshold".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// A conjunction of filters.
#[derive(Debug, Clone, Default)]
pub struct VariantFilterSet {
    filters: Vec<VariantFilter>,
}

impl VariantFilterSet {
    #[must_use]
    pub fn new(filters: Vec<VariantFilter>) -> Self {
        Self { filters }
    }

    #[must_use]
    pub fn filters(&self) -> &[VariantFilter] {
        &self.filters
    }

    /// Filters the variant fails, in configuration order.
    #[must_use]
    pub fn failed(&self, variant: &Variant) -> Vec<&VariantFilter> {
        self.filters.iter().filter(|f| !f.evaluate(variant)).collect()
    }

    #[must_use]
    pub fn passes(&self, variant: &Variant) -> bool {
        self.filters.iter().all(|f| f.evaluate(variant))
    }

    /// `PASS`, or the ids of every failed filter joined by `;`.
    #[must_use]
    pub fn annotate(&self, variant: &Variant) -> String {
        let failed = self.failed(variant);
        if failed.is_empty() {
            PASS.to_string()
        } else {
            failed.iter().map(|f| f.id()).collect::<Vec<_>>().join(";")
        }
    }
}

impl From<&VariantFilterOptions> for VariantFilterSet {
    fn from(options: &VariantFilterOptions) -> Self {
        Self::new(vec![
            VariantFilter::Coverage { threshold: options.coverage_threshold },
            VariantFilter::Singleton { frequency_threshold: options.singleton_frequency_threshold },
        ])
    }
}
