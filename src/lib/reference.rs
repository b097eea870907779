//! The reference library: named sequences that consensuses are aligned against.
//!
//! References are loaded once and shared read-only (behind `Arc`) by every stage of the
//! pipeline. Each reference carries its index in the library, which downstream per-reference
//! state (statistics, error models, haplotype partitions) uses as a key.

use crate::errors::FgmigError;
use ahash::AHashMap;
use anyhow::{Context, Result};
use log::debug;
use noodles::fasta;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A named reference sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    index: usize,
    name: String,
    sequence: Vec<u8>,
}

impl Reference {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upper-case sequence bases.
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Base at a 0-based position, if within the sequence.
    #[must_use]
    pub fn base(&self, position: usize) -> Option<u8> {
        self.sequence.get(position).copied()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An ordered collection of references with lookup by name.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    references: Vec<Arc<Reference>>,
    by_name: AHashMap<String, usize>,
}

impl ReferenceLibrary {
    /// Builds a library from `(name, sequence)` pairs, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns an error if two references share a name.
    pub fn new<I, N, S>(entries: I) -> std::result::Result<Self, FgmigError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<[u8]>,
    {
        let mut library = Self::default();
        for (name, sequence) in entries {
            library.push(name.into(), sequence.as_ref())?;
        }
        Ok(library)
    }

    fn push(&mut self, name: String, sequence: &[u8]) -> std::result::Result<(), FgmigError> {
        if self.by_name.contains_key(&name) {
            return Err(FgmigError::InvalidParameter {
                parameter: "references".to_string(),
                reason: format!("duplicate reference name '{name}'"),
            });
        }
        let index = self.references.len();
        self.by_name.insert(name.clone(), index);
        self.references.push(Arc::new(Reference {
            index,
            name,
            sequence: sequence.to_ascii_uppercase(),
        }));
        Ok(())
    }

    /// Loads every record of a FASTA file. The reference name is the first word of the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or contains duplicate names.
    pub fn from_fasta<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = fasta::io::reader::Builder
            .build_from_path(path)
            .with_context(|| format!("Failed to open FASTA: {}", path.display()))?;

        let mut library = Self::default();
        for result in reader.records() {
            let record = result.with_context(|| format!("Failed to parse FASTA: {}", path.display()))?;
            let name = std::str::from_utf8(record.name())?.to_string();
            let sequence: &[u8] = record.sequence().as_ref();
            library.push(name, sequence)?;
        }

        debug!("Loaded {} references from {}", library.len(), path.display());
        Ok(library)
    }

    /// Looks up a reference by name.
    ///
    /// # Errors
    ///
    /// Returns [`FgmigError::ReferenceNotFound`] for unknown names.
    pub fn get(&self, name: &str) -> std::result::Result<&Arc<Reference>, FgmigError> {
        self.by_name
            .get(name)
            .map(|&i| &self.references[i])
            .ok_or_else(|| FgmigError::ReferenceNotFound { ref_name: name.to_string() })
    }

    #[must_use]
    pub fn by_index(&self, index: usize) -> Option<&Arc<Reference>> {
        self.references.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Reference>> {
        self.references.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}
