//! Index Resolver
//!
//! A thin façade over an externally supplied index-analysis oracle. The
//! resolver does not itself choose indices: it normalises a node's search
//! signature and asks the oracle for the matching lexicographic index
//! position.

use crate::domain::RelationId;
use crate::error::{CompileError, Result};
use crate::relation::{IndexSignature, RelationEncoder};
use std::collections::HashMap;

/// Externally supplied index-analysis oracle.
///
/// Implementations are referentially transparent: the same relation/search
/// signature pair always yields the same answer, so the resolver may call
/// through it repeatedly without caching.
pub trait IndexAnalysis {
    /// The ordered index set chosen for `relation`.
    fn indexes_for(&self, relation: RelationId) -> &[IndexSignature];

    /// Bound/free bitmask (1 = bound) a particular IR node requires, of
    /// width `arity`. A zero signature denotes "full order" and is
    /// normalised by the resolver, not the oracle.
    fn search_signature(&self, relation: RelationId, arity: usize) -> u64;
}

/// A fixed index-set oracle backed by a plain map, used by this crate's own
/// tests and by embedders that have already computed their index sets
/// up front. Production embedders typically supply a cost-based chooser
/// instead.
#[derive(Debug, Default)]
pub struct StaticIndexAnalysis {
    indexes: HashMap<RelationId, Vec<IndexSignature>>,
    signatures: HashMap<RelationId, u64>,
}

impl StaticIndexAnalysis {
    /// Create an empty oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the index set for `relation`.
    pub fn with_indexes(mut self, relation: RelationId, indexes: Vec<IndexSignature>) -> Self {
        self.indexes.insert(relation, indexes);
        self
    }

    /// Register a fixed search signature to return for `relation`,
    /// overriding the default "full order" (0) signature.
    pub fn with_signature(mut self, relation: RelationId, signature: u64) -> Self {
        self.signatures.insert(relation, signature);
        self
    }
}

impl IndexAnalysis for StaticIndexAnalysis {
    fn indexes_for(&self, relation: RelationId) -> &[IndexSignature] {
        self.indexes.get(&relation).map(Vec::as_slice).unwrap_or(&[])
    }

    fn search_signature(&self, relation: RelationId, _arity: usize) -> u64 {
        self.signatures.get(&relation).copied().unwrap_or(0)
    }
}

/// Resolves IR operations to lexicographic index positions.
pub struct IndexResolver<'a> {
    analysis: &'a dyn IndexAnalysis,
}

impl<'a> IndexResolver<'a> {
    /// Wrap an oracle.
    pub fn new(analysis: &'a dyn IndexAnalysis) -> Self {
        IndexResolver { analysis }
    }

    /// Resolve the index position a node with the given raw search
    /// signature should use, for a relation already present in `encoder`.
    ///
    /// A zero signature is normalised to the all-ones mask of width
    /// `relation.arity` (full order). Returns
    /// [`CompileError::MissingIndex`] if the oracle's index set for the
    /// relation has no entry matching the normalised signature.
    pub fn resolve(
        &self,
        encoder: &RelationEncoder,
        relation: RelationId,
        raw_signature: u64,
    ) -> Result<usize> {
        let descriptor = encoder.lookup(relation);
        let normalised = Self::normalise(raw_signature, descriptor.arity);
        let indexes = self.analysis.indexes_for(relation);
        indexes
            .iter()
            .position(|ix| ix.signature == normalised)
            .ok_or_else(|| CompileError::MissingIndex {
                relation: descriptor.name.clone(),
                signature: normalised,
            })
    }

    /// Look up the raw search signature the oracle assigns a node over
    /// `relation`, without normalising it.
    pub fn search_signature(&self, relation: RelationId, arity: usize) -> u64 {
        self.analysis.search_signature(relation, arity)
    }

    /// Normalise a raw signature: `0` means "every column bound, full
    /// order", i.e. the all-ones mask of width `arity`.
    pub fn normalise(raw_signature: u64, arity: usize) -> u64 {
        if raw_signature == 0 {
            if arity == 0 {
                0
            } else {
                (1u64 << arity) - 1
            }
        } else {
            raw_signature
        }
    }
}
