//! Relation Encoder
//!
//! Interns every relation referenced anywhere in the program into a dense
//! integer id, and records, per relation, its arity, attribute-type
//! qualifiers, storage kind and selected index set.

use std::collections::HashMap;

use crate::domain::RelationId;

/// A column's declared attribute kind, sufficient to pack the existence-check
/// type mask; the full upstream type system is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// An interned string (symbol table reference).
    Symbol,
    /// A numeric domain value.
    Number,
    /// A packed sub-record reference.
    Record,
}

/// Physical storage representation selected for a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// General-purpose B-tree-backed relation.
    Default,
    /// Ordered-tree relation (supports range queries on a fixed order).
    OrderedTree,
    /// Trie-backed relation.
    Trie,
    /// Equivalence-class relation (used for e.g. union-find style IDBs).
    Equivalence,
    /// Wide relations bypass per-column indices entirely.
    Indirect,
}

/// The IR's declared representation request, prior to the arity-threshold
/// override that may force [`StorageKind::Indirect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredRepresentation {
    /// No particular representation requested; falls back to `Default`.
    Default,
    /// Ordered-tree.
    OrderedTree,
    /// Trie.
    Trie,
    /// Equivalence-class.
    Equivalence,
}

/// A lexicographic index: an ordering of column indices the relation
/// maintains a secondary index for, plus the search signature it was
/// chosen to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSignature {
    /// Bound/free bitmask this index was built to serve (bit i = column i
    /// is bound). A fully-bound mask of width `arity` denotes "full order".
    pub signature: u64,
    /// Column order the index iterates in.
    pub order: Vec<usize>,
}

/// Immutable record describing one relation, owned by the
/// [`RelationEncoder`]; the emitted bytecode references only ids.
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    /// Dense id assigned at intern time.
    pub id: RelationId,
    /// Declared name; unique within the encoder.
    pub name: String,
    /// Number of columns.
    pub arity: usize,
    /// Per-column attribute-type qualifiers (length == arity).
    pub attr_types: Vec<AttributeType>,
    /// The relation's full index set, in declaration order. Position within
    /// this vector is the "lexicographic index position" used as an opcode
    /// operand.
    pub index_set: Vec<IndexSignature>,
    /// Selected physical storage representation.
    pub storage: StorageKind,
}

/// A relation declaration as presented by the upstream IR/analysis layer,
/// before interning.
#[derive(Debug, Clone)]
pub struct RelationDeclaration {
    /// Declared name; must be unique within a single program.
    pub name: String,
    /// Number of columns.
    pub arity: usize,
    /// Per-column attribute-type qualifiers (length == arity).
    pub attr_types: Vec<AttributeType>,
    /// Index set as chosen by the upstream index-analysis oracle.
    pub index_set: Vec<IndexSignature>,
    /// Representation requested by the IR, before the arity-threshold
    /// override.
    pub representation: DeclaredRepresentation,
}

/// Interns relations into dense ids and resolves their storage kind.
///
/// Construction pre-seeds every relation declared in the IR so that ids are
/// stable and independent of the order in which the code generator
/// discovers references.
#[derive(Debug, Default)]
pub struct RelationEncoder {
    descriptors: Vec<RelationDescriptor>,
    by_name: HashMap<String, RelationId>,
    indirect_arity_threshold: usize,
}

impl RelationEncoder {
    /// Create an encoder with the given indirect-storage arity threshold
    /// and pre-intern every declared relation.
    pub fn new(declarations: impl IntoIterator<Item = RelationDeclaration>, indirect_arity_threshold: usize) -> Self {
        let mut encoder = RelationEncoder {
            descriptors: Vec::new(),
            by_name: HashMap::new(),
            indirect_arity_threshold,
        };
        for decl in declarations {
            encoder.intern(decl);
        }
        encoder
    }

    fn select_storage_kind(&self, arity: usize, requested: DeclaredRepresentation) -> StorageKind {
        if arity > self.indirect_arity_threshold {
            return StorageKind::Indirect;
        }
        match requested {
            DeclaredRepresentation::Default => StorageKind::Default,
            DeclaredRepresentation::OrderedTree => StorageKind::OrderedTree,
            DeclaredRepresentation::Trie => StorageKind::Trie,
            DeclaredRepresentation::Equivalence => StorageKind::Equivalence,
        }
    }

    /// Intern a relation, returning its dense id. Idempotent by name: a
    /// second call with the same name returns the existing id and does not
    /// grow the descriptor vector.
    pub fn intern(&mut self, decl: RelationDeclaration) -> RelationId {
        if let Some(&id) = self.by_name.get(&decl.name) {
            return id;
        }
        let id = RelationId(self.descriptors.len() as u32);
        let storage = self.select_storage_kind(decl.arity, decl.representation);
        self.descriptors.push(RelationDescriptor {
            id,
            name: decl.name.clone(),
            arity: decl.arity,
            attr_types: decl.attr_types,
            index_set: decl.index_set,
            storage,
        });
        self.by_name.insert(decl.name, id);
        id
    }

    /// Look up a relation's descriptor by id.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this encoder — an id arriving
    /// from anywhere else is an internal invariant violation, not a
    /// recoverable compile error.
    pub fn lookup(&self, id: RelationId) -> &RelationDescriptor {
        &self.descriptors[id.0 as usize]
    }

    /// Look up a relation's id by name, if it has been interned.
    pub fn id_for_name(&self, name: &str) -> Option<RelationId> {
        self.by_name.get(name).copied()
    }

    /// Number of distinct relations interned so far.
    pub fn size(&self) -> usize {
        self.descriptors.len()
    }

    /// Iterate all descriptors in id order.
    pub fn descriptors(&self) -> &[RelationDescriptor] {
        &self.descriptors
    }
}
