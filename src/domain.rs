//! Domain value and id newtypes shared across the compiler.
//!
//! The interpreter's domain-value width is a single machine word; this crate
//! mirrors it as a plain `i64` rather than a tagged enum over physical
//! relation storage representations, which belongs to the IR construction
//! layer and the interpreter, not to bytecode lowering.

use std::fmt;

/// A single relational domain value (the interpreter's machine word).
pub type DomainVal = i64;

/// Dense, zero-based id of an interned symbol in the [`crate::lvm::SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym#{}", self.0)
    }
}

/// Dense, zero-based id of a relation in the [`crate::relation::RelationEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationId(pub u32);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rel#{}", self.0)
    }
}

/// Dense, zero-based id of an iterator register in the interpreter's
/// per-invocation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IterSlot(pub u32);

/// Dense, zero-based id of a profile-timer register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerSlot(pub u32);

/// Generator-internal label; resolves to a stream offset after pass 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// Index of a record in the [`crate::lvm::IoDirectiveTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoDirectiveId(pub u32);
