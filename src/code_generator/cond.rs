//! Condition lowering, including the existence-check family.

use super::CodeGenerator;
use crate::domain::RelationId;
use crate::error::Result;
use crate::ir::{ColumnPattern, CompareOp, RamCondition};
use crate::lvm::Opcode;

fn compare_opcode(op: CompareOp) -> Opcode {
    match op {
        CompareOp::Eq => Opcode::Eq,
        CompareOp::Ne => Opcode::Ne,
        CompareOp::Lt => Opcode::Lt,
        CompareOp::Le => Opcode::Le,
        CompareOp::Gt => Opcode::Gt,
        CompareOp::Ge => Opcode::Ge,
        CompareOp::Match => Opcode::Match,
        CompareOp::NotMatch => Opcode::NotMatch,
        CompareOp::StrContains => Opcode::StrContains,
        CompareOp::StrNotContains => Opcode::StrNotContains,
    }
}

/// Pack one bit per pattern column (1 = bound) into `ceil(n / word_bits)`
/// words, least-significant word first.
pub(super) fn pack_type_mask(pattern: &[&ColumnPattern], word_bits: u32) -> Vec<u64> {
    let word_bits = word_bits as usize;
    let num_words = pattern.len().div_ceil(word_bits).max(1);
    let mut words = vec![0u64; num_words];
    for (i, col) in pattern.iter().enumerate() {
        if col.is_some() {
            words[i / word_bits] |= 1u64 << (i % word_bits);
        }
    }
    words
}

/// Bound/free bitmask of the full (pre-provenance-adjustment) pattern,
/// used to resolve the index position.
fn pattern_signature(pattern: &[ColumnPattern]) -> u64 {
    pattern.iter().enumerate().fold(0u64, |mask, (i, col)| {
        if col.is_some() {
            mask | (1u64 << i)
        } else {
            mask
        }
    })
}

/// The column range an existence check actually packs/tests.
///
/// The provenance variant is specified to drop the trailing two provenance
/// columns from the mask. This implementation additionally treats column 0
/// as dropped in that same branch — a deliberately preserved off-by-one
/// (see DESIGN.md), not a fix.
fn effective_range(arity: usize, provenance: bool) -> std::ops::Range<usize> {
    if provenance {
        let end = arity.saturating_sub(2);
        let start = end.min(1);
        start..end
    } else {
        0..arity
    }
}

impl<'a> CodeGenerator<'a> {
    pub(super) fn lower_condition(&mut self, cond: &RamCondition) -> Result<()> {
        match cond {
            RamCondition::True => self.emit_opcode(Opcode::True),
            RamCondition::False => self.emit_opcode(Opcode::False),
            RamCondition::Conjunction(a, b) => {
                self.lower_condition(a)?;
                self.lower_condition(b)?;
                self.emit_opcode(Opcode::And);
            }
            RamCondition::Negation(a) => {
                self.lower_condition(a)?;
                self.emit_opcode(Opcode::Not);
            }
            RamCondition::Constraint(op, lhs, rhs) => {
                self.lower_expr(lhs)?;
                self.lower_expr(rhs)?;
                self.emit_opcode(compare_opcode(*op));
            }
            RamCondition::Emptiness(relation) => {
                self.emit_opcode(Opcode::Emptiness);
                self.emit_word(relation.0 as i64);
            }
            RamCondition::Contains(relation, values) => {
                for v in values.iter().rev() {
                    self.lower_expr(v)?;
                }
                self.emit_opcode(Opcode::Contains);
                self.emit_word(relation.0 as i64);
                self.emit_word(values.len() as i64);
            }
            RamCondition::Existence { relation, pattern, provenance } => {
                self.lower_existence(*relation, pattern, *provenance)?;
            }
        }
        Ok(())
    }

    /// Three-way branch on how many columns of the effective pattern are
    /// bound:
    /// - all free  -> negated emptiness check, no existence opcode at all.
    /// - all bound -> `Contains`, no type mask.
    /// - mixed     -> `ExistenceCheck[OneArg]` with a resolved index
    ///   position and a packed type mask.
    fn lower_existence(&mut self, relation: RelationId, pattern: &[ColumnPattern], provenance: bool) -> Result<()> {
        let range = effective_range(pattern.len(), provenance);
        let effective: Vec<&ColumnPattern> = pattern[range].iter().collect();

        if effective.iter().all(|c| c.is_none()) {
            self.emit_opcode(Opcode::Emptiness);
            self.emit_word(relation.0 as i64);
            self.emit_opcode(Opcode::Not);
            return Ok(());
        }

        if effective.iter().all(|c| c.is_some()) {
            for col in effective.iter().rev() {
                self.lower_expr(col.as_ref().expect("all-bound branch"))?;
            }
            self.emit_opcode(Opcode::Contains);
            self.emit_word(relation.0 as i64);
            self.emit_word(effective.len() as i64);
            return Ok(());
        }

        for col in effective.iter().rev() {
            if let Some(expr) = col {
                self.lower_expr(expr)?;
            }
        }

        let signature = pattern_signature(pattern);
        let index_pos = self.resolver.resolve(self.encoder, relation, signature)?;
        let words = pack_type_mask(&effective, self.config.word_bits);
        let opcode = if words.len() <= 1 {
            Opcode::ExistenceCheckOneArg
        } else {
            Opcode::ExistenceCheck
        };
        self.emit_opcode(opcode);
        self.emit_word(relation.0 as i64);
        self.emit_word(index_pos as i64);
        if opcode == Opcode::ExistenceCheck {
            // Multi-word masks are self-describing; the one-word form
            // never needs a count.
            self.emit_word(words.len() as i64);
        }
        for w in &words {
            self.emit_word(*w as i64);
        }
        Ok(())
    }
}
