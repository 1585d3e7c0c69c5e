//! Loop-nest operation lowering: `Scan`, `IndexedScan`, `Choice`,
//! `IndexedChoice`, `Aggregate`, `IndexedAggregate`.

use super::cond::pack_type_mask;
use super::CodeGenerator;
use crate::domain::{Label, RelationId};
use crate::error::Result;
use crate::ir::{AggregateFunc, ColumnPattern, RamCondition, RamExpression, RamNode};
use crate::lvm::Opcode;

impl<'a> CodeGenerator<'a> {
    /// `INIT_ITER slot, relation-id` — full-index iteration over every
    /// tuple of `relation`.
    pub(super) fn emit_full_iter_init(&mut self, relation: RelationId) -> Result<u32> {
        let slot = self.new_iter_slot();
        self.emit_opcode(Opcode::IterInitFullIndex);
        self.emit_word(slot.0 as i64);
        self.emit_word(relation.0 as i64);
        Ok(slot.0)
    }

    /// `INIT_ITER slot, relation-id, index-pos, type-mask...` — range
    /// iteration restricted by `pattern`. Bound column values are emitted
    /// first, in reverse column order, and the type mask is packed exactly
    /// as for an existence check, choosing the single-word
    /// opcode whenever one word suffices.
    pub(super) fn emit_indexed_iter_init(
        &mut self,
        relation: RelationId,
        pattern: &[ColumnPattern],
    ) -> Result<u32> {
        let signature = Self::pattern_signature(pattern);
        let index_pos = self.resolver.resolve(self.encoder, relation, signature)?;

        for col in pattern.iter().rev() {
            if let Some(expr) = col {
                self.lower_expr(expr)?;
            }
        }

        let refs: Vec<&ColumnPattern> = pattern.iter().collect();
        let words = pack_type_mask(&refs, self.config.word_bits);

        let slot = self.new_iter_slot();
        let bound_opcode = if words.len() <= 1 {
            Opcode::IterInitRangeIndexOneArg
        } else {
            Opcode::IterInitRangeIndex
        };
        self.emit_opcode(bound_opcode);
        self.emit_word(slot.0 as i64);
        self.emit_word(relation.0 as i64);
        self.emit_word(index_pos as i64);
        if bound_opcode == Opcode::IterInitRangeIndex {
            self.emit_word(words.len() as i64);
        }
        for w in &words {
            self.emit_word(*w as i64);
        }
        Ok(slot.0)
    }

    fn pattern_signature(pattern: &[ColumnPattern]) -> u64 {
        pattern.iter().enumerate().fold(0u64, |mask, (i, col)| {
            if col.is_some() {
                mask | (1u64 << i)
            } else {
                mask
            }
        })
    }

    /// Offset of the loop's backward-jump target: the upcoming
    /// `IterNotAtEnd` test itself, with no separate header marker —
    /// INC/GOTO jumps straight back to the NOT_AT_END offset.
    fn loop_header(&mut self) -> usize {
        self.here()
    }

    fn close_loop(&mut self, header_goto_target: usize, slot: u32) {
        self.emit_opcode(Opcode::IterInc);
        self.emit_word(slot as i64);
        self.emit_opcode(Opcode::Goto);
        self.emit_word(header_goto_target as i64);
    }

    fn select_tuple(&mut self, slot: u32, tuple_id: u32) {
        self.emit_opcode(Opcode::IterSelect);
        self.emit_word(slot as i64);
        self.emit_word(tuple_id as i64);
    }

    pub(super) fn lower_scan(
        &mut self,
        relation: RelationId,
        tuple_id: u32,
        nested: &RamNode,
        exit_addr: Option<Label>,
    ) -> Result<()> {
        let slot = self.emit_full_iter_init(relation)?;
        let header = self.loop_header();
        self.emit_opcode(Opcode::IterNotAtEnd);
        self.emit_word(slot as i64);
        let skip_label = self.new_label();
        self.emit_opcode(Opcode::JmpIfZero);
        self.emit_placeholder_target(skip_label);
        self.select_tuple(slot, tuple_id);
        self.emit_node(nested, exit_addr)?;
        self.close_loop(header, slot);
        let after = self.here();
        self.set_label(skip_label, after);
        Ok(())
    }

    pub(super) fn lower_indexed_scan(
        &mut self,
        relation: RelationId,
        tuple_id: u32,
        pattern: &[ColumnPattern],
        nested: &RamNode,
        exit_addr: Option<Label>,
    ) -> Result<()> {
        let slot = self.emit_indexed_iter_init(relation, pattern)?;
        let header = self.loop_header();
        self.emit_opcode(Opcode::IterNotAtEnd);
        self.emit_word(slot as i64);
        let skip_label = self.new_label();
        self.emit_opcode(Opcode::JmpIfZero);
        self.emit_placeholder_target(skip_label);
        self.select_tuple(slot, tuple_id);
        self.emit_node(nested, exit_addr)?;
        self.close_loop(header, slot);
        let after = self.here();
        self.set_label(skip_label, after);
        Ok(())
    }

    /// Shared lowering for `Choice`/`IndexedChoice`: iterate, and on the
    /// first tuple satisfying `condition`, run `nested` once and stop.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn lower_choice(
        &mut self,
        relation: RelationId,
        tuple_id: u32,
        pattern: Option<&[ColumnPattern]>,
        condition: &RamCondition,
        nested: &RamNode,
        exit_addr: Option<Label>,
    ) -> Result<()> {
        let slot = match pattern {
            Some(p) => self.emit_indexed_iter_init(relation, p)?,
            None => self.emit_full_iter_init(relation)?,
        };
        let header = self.loop_header();
        self.emit_opcode(Opcode::IterNotAtEnd);
        self.emit_word(slot as i64);
        let skip_label = self.new_label();
        self.emit_opcode(Opcode::JmpIfZero);
        self.emit_placeholder_target(skip_label);
        self.select_tuple(slot, tuple_id);

        self.lower_condition(condition)?;
        let no_match_label = self.new_label();
        self.emit_opcode(Opcode::JmpIfZero);
        self.emit_placeholder_target(no_match_label);

        self.emit_node(nested, exit_addr)?;
        let done_label = self.new_label();
        self.emit_opcode(Opcode::Goto);
        self.emit_placeholder_target(done_label);

        let no_match_at = self.here();
        self.set_label(no_match_label, no_match_at);
        self.close_loop(header, slot);

        let done_at = self.here();
        self.set_label(done_label, done_at);
        let after = self.here();
        self.set_label(skip_label, after);
        Ok(())
    }

    /// Shared lowering for `Aggregate`/`IndexedAggregate`.
    ///
    /// `Count` gated by a trivially-true condition takes the fast path
    /// (`AggregateCountShortcut`, reading the iterator's cardinality
    /// directly). Every other function/condition combination takes the
    /// general accumulate-with-seed path; `Min`/`Max` seed with a sentinel
    /// and skip the downstream `nested` entirely if no row ever displaced
    /// it — a known false negative when every candidate value legitimately
    /// equals the sentinel (preserved, see DESIGN.md).
    #[allow(clippy::too_many_arguments)]
    pub(super) fn lower_aggregate(
        &mut self,
        relation: RelationId,
        scan_tuple_id: u32,
        pattern: Option<&[ColumnPattern]>,
        func: AggregateFunc,
        value: Option<&RamExpression>,
        condition: Option<&RamCondition>,
        result_tuple_id: u32,
        nested: &RamNode,
        exit_addr: Option<Label>,
    ) -> Result<()> {
        let is_trivial_gate = matches!(condition, None | Some(RamCondition::True));

        if matches!(func, AggregateFunc::Count) && is_trivial_gate {
            let slot = match pattern {
                Some(p) => self.emit_indexed_iter_init(relation, p)?,
                None => self.emit_full_iter_init(relation)?,
            };
            self.emit_opcode(Opcode::AggregateCountShortcut);
            self.emit_word(slot as i64);
            self.emit_opcode(Opcode::AggregateReturn);
            self.emit_word(result_tuple_id as i64);
            self.emit_node(nested, exit_addr)?;
            return Ok(());
        }

        let slot = match pattern {
            Some(p) => self.emit_indexed_iter_init(relation, p)?,
            None => self.emit_full_iter_init(relation)?,
        };

        self.emit_opcode(Opcode::AggregateInit);
        self.emit_word(func as i64);

        let header = self.loop_header();
        self.emit_opcode(Opcode::IterNotAtEnd);
        self.emit_word(slot as i64);
        let skip_label = self.new_label();
        self.emit_opcode(Opcode::JmpIfZero);
        self.emit_placeholder_target(skip_label);
        self.select_tuple(slot, scan_tuple_id);

        if is_trivial_gate {
            self.lower_aggregate_step(func, value)?;
        } else if let Some(cond) = condition {
            self.lower_condition(cond)?;
            let skip_row_label = self.new_label();
            self.emit_opcode(Opcode::JmpIfZero);
            self.emit_placeholder_target(skip_row_label);
            self.lower_aggregate_step(func, value)?;
            let skip_row_at = self.here();
            self.set_label(skip_row_label, skip_row_at);
        }

        self.close_loop(header, slot);
        let after_loop = self.here();
        self.set_label(skip_label, after_loop);

        self.emit_opcode(Opcode::AggregateReturn);
        self.emit_word(result_tuple_id as i64);

        if matches!(func, AggregateFunc::Min | AggregateFunc::Max) {
            // `AggregateReturn` leaves a 0/1 "matched a row" flag on the
            // operand stack in addition to writing `result_tuple_id`, so the
            // interpreter can gate `nested` without a dedicated opcode for
            // the "no matching rows" shortcut; see DESIGN.md for the
            // preserved sentinel-collision caveat.
            let no_rows_label = self.new_label();
            self.emit_opcode(Opcode::JmpIfZero);
            self.emit_placeholder_target(no_rows_label);
            self.emit_node(nested, exit_addr)?;
            let no_rows_at = self.here();
            self.set_label(no_rows_label, no_rows_at);
        } else {
            self.emit_node(nested, exit_addr)?;
        }
        Ok(())
    }

    fn lower_aggregate_step(&mut self, func: AggregateFunc, value: Option<&RamExpression>) -> Result<()> {
        match value {
            Some(expr) => self.lower_expr(expr)?,
            None => {
                self.emit_opcode(Opcode::Number);
                self.emit_word(1);
            }
        }
        self.emit_opcode(Opcode::AggregateStep);
        self.emit_word(func as i64);
        Ok(())
    }

    /// Emit a branch-target operand for `label`, resolved from the current
    /// pass's label table (see [`CodeGenerator::lookup_label`]).
    pub(super) fn emit_placeholder_target(&mut self, label: Label) {
        let offset = self.lookup_label(label);
        self.emit_word(offset as i64);
    }
}
