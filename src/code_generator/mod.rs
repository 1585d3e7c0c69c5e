//! Code Generator
//!
//! A recursive IR-walker that lowers a [`RamNode`] tree into a flat
//! [`LvmCode`] instruction stream, in two passes: pass 1
//! allocates labels and records their resolved offsets; pass 2 re-walks the
//! (deterministic) tree emitting real branch operands from the now-complete
//! label table.

mod cond;
mod expr;
mod operation;
mod statement;

use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use crate::analysis::IndexAnalysis;
use crate::analysis::IndexResolver;
use crate::config::CodegenConfig;
use crate::domain::{DomainVal, IterSlot, Label, TimerSlot};
use crate::error::Result;
use crate::ir::RamNode;
use crate::lvm::{IoDirectiveTable, LvmCode, Opcode, SymbolTable};
use crate::relation::RelationEncoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    First,
    Second,
}

#[derive(Debug, Default)]
struct Allocators {
    next_label: u32,
    next_iter_slot: u32,
    next_timer_slot: u32,
}

impl Allocators {
    /// Reset all three counters to zero. Called between pass 1 and pass 2
    /// here; the label *table* (offsets) is a separate structure and
    /// is not touched here.
    fn reset(&mut self) {
        self.next_label = 0;
        self.next_iter_slot = 0;
        self.next_timer_slot = 0;
    }

    fn new_label(&mut self) -> Label {
        let l = Label(self.next_label);
        self.next_label += 1;
        l
    }

    fn new_iter_slot(&mut self) -> IterSlot {
        let s = IterSlot(self.next_iter_slot);
        self.next_iter_slot += 1;
        s
    }

    fn new_timer_slot(&mut self) -> TimerSlot {
        let s = TimerSlot(self.next_timer_slot);
        self.next_timer_slot += 1;
        s
    }
}

/// Walks a [`RamNode`] tree and emits an [`LvmCode`] artifact.
///
/// Exit addresses are threaded through the walk as [`Label`]s rather than
/// raw offsets: entering a `Loop` or a loop-nest operation (`Scan`,
/// `Choice`, ...) allocates a fresh label and installs it as the new exit
/// address for its nested body, while a plain nested node forwards the one
/// it was given unchanged.
pub struct CodeGenerator<'a> {
    encoder: &'a RelationEncoder,
    resolver: IndexResolver<'a>,
    config: &'a CodegenConfig,
    pass: Pass,
    stream: Vec<DomainVal>,
    symbols: SymbolTable,
    io_directives: IoDirectiveTable,
    label_offsets: HashMap<Label, usize>,
    alloc: Allocators,
}

impl<'a> CodeGenerator<'a> {
    fn new(encoder: &'a RelationEncoder, analysis: &'a dyn IndexAnalysis, config: &'a CodegenConfig) -> Self {
        CodeGenerator {
            encoder,
            resolver: IndexResolver::new(analysis),
            config,
            pass: Pass::First,
            stream: Vec::new(),
            symbols: SymbolTable::new(),
            io_directives: IoDirectiveTable::new(),
            label_offsets: HashMap::new(),
            alloc: Allocators::default(),
        }
    }

    /// Compile `root` into a finished [`LvmCode`] artifact.
    #[instrument(skip_all)]
    pub fn compile(
        encoder: &'a RelationEncoder,
        analysis: &'a dyn IndexAnalysis,
        config: &'a CodegenConfig,
        root: &RamNode,
    ) -> Result<LvmCode> {
        let mut gen = CodeGenerator::new(encoder, analysis, config);

        gen.pass = Pass::First;
        gen.emit_node(root, None)?;
        let pass1_iter_slots = gen.alloc.next_iter_slot;
        let pass1_timer_slots = gen.alloc.next_timer_slot;
        let pass1_labels = gen.alloc.next_label;

        gen.alloc.reset();
        gen.stream.clear();
        gen.io_directives.clear();

        gen.pass = Pass::Second;
        gen.emit_node(root, None)?;

        if gen.alloc.next_iter_slot != pass1_iter_slots
            || gen.alloc.next_timer_slot != pass1_timer_slots
            || gen.alloc.next_label != pass1_labels
        {
            warn!(
                pass1_iter_slots,
                pass2_iter_slots = gen.alloc.next_iter_slot,
                pass1_timer_slots,
                pass2_timer_slots = gen.alloc.next_timer_slot,
                pass1_labels,
                pass2_labels = gen.alloc.next_label,
                "pass determinism law violated: allocator counts diverged between passes"
            );
        }

        gen.emit_opcode(Opcode::Stop);

        debug!(stream_len = gen.stream.len(), symbols = gen.symbols.len(), "compile finished");

        Ok(LvmCode {
            stream: gen.stream,
            symbols: gen.symbols,
            io_directives: gen.io_directives,
            iterator_slot_count: gen.alloc.next_iter_slot,
            timer_slot_count: gen.alloc.next_timer_slot,
        })
    }

    fn emit_opcode(&mut self, op: Opcode) {
        self.stream.push(op.code());
    }

    fn emit_word(&mut self, word: DomainVal) {
        self.stream.push(word);
    }

    fn here(&self) -> usize {
        self.stream.len()
    }

    fn new_label(&mut self) -> Label {
        self.alloc.new_label()
    }

    fn new_iter_slot(&mut self) -> IterSlot {
        self.alloc.new_iter_slot()
    }

    fn new_timer_slot(&mut self) -> TimerSlot {
        self.alloc.new_timer_slot()
    }

    fn set_label(&mut self, label: Label, offset: usize) {
        self.label_offsets.insert(label, offset);
    }

    /// Resolve a label to its offset. Returns `0` for a forward reference
    /// not yet set (only possible during pass 1, whose stream is
    /// discarded); always resolved by the time pass 2 reads it, because
    /// every label that pass 2 will ever request was already set during
    /// pass 1 (determinism law).
    fn lookup_label(&self, label: Label) -> usize {
        self.label_offsets.get(&label).copied().unwrap_or(0)
    }

    fn emit_node(&mut self, node: &RamNode, exit_addr: Option<Label>) -> Result<()> {
        statement::emit_node(self, node, exit_addr)
    }
}
