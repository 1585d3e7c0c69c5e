//! Top-level statement dispatch.

use super::CodeGenerator;
use crate::domain::Label;
use crate::error::{CompileError, Result};
use crate::ir::RamNode;
use crate::lvm::{IoDirectiveRecord, Opcode};

/// Walk one IR node, emitting its lowering. `exit_addr` is the label a
/// nested `Exit`/`Break` jumps to; `None` outside any loop.
pub(super) fn emit_node(gen: &mut CodeGenerator, node: &RamNode, exit_addr: Option<Label>) -> Result<()> {
    match node {
        RamNode::Sequence(children) => {
            for child in children {
                emit_node(gen, child, exit_addr)?;
            }
            Ok(())
        }

        RamNode::Parallel(children) => lower_parallel(gen, children, exit_addr),

        RamNode::Loop { body } => lower_loop(gen, body),

        RamNode::Exit(condition) => lower_exit_or_break(gen, condition, exit_addr, true),
        RamNode::Break(condition) => lower_exit_or_break(gen, condition, exit_addr, false),

        RamNode::Filter { profile_text, condition, nested } => {
            lower_filter(gen, profile_text, condition, nested, exit_addr)
        }

        RamNode::Project { relation, values } => {
            for v in values.iter().rev() {
                gen.lower_expr(v)?;
            }
            gen.emit_opcode(Opcode::Project);
            gen.emit_word(values.len() as i64);
            gen.emit_word(relation.0 as i64);
            Ok(())
        }

        RamNode::SubroutineReturn { values } => {
            for v in values.iter().rev() {
                match v {
                    Some(expr) => gen.lower_expr(expr)?,
                    None => {
                        gen.emit_opcode(Opcode::Number);
                        gen.emit_word(0);
                    }
                }
            }
            gen.emit_opcode(Opcode::SubroutineReturn);
            gen.emit_word(values.len() as i64);
            Ok(())
        }

        RamNode::Create { relation } => {
            gen.emit_opcode(Opcode::Create);
            gen.emit_word(relation.0 as i64);
            Ok(())
        }
        RamNode::Clear { relation } => {
            gen.emit_opcode(Opcode::ClearRelation);
            gen.emit_word(relation.0 as i64);
            Ok(())
        }
        RamNode::Drop { relation } => {
            gen.emit_opcode(Opcode::DropRelation);
            gen.emit_word(relation.0 as i64);
            Ok(())
        }
        RamNode::Merge { source, target } => {
            gen.emit_opcode(Opcode::Merge);
            gen.emit_word(source.0 as i64);
            gen.emit_word(target.0 as i64);
            Ok(())
        }
        RamNode::Swap { a, b } => {
            gen.emit_opcode(Opcode::Swap);
            gen.emit_word(a.0 as i64);
            gen.emit_word(b.0 as i64);
            Ok(())
        }
        RamNode::LogSize { relation, message } => {
            let msg_id = gen.symbols.intern(message.clone());
            gen.emit_opcode(Opcode::LogSize);
            gen.emit_word(relation.0 as i64);
            gen.emit_word(msg_id.0 as i64);
            Ok(())
        }

        RamNode::Load { relation, directive } => {
            let id = gen.io_directives.push(IoDirectiveRecord {
                relation: *relation,
                is_store: false,
                directive: directive.clone(),
            });
            gen.emit_opcode(Opcode::Load);
            gen.emit_word(relation.0 as i64);
            gen.emit_word(id.0 as i64);
            Ok(())
        }
        RamNode::Store { relation, directive } => {
            let id = gen.io_directives.push(IoDirectiveRecord {
                relation: *relation,
                is_store: true,
                directive: directive.clone(),
            });
            gen.emit_opcode(Opcode::Store);
            gen.emit_word(relation.0 as i64);
            gen.emit_word(id.0 as i64);
            Ok(())
        }

        RamNode::Fact { relation, values } => {
            for v in values.iter().rev() {
                gen.lower_expr(v)?;
            }
            gen.emit_opcode(Opcode::Fact);
            gen.emit_word(relation.0 as i64);
            gen.emit_word(values.len() as i64);
            Ok(())
        }

        RamNode::LogTimer { message, relation, nested } => lower_log_timer(gen, message, *relation, nested, exit_addr),

        RamNode::Scan { relation, tuple_id, nested } => gen.lower_scan(*relation, *tuple_id, nested, exit_addr),
        RamNode::IndexedScan { relation, tuple_id, pattern, nested } => {
            gen.lower_indexed_scan(*relation, *tuple_id, pattern, nested, exit_addr)
        }
        RamNode::Choice { relation, tuple_id, condition, nested } => {
            gen.lower_choice(*relation, *tuple_id, None, condition, nested, exit_addr)
        }
        RamNode::IndexedChoice { relation, tuple_id, pattern, condition, nested } => {
            gen.lower_choice(*relation, *tuple_id, Some(pattern), condition, nested, exit_addr)
        }
        RamNode::Aggregate {
            relation,
            scan_tuple_id,
            func,
            value,
            condition,
            result_tuple_id,
            nested,
        } => gen.lower_aggregate(
            *relation,
            *scan_tuple_id,
            None,
            *func,
            value.as_ref(),
            condition.as_ref(),
            *result_tuple_id,
            nested,
            exit_addr,
        ),
        RamNode::IndexedAggregate {
            relation,
            scan_tuple_id,
            pattern,
            func,
            value,
            condition,
            result_tuple_id,
            nested,
        } => gen.lower_aggregate(
            *relation,
            *scan_tuple_id,
            Some(pattern),
            *func,
            value.as_ref(),
            condition.as_ref(),
            *result_tuple_id,
            nested,
            exit_addr,
        ),
    }
}

fn lower_parallel(gen: &mut CodeGenerator, children: &[RamNode], exit_addr: Option<Label>) -> Result<()> {
    use crate::config::ParallelMode;
    match gen.config.parallel_mode {
        ParallelMode::Serial => {
            for child in children {
                emit_node(gen, child, exit_addr)?;
            }
            Ok(())
        }
        ParallelMode::Fork => {
            if children.is_empty() {
                return Ok(());
            }
            let join_labels: Vec<Label> = children.iter().map(|_| gen.new_label()).collect();
            for (child, &join_label) in children.iter().zip(&join_labels) {
                gen.emit_opcode(Opcode::Fork);
                gen.emit_placeholder_target(join_label);
                emit_node(gen, child, exit_addr)?;
                gen.emit_opcode(Opcode::ForkJoin);
                let at = gen.here();
                gen.set_label(join_label, at);
            }
            Ok(())
        }
    }
}

fn lower_loop(gen: &mut CodeGenerator, body: &RamNode) -> Result<()> {
    let exit_label = gen.new_label();
    let header = gen.here();
    gen.emit_opcode(Opcode::LoopHeader);
    emit_node(gen, body, Some(exit_label))?;
    gen.emit_opcode(Opcode::IterationInc);
    gen.emit_opcode(Opcode::Goto);
    gen.emit_word(header as i64);
    gen.emit_opcode(Opcode::IterationReset);
    let after = gen.here();
    gen.set_label(exit_label, after);
    Ok(())
}

fn lower_exit_or_break(
    gen: &mut CodeGenerator,
    condition: &crate::ir::RamCondition,
    exit_addr: Option<Label>,
    is_exit: bool,
) -> Result<()> {
    let target = exit_addr.ok_or_else(|| {
        CompileError::MalformedIr(format!(
            "{} outside an enclosing loop",
            if is_exit { "Exit" } else { "Break" }
        ))
    })?;
    gen.lower_condition(condition)?;
    if !is_exit {
        gen.emit_opcode(Opcode::ExitMarker);
    }
    gen.emit_opcode(Opcode::JmpIfNonZero);
    gen.emit_placeholder_target(target);
    Ok(())
}

fn lower_filter(
    gen: &mut CodeGenerator,
    profile_text: &str,
    condition: &crate::ir::RamCondition,
    nested: &RamNode,
    exit_addr: Option<Label>,
) -> Result<()> {
    let msg_id = gen.symbols.intern(profile_text.to_string());
    gen.emit_opcode(Opcode::DebugInfo);
    gen.emit_word(msg_id.0 as i64);
    gen.lower_condition(condition)?;
    let skip_label = gen.new_label();
    gen.emit_opcode(Opcode::JmpIfZero);
    gen.emit_placeholder_target(skip_label);
    emit_node(gen, nested, exit_addr)?;
    let after = gen.here();
    gen.set_label(skip_label, after);
    Ok(())
}

fn lower_log_timer(
    gen: &mut CodeGenerator,
    message: &str,
    relation: Option<crate::domain::RelationId>,
    nested: &RamNode,
    exit_addr: Option<Label>,
) -> Result<()> {
    let msg_id = gen.symbols.intern(message.to_string());
    let slot = gen.new_timer_slot();
    match relation {
        Some(rel) => {
            gen.emit_opcode(Opcode::LogTimerRelation);
            gen.emit_word(slot.0 as i64);
            gen.emit_word(msg_id.0 as i64);
            gen.emit_word(rel.0 as i64);
        }
        None => {
            gen.emit_opcode(Opcode::LogTimerPlain);
            gen.emit_word(slot.0 as i64);
            gen.emit_word(msg_id.0 as i64);
        }
    }
    emit_node(gen, nested, exit_addr)?;
    gen.emit_opcode(Opcode::StopLogTimer);
    gen.emit_word(slot.0 as i64);
    Ok(())
}
