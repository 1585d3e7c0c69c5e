//! Expression lowering, post-order.

use super::CodeGenerator;
use crate::error::Result;
use crate::ir::{BinaryOp, RamExpression, TernaryOp, UnaryOp, VariadicOp};
use crate::lvm::Opcode;

fn unary_opcode(op: UnaryOp) -> Opcode {
    match op {
        UnaryOp::Ord => Opcode::Ord,
        UnaryOp::StrLen => Opcode::StrLen,
        UnaryOp::Neg => Opcode::Neg,
        UnaryOp::BNot => Opcode::BNot,
        UnaryOp::LNot => Opcode::LNot,
        UnaryOp::ToNumber => Opcode::ToNumber,
        UnaryOp::ToString => Opcode::ToString,
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Exp => Opcode::Exp,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::BAnd => Opcode::BAnd,
        BinaryOp::BOr => Opcode::BOr,
        BinaryOp::BXor => Opcode::BXor,
        BinaryOp::LAnd => Opcode::LAnd,
        BinaryOp::LOr => Opcode::LOr,
    }
}

fn ternary_opcode(op: TernaryOp) -> Opcode {
    match op {
        TernaryOp::Substr => Opcode::Substr,
    }
}

fn variadic_opcode(op: VariadicOp) -> Opcode {
    match op {
        VariadicOp::Min => Opcode::Min,
        VariadicOp::Max => Opcode::Max,
        VariadicOp::Cat => Opcode::Cat,
    }
}

impl<'a> CodeGenerator<'a> {
    pub(super) fn lower_expr(&mut self, expr: &RamExpression) -> Result<()> {
        match expr {
            RamExpression::NumberConstant(v) => {
                self.emit_opcode(Opcode::Number);
                self.emit_word(*v);
            }
            RamExpression::TupleElement { tuple_id, element } => {
                self.emit_opcode(Opcode::TupleElement);
                self.emit_word(*tuple_id as i64);
                self.emit_word(*element as i64);
            }
            RamExpression::AutoIncrement => {
                self.emit_opcode(Opcode::AutoIncrement);
            }
            RamExpression::PackRecord(fields) => {
                for f in fields {
                    self.lower_expr(f)?;
                }
                self.emit_opcode(Opcode::PackRecord);
                self.emit_word(fields.len() as i64);
            }
            RamExpression::SubroutineArgument(idx) => {
                self.emit_opcode(Opcode::SubroutineArgument);
                self.emit_word(*idx as i64);
            }
            RamExpression::UserDefinedOperator { name, type_signature, args } => {
                for a in args.iter().rev() {
                    self.lower_expr(a)?;
                }
                let name_id = self.symbols.intern(name.clone());
                let sig_id = self.symbols.intern(type_signature.clone());
                self.emit_opcode(Opcode::UserDefinedOperator);
                self.emit_word(name_id.0 as i64);
                self.emit_word(sig_id.0 as i64);
                self.emit_word(args.len() as i64);
            }
            RamExpression::Unary(op, a) => {
                self.lower_expr(a)?;
                self.emit_opcode(unary_opcode(*op));
            }
            RamExpression::Binary(op, a, b) => {
                self.lower_expr(a)?;
                self.lower_expr(b)?;
                self.emit_opcode(binary_opcode(*op));
            }
            RamExpression::Ternary(op, a, b, c) => {
                self.lower_expr(a)?;
                self.lower_expr(b)?;
                self.lower_expr(c)?;
                self.emit_opcode(ternary_opcode(*op));
            }
            RamExpression::Variadic(VariadicOp::Cat, args) => {
                for a in args.iter().rev() {
                    self.lower_expr(a)?;
                }
                self.emit_opcode(Opcode::Cat);
                self.emit_word(args.len() as i64);
            }
            RamExpression::Variadic(op, args) => {
                for a in args {
                    self.lower_expr(a)?;
                }
                self.emit_opcode(variadic_opcode(*op));
                self.emit_word(args.len() as i64);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StaticIndexAnalysis;
    use crate::config::CodegenConfig;
    use crate::relation::RelationEncoder;

    fn gen_for<'a>(enc: &'a RelationEncoder, oracle: &'a StaticIndexAnalysis, config: &'a CodegenConfig) -> CodeGenerator<'a> {
        CodeGenerator::new(enc, oracle, config)
    }

    #[test]
    fn cat_reverses_argument_order() {
        let enc = RelationEncoder::new(std::iter::empty(), 12);
        let oracle = StaticIndexAnalysis::new();
        let config = CodegenConfig::default();
        let mut gen = gen_for(&enc, &oracle, &config);
        gen.lower_expr(&RamExpression::Variadic(
            VariadicOp::Cat,
            vec![RamExpression::NumberConstant(1), RamExpression::NumberConstant(2), RamExpression::NumberConstant(3)],
        ))
        .unwrap();
        assert_eq!(
            gen.stream,
            vec![
                Opcode::Number.code(), 3,
                Opcode::Number.code(), 2,
                Opcode::Number.code(), 1,
                Opcode::Cat.code(), 3,
            ]
        );
    }

    #[test]
    fn min_keeps_argument_order() {
        let enc = RelationEncoder::new(std::iter::empty(), 12);
        let oracle = StaticIndexAnalysis::new();
        let config = CodegenConfig::default();
        let mut gen = gen_for(&enc, &oracle, &config);
        gen.lower_expr(&RamExpression::Variadic(
            VariadicOp::Min,
            vec![RamExpression::NumberConstant(1), RamExpression::NumberConstant(2)],
        ))
        .unwrap();
        assert_eq!(
            gen.stream,
            vec![Opcode::Number.code(), 1, Opcode::Number.code(), 2, Opcode::Min.code(), 2]
        );
    }

    #[test]
    fn user_defined_operator_reverses_args_then_name_sig_arity() {
        let enc = RelationEncoder::new(std::iter::empty(), 12);
        let oracle = StaticIndexAnalysis::new();
        let config = CodegenConfig::default();
        let mut gen = gen_for(&enc, &oracle, &config);
        gen.lower_expr(&RamExpression::UserDefinedOperator {
            name: "myop".to_string(),
            type_signature: "(i,i)->i".to_string(),
            args: vec![RamExpression::NumberConstant(1), RamExpression::NumberConstant(2)],
        })
        .unwrap();
        assert_eq!(
            gen.stream,
            vec![
                Opcode::Number.code(), 2,
                Opcode::Number.code(), 1,
                Opcode::UserDefinedOperator.code(),
                0, // interned "myop"
                1, // interned "(i,i)->i"
                2,
            ]
        );
        assert_eq!(gen.symbols.resolve(crate::domain::SymbolId(0)), "myop");
    }
}
