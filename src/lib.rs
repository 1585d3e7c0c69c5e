//! # LVM Bytecode Compiler
//!
//! Lowers a RAM intermediate representation — a relational-algebra tree
//! produced by an upstream semantic-analysis stage — into a flat LVM
//! instruction stream for a register-free stack interpreter.
//!
//! ## Pipeline
//!
//! ```text
//! RamNode tree
//!     |
//!     v
//! [RelationEncoder]   name -> dense RelationId, storage-kind selection
//!     |
//!     v
//! [IndexResolver]      search signature -> lexicographic index position
//!     |
//!     v
//! [CodeGenerator]      two-pass walk -> LvmCode (stream + symbols + io directives)
//! ```
//!
//! The index-analysis step itself — choosing which indices exist and which
//! signature a given loop-nest operation should search with — is supplied
//! by the embedder through the [`analysis::IndexAnalysis`] trait; this
//! crate only consumes its answers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lvm_compiler::{CodeGenerator, Config, RelationEncoder};
//!
//! let config = Config::load()?;
//! let encoder = RelationEncoder::new(declarations, config.codegen.indirect_arity_threshold);
//! let code = CodeGenerator::compile(&encoder, &analysis, &config.codegen, &program)?;
//! ```

pub mod analysis;
pub mod code_generator;
pub mod config;
pub mod domain;
pub mod error;
pub mod ir;
pub mod lvm;
pub mod relation;

pub use analysis::{IndexAnalysis, IndexResolver, StaticIndexAnalysis};
pub use code_generator::CodeGenerator;
pub use config::{init_tracing, CodegenConfig, Config, LoggingConfig, ParallelMode};
pub use domain::{DomainVal, IoDirectiveId, IterSlot, Label, RelationId, SymbolId, TimerSlot};
pub use error::{CompileError, Result};
pub use ir::{
    AggregateFunc, BinaryOp, ColumnPattern, CompareOp, IoDirective, RamCondition, RamExpression,
    RamNode, TernaryOp, UnaryOp, VariadicOp,
};
pub use lvm::{IoDirectiveRecord, IoDirectiveTable, LvmCode, Opcode, SymbolTable};
pub use relation::{
    AttributeType, DeclaredRepresentation, IndexSignature, RelationDeclaration, RelationDescriptor,
    RelationEncoder, StorageKind,
};
