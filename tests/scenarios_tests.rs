//! Black-box tests built directly from worked end-to-end scenarios and
//! testable properties of the compiled output.

use lvm_compiler::{
    AggregateFunc, AttributeType, CodeGenerator, CodegenConfig, ColumnPattern, DeclaredRepresentation,
    Opcode, RamCondition, RamExpression, RamNode, RelationDeclaration, RelationEncoder, StaticIndexAnalysis,
};

fn encoder_with(name: &str, arity: usize) -> (RelationEncoder, lvm_compiler::RelationId) {
    let mut enc = RelationEncoder::new(std::iter::empty(), 12);
    let id = enc.intern(RelationDeclaration {
        name: name.to_string(),
        arity,
        attr_types: vec![AttributeType::Number; arity],
        index_set: vec![],
        representation: DeclaredRepresentation::Default,
    });
    (enc, id)
}

/// Scenario 1: `project(number 42 into R{arity=1})`.
#[test]
fn scenario_project_number_constant() {
    let (enc, r) = encoder_with("R", 1);
    let oracle = StaticIndexAnalysis::new();
    let config = CodegenConfig::default();
    let program = RamNode::Project { relation: r, values: vec![RamExpression::NumberConstant(42)] };

    let code = CodeGenerator::compile(&enc, &oracle, &config, &program).unwrap();

    assert_eq!(
        code.stream,
        vec![Opcode::Number.code(), 42, Opcode::Project.code(), 1, r.0 as i64, Opcode::Stop.code()]
    );
}

/// Scenario 2: a scan over a 2-ary relation projecting both columns into a
/// second relation.
#[test]
fn scenario_scan_then_project() {
    let (mut enc, r) = encoder_with("R", 2);
    let s = enc.intern(RelationDeclaration {
        name: "S".to_string(),
        arity: 2,
        attr_types: vec![AttributeType::Number; 2],
        index_set: vec![],
        representation: DeclaredRepresentation::Default,
    });
    let oracle = StaticIndexAnalysis::new();
    let config = CodegenConfig::default();
    let program = RamNode::Scan {
        relation: r,
        tuple_id: 0,
        nested: Box::new(RamNode::Project {
            relation: s,
            values: vec![
                RamExpression::TupleElement { tuple_id: 0, element: 0 },
                RamExpression::TupleElement { tuple_id: 0, element: 1 },
            ],
        }),
    };

    let code = CodeGenerator::compile(&enc, &oracle, &config, &program).unwrap();

    assert_eq!(&code.stream[0..3], [Opcode::IterInitFullIndex.code(), 0, r.0 as i64]);
    let not_at_end_pos = 3;
    assert_eq!(code.stream[not_at_end_pos], Opcode::IterNotAtEnd.code());
    assert_eq!(code.stream[not_at_end_pos + 2], Opcode::JmpIfZero.code());
    // SELECT slot, tuple_id follows the conditional jump's target operand.
    let select_pos = not_at_end_pos + 4;
    assert_eq!(code.stream[select_pos], Opcode::IterSelect.code());
    assert_eq!(code.stream[select_pos + 1], 0);
    assert_eq!(code.stream[select_pos + 2], 0);
    // Project's values are reversed: element 1 before element 0.
    let project_start = select_pos + 3;
    assert_eq!(code.stream[project_start], Opcode::TupleElement.code());
    assert_eq!(code.stream[project_start + 2], 1); // element 1 emitted first
    assert_eq!(*code.stream.last().unwrap(), Opcode::Stop.code());
}

/// Scenario 3: `aggregate(count, R, condition=true)` takes the shortcut.
#[test]
fn scenario_count_aggregate_shortcut() {
    let (enc, r) = encoder_with("R", 1);
    let oracle = StaticIndexAnalysis::new();
    let config = CodegenConfig::default();
    let program = RamNode::Aggregate {
        relation: r,
        scan_tuple_id: 0,
        func: AggregateFunc::Count,
        value: None,
        condition: Some(RamCondition::True),
        result_tuple_id: 7,
        nested: Box::new(RamNode::Sequence(vec![])),
    };

    let code = CodeGenerator::compile(&enc, &oracle, &config, &program).unwrap();

    assert_eq!(
        code.stream,
        vec![
            Opcode::IterInitFullIndex.code(), 0, r.0 as i64,
            Opcode::AggregateCountShortcut.code(), 0,
            Opcode::AggregateReturn.code(), 7,
            Opcode::Stop.code(),
        ]
    );
}

/// Scenario 4: `existence-check R(bound v, undef)` with arity 2.
#[test]
fn scenario_existence_check_one_arg() {
    let (enc, r) = encoder_with("R", 2);
    let oracle = StaticIndexAnalysis::new().with_indexes(
        r,
        vec![lvm_compiler::IndexSignature { signature: 0b01, order: vec![0, 1] }],
    );
    let config = CodegenConfig::default();
    let pattern: Vec<ColumnPattern> = vec![Some(RamExpression::NumberConstant(5)), None];
    let program = RamNode::Filter {
        profile_text: "probe".to_string(),
        condition: RamCondition::Existence { relation: r, pattern, provenance: false },
        nested: Box::new(RamNode::Sequence(vec![])),
    };

    let code = CodeGenerator::compile(&enc, &oracle, &config, &program).unwrap();

    // DebugInfo tag precedes the condition; the condition is the bound
    // value followed by the single-word existence-check opcode.
    assert_eq!(code.stream[0], Opcode::DebugInfo.code());
    assert_eq!(code.stream[2], Opcode::Number.code());
    assert_eq!(code.stream[3], 5);
    assert_eq!(code.stream[4], Opcode::ExistenceCheckOneArg.code());
    assert_eq!(code.stream[5], r.0 as i64);
    assert_eq!(code.stream[6], 0); // resolved index position
    assert_eq!(code.stream[7], 0b01);
}

/// Scenario 5: `loop { exit(condition c); body }`.
#[test]
fn scenario_loop_with_exit() {
    let (enc, r) = encoder_with("R", 1);
    let oracle = StaticIndexAnalysis::new();
    let config = CodegenConfig::default();
    let program = RamNode::Loop {
        body: Box::new(RamNode::Sequence(vec![
            RamNode::Exit(RamCondition::True),
            RamNode::Fact { relation: r, values: vec![RamExpression::NumberConstant(1)] },
        ])),
    };

    let code = CodeGenerator::compile(&enc, &oracle, &config, &program).unwrap();

    // loop header, code for c, JMP_IF_NZ exit-target
    assert_eq!(code.stream[0], Opcode::LoopHeader.code());
    assert_eq!(code.stream[1], Opcode::True.code());
    assert_eq!(code.stream[2], Opcode::JmpIfNonZero.code());
    let exit_target = code.stream[3] as usize;
    // body: Fact
    assert_eq!(code.stream[4], Opcode::Number.code());
    assert_eq!(code.stream[5], 1);
    assert_eq!(code.stream[6], Opcode::Fact.code());
    assert_eq!(code.stream[7], r.0 as i64);
    assert_eq!(code.stream[8], 1); // arity
    // INC-ITERATION, GOTO header
    assert_eq!(code.stream[9], Opcode::IterationInc.code());
    assert_eq!(code.stream[10], Opcode::Goto.code());
    assert_eq!(code.stream[11], 0); // header offset, the LoopHeader word itself
                                     // RESET-ITERATION, exit-target here
    assert_eq!(code.stream[12], Opcode::IterationReset.code());
    assert_eq!(exit_target, 13);
    assert_eq!(code.stream[exit_target], Opcode::Stop.code());
}

/// Scenario 6: empty `parallel` emits nothing; single-child is
/// indistinguishable from its child.
#[test]
fn scenario_parallel_degenerates_when_serial() {
    let (enc, r) = encoder_with("R", 1);
    let oracle = StaticIndexAnalysis::new();
    let config = CodegenConfig::default();

    let empty = CodeGenerator::compile(&enc, &oracle, &config, &RamNode::Parallel(vec![])).unwrap();
    assert_eq!(empty.stream, vec![Opcode::Stop.code()]);

    let child = RamNode::Project { relation: r, values: vec![RamExpression::NumberConstant(9)] };
    let solo_parallel = CodeGenerator::compile(&enc, &oracle, &config, &RamNode::Parallel(vec![child.clone()])).unwrap();
    let solo_plain = CodeGenerator::compile(&enc, &oracle, &config, &child).unwrap();
    assert_eq!(solo_parallel.stream, solo_plain.stream);
}

/// Boundary: an aggregate `min` with no matching rows leaves the
/// accumulator at its seed, which is observable as the post-loop
/// `JmpIfZero` gate compiled right after `AggregateReturn`.
#[test]
fn boundary_min_aggregate_skip_on_no_match_gate_is_emitted() {
    let (enc, r) = encoder_with("R", 1);
    let oracle = StaticIndexAnalysis::new();
    let config = CodegenConfig::default();
    let program = RamNode::Aggregate {
        relation: r,
        scan_tuple_id: 0,
        func: AggregateFunc::Min,
        value: Some(RamExpression::TupleElement { tuple_id: 0, element: 0 }),
        condition: None,
        result_tuple_id: 3,
        nested: Box::new(RamNode::Sequence(vec![])),
    };

    let code = CodeGenerator::compile(&enc, &oracle, &config, &program).unwrap();

    let aggregate_return_pos = code
        .stream
        .iter()
        .position(|&w| w == Opcode::AggregateReturn.code())
        .expect("AggregateReturn opcode present");
    assert_eq!(code.stream[aggregate_return_pos + 2], Opcode::JmpIfZero.code());
}

/// Boundary: a relation declared with arity > 12 is always `Indirect`.
#[test]
fn boundary_wide_relation_is_indirect() {
    let mut enc = RelationEncoder::new(std::iter::empty(), 12);
    let wide = enc.intern(RelationDeclaration {
        name: "wide".to_string(),
        arity: 13,
        attr_types: vec![AttributeType::Number; 13],
        index_set: vec![],
        representation: DeclaredRepresentation::OrderedTree,
    });
    assert_eq!(enc.lookup(wide).storage, lvm_compiler::StorageKind::Indirect);
}

/// Boundary: an all-undefined existence pattern has no `existence` opcode
/// at all — just a negated emptiness check.
#[test]
fn boundary_all_undefined_existence_has_no_existence_opcode() {
    let (enc, r) = encoder_with("R", 3);
    let oracle = StaticIndexAnalysis::new();
    let config = CodegenConfig::default();
    let program = RamNode::Filter {
        profile_text: "t".to_string(),
        condition: RamCondition::Existence { relation: r, pattern: vec![None, None, None], provenance: false },
        nested: Box::new(RamNode::Sequence(vec![])),
    };

    let code = CodeGenerator::compile(&enc, &oracle, &config, &program).unwrap();
    assert!(!code.stream.contains(&Opcode::ExistenceCheck.code()));
    assert!(!code.stream.contains(&Opcode::ExistenceCheckOneArg.code()));
    assert!(code.stream.contains(&Opcode::Emptiness.code()));
}
