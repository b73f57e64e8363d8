use expect_test::expect;

use super::*;

#[test]
fn cpython_classification() {
    let isa = InstructionSet::cpython310();

    let for_iter = isa.by_mnemonic("FOR_ITER").unwrap();
    assert_eq!(for_iter.opcode, 93);
    assert_eq!(for_iter.flow, Flow::Branch(JumpKind::Relative));
    assert!(for_iter.flow.is_branch());
    assert!(!for_iter.flow.is_uncond_transfer());

    let jump = isa.by_mnemonic("JUMP_ABSOLUTE").unwrap();
    assert!(jump.flow.is_branch());
    assert!(jump.flow.is_uncond_transfer());
    assert_eq!(jump.flow.jump_kind(), Some(JumpKind::Absolute));

    let ret = isa.get(83).unwrap();
    assert_eq!(ret.mnemonic, "RETURN_VALUE");
    assert!(ret.flow.is_return());
    assert!(ret.flow.is_uncond_transfer());
    assert_eq!(ret.flow.jump_kind(), None);

    assert!(isa.by_mnemonic("RERAISE").unwrap().flow.is_raise());
    assert!(isa.get(7).is_none());
    assert!(isa.by_mnemonic("EXTENDED_ARG").is_none());
}

#[test]
fn cpython_stack_effects() {
    let isa = InstructionSet::cpython310();
    let effect = |name: &str, operand: u8, taken: bool| {
        let info = isa.by_mnemonic(name).unwrap();
        isa.stack_effect(info.opcode, operand, taken).unwrap()
    };

    assert_eq!(effect("LOAD_CONST", 0, false), 1);
    assert_eq!(effect("FOR_ITER", 0, false), 1);
    assert_eq!(effect("FOR_ITER", 0, true), -1);
    assert_eq!(effect("JUMP_IF_TRUE_OR_POP", 0, false), -1);
    assert_eq!(effect("JUMP_IF_TRUE_OR_POP", 0, true), 0);
    assert_eq!(effect("UNPACK_SEQUENCE", 3, false), 2);
    assert_eq!(effect("BUILD_TUPLE", 0, false), 1);
    assert_eq!(effect("BUILD_MAP", 2, false), -3);
    assert_eq!(effect("CALL_METHOD", 2, false), -3);
    assert_eq!(effect("CALL_FUNCTION_EX", 1, false), -2);
    assert_eq!(effect("MAKE_FUNCTION", 0x08, false), -2);
    assert_eq!(effect("MAKE_FUNCTION", 0x0f, false), -5);
    assert_eq!(effect("BUILD_SLICE", 3, false), -2);
    assert_eq!(effect("FORMAT_VALUE", 0x04, false), -1);
    assert_eq!(effect("SETUP_FINALLY", 0, true), 6);
    assert_eq!(effect("SETUP_FINALLY", 0, false), 0);
    assert_eq!(isa.stack_effect(7, 0, false), None);
}

#[test]
#[should_panic(expected = "opcode 1 is defined twice")]
fn duplicate_opcode_panics() {
    InstructionSet::builder("dup")
        .plain(1, "A", 0)
        .plain(1, "B", 0)
        .build();
}

#[test]
fn assemble_with_forward_jumps() {
    let isa = InstructionSet::cpython310();
    let mut asm = Assembler::new(&isa, "f");
    let none = asm.write_const(Const::None).unwrap();
    asm.write("LOAD_CONST", none).unwrap();
    let cond = asm.write("POP_JUMP_IF_FALSE", 0).unwrap();
    asm.write("LOAD_CONST", none).unwrap();
    let skip = asm.write("JUMP_FORWARD", 0).unwrap();
    asm.patch_jump(cond).unwrap();
    asm.write("LOAD_CONST", none).unwrap();
    asm.patch_jump(skip).unwrap();
    asm.write("RETURN_VALUE", 0).unwrap();
    let code = asm.finish(1);

    // POP_JUMP_IF_FALSE targets index 4 directly. JUMP_FORWARD at 3 counts from index 4.
    expect![[r#"
        [
            100,
            0,
            114,
            4,
            100,
            0,
            110,
            1,
            100,
            0,
            83,
            0,
        ]
    "#]]
    .assert_debug_eq(&code.code);
    assert_eq!(code.consts, vec![Const::None]);
    assert!(code.nested().next().is_none());
}

#[test]
fn assembler_errors() {
    let isa = InstructionSet::cpython310();
    let mut asm = Assembler::new(&isa, "f");
    assert_eq!(
        asm.write("NOT_AN_OP", 0).unwrap_err().to_string(),
        "unknown instruction `NOT_AN_OP` in instruction set `cpython-3.10`."
    );
    let load = asm.write("LOAD_CONST", 0).unwrap();
    assert_eq!(asm.patch_jump(load), Err(AssembleError::NotAJump(0)));
    let back = asm.write("JUMP_FORWARD", 0).unwrap();
    assert_eq!(
        asm.patch_jump_to(back, 0),
        Err(AssembleError::OperandOutOfRange(-2))
    );
}

#[test]
fn locations_follow_code_units() {
    let isa = InstructionSet::cpython310();
    let mut asm = Assembler::new(&isa, "f");
    asm.set_location(3..8);
    asm.write("NOP", 0).unwrap();
    asm.set_location(10..14);
    asm.write_raw(&[9, 0, 9]);
    let code = asm.finish(0);

    assert_eq!(code.code.len(), 5);
    assert_eq!(code.location(0), Some(3..8));
    assert_eq!(code.location(1), Some(10..14));
    assert_eq!(code.location(2), Some(10..14));
    assert_eq!(code.location(3), None);
}

#[test]
fn nested_code_objects_in_declaration_order() {
    let inner_a = CodeObject::new("a", vec![100, 0, 83, 0], 1);
    let inner_b = CodeObject::new("b", vec![100, 0, 83, 0], 1);
    let outer = CodeObject::new("<module>", vec![100, 0, 83, 0], 1).with_consts(vec![
        Const::Code(inner_a.into()),
        Const::Int(3),
        Const::Code(inner_b.into()),
    ]);
    let names = outer.nested().map(|c| c.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["a", "b"]);
}
