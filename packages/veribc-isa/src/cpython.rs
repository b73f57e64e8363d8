//! CPython 3.10 opcodes.
//!
//! Stack effects follow `stack_effect()` in CPython's `compile.c`. `EXTENDED_ARG` is left out: the
//! verifier reads one operand byte per instruction and does not fold prefixes.

use crate::{Flow, InstructionSet, JumpKind, StackEffect};

use JumpKind::{Absolute, Relative};

fn unpack_sequence(arg: u8, _: bool) -> i32 {
    arg as i32 - 1
}

fn unpack_ex(arg: u8, _: bool) -> i32 {
    // Low byte counts values before the starred target, high byte values after it. A single
    // operand byte has no high byte.
    arg as i32
}

fn build_seq(arg: u8, _: bool) -> i32 {
    1 - arg as i32
}

fn build_map(arg: u8, _: bool) -> i32 {
    1 - 2 * arg as i32
}

fn pop_arg(arg: u8, _: bool) -> i32 {
    -(arg as i32)
}

fn pop_arg_and_callable(arg: u8, _: bool) -> i32 {
    -(arg as i32) - 1
}

fn call_function_ex(arg: u8, _: bool) -> i32 {
    -1 - (arg & 0x01 != 0) as i32
}

fn make_function(arg: u8, _: bool) -> i32 {
    // One extra value per flag: defaults, kwdefaults, annotations, closure.
    -1 - (arg & 0x0f).count_ones() as i32
}

fn build_slice(arg: u8, _: bool) -> i32 {
    if arg == 3 {
        -2
    } else {
        -1
    }
}

fn format_value(arg: u8, _: bool) -> i32 {
    if arg & 0x04 == 0x04 {
        -1
    } else {
        0
    }
}

fn branch(taken: i32, fallthrough: i32) -> StackEffect {
    StackEffect::Branch { taken, fallthrough }
}

pub(crate) fn cpython310() -> InstructionSet {
    InstructionSet::builder("cpython-3.10")
        .plain(1, "POP_TOP", -1)
        .plain(2, "ROT_TWO", 0)
        .plain(3, "ROT_THREE", 0)
        .plain(4, "DUP_TOP", 1)
        .plain(5, "DUP_TOP_TWO", 2)
        .plain(6, "ROT_FOUR", 0)
        .plain(9, "NOP", 0)
        .plain(10, "UNARY_POSITIVE", 0)
        .plain(11, "UNARY_NEGATIVE", 0)
        .plain(12, "UNARY_NOT", 0)
        .plain(15, "UNARY_INVERT", 0)
        .plain(16, "BINARY_MATRIX_MULTIPLY", -1)
        .plain(17, "INPLACE_MATRIX_MULTIPLY", -1)
        .plain(19, "BINARY_POWER", -1)
        .plain(20, "BINARY_MULTIPLY", -1)
        .plain(22, "BINARY_MODULO", -1)
        .plain(23, "BINARY_ADD", -1)
        .plain(24, "BINARY_SUBTRACT", -1)
        .plain(25, "BINARY_SUBSCR", -1)
        .plain(26, "BINARY_FLOOR_DIVIDE", -1)
        .plain(27, "BINARY_TRUE_DIVIDE", -1)
        .plain(28, "INPLACE_FLOOR_DIVIDE", -1)
        .plain(29, "INPLACE_TRUE_DIVIDE", -1)
        .plain(30, "GET_LEN", 1)
        .plain(31, "MATCH_MAPPING", 1)
        .plain(32, "MATCH_SEQUENCE", 1)
        .plain(33, "MATCH_KEYS", 2)
        .plain(34, "COPY_DICT_WITHOUT_KEYS", 0)
        .plain(49, "WITH_EXCEPT_START", 1)
        .plain(50, "GET_AITER", 0)
        .plain(51, "GET_ANEXT", 1)
        .plain(52, "BEFORE_ASYNC_WITH", 1)
        .plain(54, "END_ASYNC_FOR", -7)
        .plain(55, "INPLACE_ADD", -1)
        .plain(56, "INPLACE_SUBTRACT", -1)
        .plain(57, "INPLACE_MULTIPLY", -1)
        .plain(59, "INPLACE_MODULO", -1)
        .plain(60, "STORE_SUBSCR", -3)
        .plain(61, "DELETE_SUBSCR", -2)
        .plain(62, "BINARY_LSHIFT", -1)
        .plain(63, "BINARY_RSHIFT", -1)
        .plain(64, "BINARY_AND", -1)
        .plain(65, "BINARY_XOR", -1)
        .plain(66, "BINARY_OR", -1)
        .plain(67, "INPLACE_POWER", -1)
        .plain(68, "GET_ITER", 0)
        .plain(69, "GET_YIELD_FROM_ITER", 0)
        .plain(70, "PRINT_EXPR", -1)
        .plain(71, "LOAD_BUILD_CLASS", 1)
        .plain(72, "YIELD_FROM", -1)
        .plain(73, "GET_AWAITABLE", 0)
        .plain(74, "LOAD_ASSERTION_ERROR", 1)
        .plain(75, "INPLACE_LSHIFT", -1)
        .plain(76, "INPLACE_RSHIFT", -1)
        .plain(77, "INPLACE_AND", -1)
        .plain(78, "INPLACE_XOR", -1)
        .plain(79, "INPLACE_OR", -1)
        .plain(82, "LIST_TO_TUPLE", 0)
        .op(83, "RETURN_VALUE", Flow::Return, StackEffect::Fixed(-1))
        .plain(84, "IMPORT_STAR", -1)
        .plain(85, "SETUP_ANNOTATIONS", 0)
        .plain(86, "YIELD_VALUE", 0)
        .plain(87, "POP_BLOCK", 0)
        .plain(89, "POP_EXCEPT", -3)
        .plain(90, "STORE_NAME", -1)
        .plain(91, "DELETE_NAME", 0)
        .dynamic(92, "UNPACK_SEQUENCE", unpack_sequence)
        .op(93, "FOR_ITER", Flow::Branch(Relative), branch(-1, 1))
        .dynamic(94, "UNPACK_EX", unpack_ex)
        .plain(95, "STORE_ATTR", -2)
        .plain(96, "DELETE_ATTR", -1)
        .plain(97, "STORE_GLOBAL", -1)
        .plain(98, "DELETE_GLOBAL", 0)
        .plain(99, "ROT_N", 0)
        .plain(100, "LOAD_CONST", 1)
        .plain(101, "LOAD_NAME", 1)
        .dynamic(102, "BUILD_TUPLE", build_seq)
        .dynamic(103, "BUILD_LIST", build_seq)
        .dynamic(104, "BUILD_SET", build_seq)
        .dynamic(105, "BUILD_MAP", build_map)
        .plain(106, "LOAD_ATTR", 0)
        .plain(107, "COMPARE_OP", -1)
        .plain(108, "IMPORT_NAME", -1)
        .plain(109, "IMPORT_FROM", 1)
        .op(110, "JUMP_FORWARD", Flow::Jump(Relative), StackEffect::Fixed(0))
        .op(111, "JUMP_IF_FALSE_OR_POP", Flow::Branch(Absolute), branch(0, -1))
        .op(112, "JUMP_IF_TRUE_OR_POP", Flow::Branch(Absolute), branch(0, -1))
        .op(113, "JUMP_ABSOLUTE", Flow::Jump(Absolute), StackEffect::Fixed(0))
        .op(114, "POP_JUMP_IF_FALSE", Flow::Branch(Absolute), StackEffect::Fixed(-1))
        .op(115, "POP_JUMP_IF_TRUE", Flow::Branch(Absolute), StackEffect::Fixed(-1))
        .plain(116, "LOAD_GLOBAL", 1)
        .plain(117, "IS_OP", -1)
        .plain(118, "CONTAINS_OP", -1)
        .op(119, "RERAISE", Flow::Raise, StackEffect::Fixed(-3))
        .op(121, "JUMP_IF_NOT_EXC_MATCH", Flow::Branch(Absolute), StackEffect::Fixed(-2))
        // The handler is entered with the exception state (6 values) pushed.
        .op(122, "SETUP_FINALLY", Flow::Branch(Relative), branch(6, 0))
        .plain(124, "LOAD_FAST", 1)
        .plain(125, "STORE_FAST", -1)
        .plain(126, "DELETE_FAST", 0)
        // CPython starts generators at depth 1 and pops the sent value here. The verifier always
        // starts at depth 0, so the pop is not modelled.
        .plain(129, "GEN_START", 0)
        .op(130, "RAISE_VARARGS", Flow::Raise, StackEffect::Dynamic(pop_arg))
        .dynamic(131, "CALL_FUNCTION", pop_arg)
        .dynamic(132, "MAKE_FUNCTION", make_function)
        .dynamic(133, "BUILD_SLICE", build_slice)
        .plain(135, "LOAD_CLOSURE", 1)
        .plain(136, "LOAD_DEREF", 1)
        .plain(137, "STORE_DEREF", -1)
        .plain(138, "DELETE_DEREF", 0)
        .dynamic(141, "CALL_FUNCTION_KW", pop_arg_and_callable)
        .dynamic(142, "CALL_FUNCTION_EX", call_function_ex)
        .op(143, "SETUP_WITH", Flow::Branch(Relative), branch(6, 1))
        .plain(145, "LIST_APPEND", -1)
        .plain(146, "SET_ADD", -1)
        .plain(147, "MAP_ADD", -2)
        .plain(148, "LOAD_CLASSDEREF", 1)
        .plain(152, "MATCH_CLASS", -1)
        .op(154, "SETUP_ASYNC_WITH", Flow::Branch(Relative), branch(5, 0))
        .dynamic(155, "FORMAT_VALUE", format_value)
        .dynamic(156, "BUILD_CONST_KEY_MAP", pop_arg)
        .dynamic(157, "BUILD_STRING", build_seq)
        .plain(160, "LOAD_METHOD", 1)
        .dynamic(161, "CALL_METHOD", pop_arg_and_callable)
        .plain(162, "LIST_EXTEND", -1)
        .plain(163, "SET_UPDATE", -1)
        .plain(164, "DICT_MERGE", -1)
        .plain(165, "DICT_UPDATE", -1)
        .build()
}
