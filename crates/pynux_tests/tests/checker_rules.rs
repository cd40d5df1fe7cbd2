//! Checker rules: name resolution, assignability, operator typing,
//! intrinsic recognition, and the diagnostics contract.

use pynux_base::Stage;
use pynux_compile::{check_source, CompileOptions, Target};

fn check(src: &str) {
    check_source(src, &CompileOptions::default()).expect("expected the program to check");
}

fn check_err(src: &str) -> pynux_base::Diagnostic {
    check_source(src, &CompileOptions::default()).expect_err("expected a type error")
}

#[test]
fn unknown_identifier_is_reported_with_its_name() {
    let err = check_err("def f() -> int32:\n    return ghost\n");
    assert_eq!(err.stage, Stage::Type);
    assert!(err.message.contains("ghost"));
}

#[test]
fn integer_widening_is_implicit_same_signedness_only() {
    check("def f(x: int8) -> int32:\n    y: int32 = x\n    return y\n");
    let err = check_err("def f(x: uint8) -> int32:\n    y: int32 = x\n    return y\n");
    assert!(err.message.contains("cast"));
}

#[test]
fn narrowing_requires_cast() {
    let err = check_err("def f(x: int32) -> int8:\n    return x\n");
    assert!(err.message.contains("int8"));
    check("def f(x: int32) -> int8:\n    return cast[int8](x)\n");
}

#[test]
fn array_decays_to_element_pointer() {
    check("def f() -> int32:\n    buf: Array[8, uint8]\n    p: Ptr[uint8] = buf\n    return 0\n");
}

#[test]
fn none_flows_into_pointers_and_optionals() {
    check("def f() -> int32:\n    p: Ptr[uint32] = None\n    q: Optional[str] = None\n    return 0\n");
    let err = check_err("def f() -> int32:\n    x: int32 = None\n    return x\n");
    assert_eq!(err.stage, Stage::Type);
}

#[test]
fn optional_requires_pointer_shaped_payload() {
    let err = check_err("def f() -> int32:\n    x: Optional[int32] = None\n    return 0\n");
    assert!(err.message.contains("Optional"));
}

#[test]
fn string_literals_initialize_both_str_and_ptr_char() {
    check("def f() -> int32:\n    a: str = \"hi\"\n    b: Ptr[char] = \"hi\"\n    return 0\n");
}

#[test]
fn arity_mismatch_is_reported() {
    let err = check_err(
        "def add(a: int32, b: int32) -> int32:\n    return a + b\ndef f() -> int32:\n    return add(1)\n",
    );
    assert!(err.message.contains("2 argument"));
}

#[test]
fn break_outside_a_loop_is_rejected() {
    let err = check_err("def f() -> int32:\n    break\n    return 0\n");
    assert!(err.message.contains("break"));
}

#[test]
fn return_value_in_void_function_is_rejected() {
    let err = check_err("def f():\n    return 1\n");
    assert!(err.message.contains("void"));
}

#[test]
fn missing_return_value_is_rejected() {
    let err = check_err("def f() -> int32:\n    return\n");
    assert!(err.message.contains("int32"));
}

#[test]
fn address_of_non_lvalue_is_rejected() {
    let err = check_err("def f() -> int32:\n    p: Ptr[int32] = &(1 + 2)\n    return 0\n");
    assert!(err.message.contains("assignable") || err.message.contains("address"));
}

#[test]
fn global_statement_gates_module_writes() {
    check("c: int32 = 0\ndef f() -> int32:\n    global c\n    c = 1\n    return c\n");
    let err = check_err("c: int32 = 0\ndef f() -> int32:\n    c = 1\n    return c\n");
    assert!(err.message.contains("global"));
}

#[test]
fn floats_declare_and_move_but_never_compute() {
    check("def f() -> int32:\n    x: float32 = 1.5\n    y: float32 = x\n    return 0\n");
    let err = check_err("def f() -> int32:\n    x: float32 = 1.5\n    y: float32 = x + x\n    return 0\n");
    assert!(err.message.contains("float"));
}

#[test]
fn sixty_four_bit_division_is_rejected() {
    let err = check_err("def f(a: int64, b: int64) -> int64:\n    return a / b\n");
    assert!(err.message.contains("64-bit"));
    check("def f(a: int64, b: int64) -> int64:\n    return a + b\n");
}

#[test]
fn pointer_arithmetic_types_as_pointer() {
    check("def f(p: Ptr[uint32]) -> Ptr[uint32]:\n    return p + 4\n");
    check("def f(a: Ptr[uint32], b: Ptr[uint32]) -> int32:\n    return a - b\n");
}

#[test]
fn char_in_string_is_bool() {
    check("def f(s: str) -> bool:\n    c: char = s[0]\n    return c in s\n");
}

#[test]
fn structs_pass_by_pointer_only() {
    let err = check_err("struct P:\n    x: int32\ndef f(p: P) -> int32:\n    return 0\n");
    assert!(err.message.contains("pointer"));
    check("struct P:\n    x: int32\ndef f(p: Ptr[P]) -> int32:\n    return p.x\n");
}

#[test]
fn class_flattening_includes_base_fields() {
    check(
        "class Animal:\n    legs: int32\nclass Dog(Animal):\n    tail: int32\n    def kick(self) -> int32:\n        return self.legs + self.tail\n",
    );
}

#[test]
fn methods_lower_to_free_functions_with_self() {
    check(
        "class Counter:\n    value: int32\n    def bump(self) -> int32:\n        return self.value + 1\ndef f(c: Ptr[Counter]) -> int32:\n    return c.bump()\n",
    );
}

#[test]
fn range_outside_for_is_rejected() {
    let err = check_err("def f() -> int32:\n    x = range(3)\n    return 0\n");
    assert!(err.message.contains("range"));
}

#[test]
fn iteration_is_range_only() {
    let err = check_err("def f(s: str) -> int32:\n    for c in s:\n        pass\n    return 0\n");
    assert!(err.message.contains("range"));
}

#[test]
fn lambdas_need_a_function_annotation_and_cannot_capture() {
    check("def f() -> int32:\n    double: Fn[int32, int32] = lambda x: x * 2\n    return double(21)\n");
    let err = check_err(
        "def f() -> int32:\n    n: int32 = 2\n    g: Fn[int32, int32] = lambda x: x * n\n    return g(1)\n",
    );
    assert!(err.message.contains("capture"));
}

#[test]
fn match_patterns_check_against_the_scrutinee() {
    check(
        "def f(x: int32) -> int32:\n    match x:\n        case 0:\n            return 1\n        case other:\n            return other\n    return 0\n",
    );
    let err = check_err(
        "def f(x: int32) -> int32:\n    match x:\n        case \"nope\":\n            return 1\n    return 0\n",
    );
    assert_eq!(err.stage, Stage::Type);
}

#[test]
fn intrinsics_resolve_without_declarations() {
    check(
        "def f() -> int32:\n    state: uint32 = critical_enter()\n    critical_exit(state)\n    wfi()\n    return abs(-3) + min(1, 2) + max(3, 4)\n",
    );
}

#[test]
fn runtime_abi_symbols_are_known_externs() {
    check(
        "def f() -> int32:\n    uart_init()\n    uart_putc(65)\n    print_newline()\n    return uart_getc()\n",
    );
}

#[test]
fn bitfield_intrinsics_gated_by_target() {
    let m0 = CompileOptions {
        target: Target::CortexM0Plus,
        ..Default::default()
    };
    let err = check_source("def f(x: uint32) -> uint32:\n    return bits_get(x, 4, 8)\n", &m0)
        .unwrap_err();
    assert!(err.message.contains("cortex-m0plus"));
    check("def f(x: uint32) -> uint32:\n    return bits_get(x, 4, 8)\n");
}

#[test]
fn duplicate_definitions_are_rejected() {
    let err = check_err("def f() -> int32:\n    return 0\ndef f() -> int32:\n    return 1\n");
    assert!(err.message.contains("duplicate"));
}

#[test]
fn imports_record_symbols_without_verification() {
    check("from kernel import start\ndef f() -> int32:\n    return start(1, 2, 3)\n");
    check("import drivers.uart as uart\ndef f() -> int32:\n    return uart.flush()\n");
}
