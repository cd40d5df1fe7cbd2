//! End-to-end lowering of the wider language surface: aggregates, classes,
//! control-flow sugar, intrinsics, and inline assembly.

use pynux_compile::{compile_source, CompileOptions};

fn compile(src: &str) -> String {
    compile_source(src, "features.py", &CompileOptions::default()).expect("compile failure")
}

#[test]
fn struct_fields_lower_to_base_plus_offset() {
    let asm = compile(
        "struct Point:\n    x: int32\n    y: int32\ndef main() -> int32:\n    p: Point = Point{x=3, y=4}\n    return p.x + p.y\n",
    );
    // y lives at offset 4 from the struct base.
    assert!(asm.contains("adds r2, #4") || asm.contains("adds r0, #4"), "{}", asm);
}

#[test]
fn packed_structs_drop_padding() {
    let asm = compile(
        "@packed\nstruct Wire:\n    tag: uint8\n    value: uint32\ndef main() -> int32:\n    w: Wire\n    w.value = 5\n    return 0\n",
    );
    // value sits at offset 1, reachable only without padding.
    assert!(asm.contains("adds r0, #1"), "{}", asm);
}

#[test]
fn union_fields_share_offset_zero() {
    let asm = compile(
        "union Raw:\n    word: uint32\n    byte: uint8\ndef main() -> int32:\n    r: Raw\n    r.word = 258\n    return 0\n",
    );
    assert!(!asm.contains("adds r0, #4"));
}

#[test]
fn class_methods_become_prefixed_free_functions() {
    let asm = compile(
        "class Counter:\n    value: int32\n    def bump(self) -> int32:\n        return self.value + 1\ndef main() -> int32:\n    c: Counter = Counter{value=41}\n    return c.bump()\n",
    );
    assert!(asm.contains("Counter_bump:"));
    assert!(asm.contains("bl Counter_bump"));
}

#[test]
fn constructor_mallocs_and_runs_init() {
    let asm = compile(
        "class Task:\n    id: int32\n    def __init__(self, id: int32):\n        self.id = id\ndef main() -> int32:\n    t: Ptr[Task] = Task(7)\n    return t.id\n",
    );
    assert!(asm.contains("bl malloc"));
    assert!(asm.contains("bl Task___init__"));
}

#[test]
fn derived_class_reaches_base_fields_by_flattened_offset() {
    let asm = compile(
        "class Animal:\n    legs: int32\nclass Dog(Animal):\n    tail: int32\ndef main() -> int32:\n    d: Dog = Dog{legs=4, tail=1}\n    return d.tail\n",
    );
    // tail follows the flattened base field.
    assert!(asm.contains("adds r0, #4"), "{}", asm);
}

#[test]
fn match_lowers_to_a_compare_chain() {
    let asm = compile(
        "def classify(x: int32) -> int32:\n    match x:\n        case 0:\n            return 100\n        case 1:\n            return 200\n        case _:\n            return 300\n    return 0\n",
    );
    assert!(asm.matches("cmp r0, r1").count() >= 2, "{}", asm);
}

#[test]
fn string_match_arms_use_strcmp() {
    let asm = compile(
        "def dispatch(cmd: str) -> int32:\n    match cmd:\n        case \"help\":\n            return 1\n        case _:\n            return 0\n    return 0\n",
    );
    assert!(asm.contains("bl __pynux_strcmp"));
}

#[test]
fn with_statement_pairs_enter_and_exit() {
    let asm = compile(
        "def main() -> int32:\n    dev: Ptr[uint32] = cast[Ptr[uint32]](1073741824)\n    with dev as held:\n        print_int(1)\n    return 0\n",
    );
    let enter = asm.find("bl __pynux_context_enter").expect("enter call");
    let exit = asm.find("bl __pynux_context_exit").expect("exit call");
    assert!(enter < exit);
}

#[test]
fn try_emits_structure_and_raise_calls_the_stub() {
    let asm = compile(
        "def main() -> int32:\n    try:\n        raise\n    except:\n        print_int(0)\n    finally:\n        print_int(1)\n    return 0\n",
    );
    assert!(asm.contains("bl __pynux_raise"));
    // Handler body is emitted even though nothing branches to it yet.
    assert!(asm.contains("bl print_int"));
}

#[test]
fn assert_expands_to_a_guarded_fail_call() {
    let asm = compile("def main() -> int32:\n    assert 1 == 1, \"broken\"\n    return 0\n");
    assert!(asm.contains("bl __pynux_assert_fail_msg"));
    let asm2 = compile("def main() -> int32:\n    x: int32 = 1\n    assert x > 0\n    return 0\n");
    assert!(asm2.contains("bl __pynux_assert_fail\n") || asm2.contains("bl __pynux_assert_fail"));
}

#[test]
fn fstrings_print_fragmentwise() {
    let asm = compile(
        "def main() -> int32:\n    x: int32 = 42\n    f\"x={x}!\"\n    return 0\n",
    );
    assert!(asm.matches("bl print_str").count() >= 2);
    assert!(asm.contains("bl print_int"));
}

#[test]
fn print_appends_a_newline() {
    let asm = compile("def main() -> int32:\n    print(7)\n    return 0\n");
    assert!(asm.contains("bl print_int"));
    assert!(asm.contains("bl print_newline"));
}

#[test]
fn inline_asm_is_verbatim() {
    let asm = compile(
        "def main() -> int32:\n    asm(\"\"\"\nmov r0, #42\nnop\n\"\"\")\n    return 0\n",
    );
    assert!(asm.contains("\nmov r0, #42\n"));
    assert!(asm.contains("\nnop\n"));
}

#[test]
fn membership_calls_the_in_helper() {
    let asm = compile(
        "def main() -> int32:\n    s: str = \"hello\"\n    c: char = s[0]\n    if c in s:\n        return 1\n    return 0\n",
    );
    assert!(asm.contains("bl __pynux_in"));
}

#[test]
fn string_methods_route_to_their_helpers() {
    let asm = compile(
        "def main() -> int32:\n    s: str = \" Hi \"\n    t: str = s.strip()\n    if s.startswith(\" \"):\n        return 1\n    return 0\n",
    );
    assert!(asm.contains("bl __pynux_str_strip"));
    assert!(asm.contains("bl __pynux_str_startswith"));
}

#[test]
fn critical_sections_save_and_restore_primask() {
    let asm = compile(
        "def main() -> int32:\n    state: uint32 = critical_enter()\n    critical_exit(state)\n    return 0\n",
    );
    assert!(asm.contains("mrs r0, primask"));
    assert!(asm.contains("cpsid i"));
    assert!(asm.contains("msr primask, r0"));
}

#[test]
fn atomics_emit_exclusive_loops() {
    let asm = compile(
        "counter: uint32 = 0\ndef main() -> int32:\n    global counter\n    atomic_add(&counter, 1)\n    return 0\n",
    );
    assert!(asm.contains("ldrex"));
    assert!(asm.contains("strex"));
}

#[test]
fn barrier_intrinsics_are_bare_instructions() {
    let asm = compile("def main() -> int32:\n    dmb()\n    dsb()\n    isb()\n    wfi()\n    return 0\n");
    for op in ["dmb", "dsb", "isb", "wfi"] {
        assert!(asm.contains(&format!("\n    {}\n", op)), "missing {}", op);
    }
}

#[test]
fn comprehension_fills_a_heap_list() {
    let asm = compile(
        "def main() -> int32:\n    squares: List[int32] = [i * i for i in range(5)]\n    return len(squares)\n",
    );
    assert!(asm.contains("bl malloc"));
    // len() on a list reads the count word.
    assert!(asm.contains("ldr r0, [r0]"));
}

#[test]
fn lambdas_emit_private_functions() {
    let asm = compile(
        "def main() -> int32:\n    double: Fn[int32, int32] = lambda x: x * 2\n    return double(21)\n",
    );
    assert!(asm.contains("__lambda_0:"));
    assert!(asm.contains("blx r4"));
}

#[test]
fn volatile_globals_still_emit_storage() {
    let asm = compile("reg: volatile uint32 = 0\ndef main() -> int32:\n    return 0\n");
    assert!(asm.contains("reg:"));
}

#[test]
fn runtime_global_initializers_go_through_init_unit() {
    let asm = compile_source(
        "def seed() -> int32:\n    return 42\nstate: int32 = seed()\ndef main() -> int32:\n    return state\n",
        "boot.py",
        &CompileOptions::default(),
    )
    .unwrap();
    assert!(asm.contains("__init_boot:"));
    assert!(asm.contains("bl __init_boot"));
    assert!(asm.contains("bl seed"));
}

#[test]
fn sixty_four_bit_addition_uses_carry_chains() {
    let asm = compile(
        "def main() -> int32:\n    a: int64 = 1\n    b: int64 = 2\n    c: int64 = a + b\n    return 0\n",
    );
    assert!(asm.contains("adcs"));
}
