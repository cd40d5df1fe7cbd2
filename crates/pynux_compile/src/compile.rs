//! The per-translation-unit pipeline driver.
//!
//! One call runs the whole compiler for one source file:
//!
//! ```text
//! source ──Lexer──▶ tokens ──Parser──▶ AST ──check_module──▶ CheckedModule
//!                                                         │
//!                                              codegen_unit ──▶ .s text
//! ```
//!
//! Each invocation owns a fresh interner and arena, so compiling files in
//! parallel from separate threads needs no coordination and the output is
//! bit-for-bit reproducible for identical input and options.

use std::path::Path;

use pynux_base::{Interner, Result};
use pynux_language::{AstContext, Lexer, Parser};

use crate::analysis::check_module;
use crate::codegen::{codegen_unit, EmitOptions};
use crate::target::Target;

/// Options shared by `compile` and `check`.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub target: Target,
    /// Interleave `@ line N` comments into the emitted assembly.
    pub line_comments: bool,
}

/// Compiles one source file to assembly text.
///
/// `file_name` is used only to derive the unit name (for the synthetic
/// `__init_<unit>` symbol); diagnostics carry byte spans and are rendered
/// against the file name by the caller.
pub fn compile_source(source: &str, file_name: &str, options: &CompileOptions) -> Result<String> {
    let mut interner = Interner::new();
    let ctx = AstContext::new();

    let tokens = Lexer::new(source, &mut interner).tokenize()?;
    let module = Parser::new(&tokens, &ctx, &mut interner).parse_module()?;
    let checked = check_module(module, &mut interner, options.target)?;
    codegen_unit(
        &checked,
        &interner,
        source,
        &EmitOptions {
            target: options.target,
            unit_name: &unit_name(file_name),
            line_comments: options.line_comments,
        },
    )
}

/// Runs the pipeline through the type checker without emitting assembly.
pub fn check_source(source: &str, options: &CompileOptions) -> Result<()> {
    let mut interner = Interner::new();
    let ctx = AstContext::new();

    let tokens = Lexer::new(source, &mut interner).tokenize()?;
    let module = Parser::new(&tokens, &ctx, &mut interner).parse_module()?;
    check_module(module, &mut interner, options.target)?;
    Ok(())
}

/// The unit name: the file stem, as it appears in `__init_<unit>`.
pub fn unit_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unit")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> String {
        compile_source(source, "test.py", &CompileOptions::default()).expect("compile failure")
    }

    fn compile_err(source: &str) -> pynux_base::Diagnostic {
        compile_source(source, "test.py", &CompileOptions::default())
            .expect_err("expected a diagnostic")
    }

    #[test]
    fn empty_source_produces_directives_only() {
        let asm = compile("");
        assert!(asm.contains(".syntax unified"));
        assert!(asm.contains(".cpu cortex-m3"));
        assert!(asm.contains(".thumb"));
        assert!(!asm.contains("main:"));
    }

    #[test]
    fn comment_only_source_is_empty_too() {
        let asm = compile("# just a comment\n\n# another\n");
        assert!(!asm.contains(".text\n    push"));
    }

    #[test]
    fn hello_world_calls_print_str() {
        let asm = compile("def main() -> int32:\n    print_str(\"Hi!\\n\")\n    return 0\n");
        assert!(asm.contains(".global main"));
        assert!(asm.contains("bl print_str"));
        assert!(asm.contains(".asciz \"Hi!\\n\""));
        assert!(asm.contains("push {r4, r5, r6, r7, lr}"));
        assert!(asm.contains("pop {r4, r5, r6, r7, pc}"));
    }

    #[test]
    fn add_function_uses_stack_discipline() {
        let asm = compile(
            "def add(a: int32, b: int32) -> int32:\n    return a + b\ndef main() -> int32:\n    print_int(add(2, 40))\n    return 0\n",
        );
        assert!(asm.contains(".global add"));
        assert!(asm.contains("bl add"));
        assert!(asm.contains("bl print_int"));
        assert!(asm.contains("adds r0, r1, r0"));
    }

    #[test]
    fn signed_division_calls_aeabi() {
        let asm = compile(
            "def main() -> int32:\n    x: int32 = -10\n    y: int32 = 3\n    print_int(x / y)\n    return 0\n",
        );
        assert!(asm.contains("bl __aeabi_idiv"));
    }

    #[test]
    fn string_slicing_calls_helper_with_sentinels() {
        let asm = compile(
            "def main() -> int32:\n    s: Ptr[char] = \"abcdef\"\n    print_str(s[1:4:1])\n    return 0\n",
        );
        assert!(asm.contains("bl __pynux_slice"));
    }

    #[test]
    fn global_assignment_via_global_stmt() {
        let asm = compile(
            "c: int32 = 0\ndef main() -> int32:\n    global c\n    c = 7\n    print_int(c)\n    return 0\n",
        );
        assert!(asm.contains(".global c"));
        assert!(asm.contains("ldr r2, =c"));
    }

    #[test]
    fn identical_strings_share_one_label() {
        let asm = compile(
            "def main() -> int32:\n    print_str(\"same\")\n    print_str(\"same\")\n    return 0\n",
        );
        assert_eq!(asm.matches(".asciz \"same\"").count(), 1);
        assert!(asm.contains(".LC0"));
        assert!(!asm.contains(".LC1"));
    }

    #[test]
    fn compilation_is_deterministic() {
        let src = "def main() -> int32:\n    for i in range(3):\n        print_int(i)\n    return 0\n";
        assert_eq!(compile(src), compile(src));
    }

    #[test]
    fn kernel_main_gets_main_alias() {
        let asm = compile("def kernel_main() -> int32:\n    return 0\n");
        assert!(asm.contains(".global kernel_main"));
        assert!(asm.contains(".global main"));
        assert!(asm.contains("main:"));
    }

    #[test]
    fn target_controls_cpu_directive() {
        let options = CompileOptions {
            target: Target::CortexM4,
            ..Default::default()
        };
        let asm = compile_source("def main() -> int32:\n    return 0\n", "t.py", &options).unwrap();
        assert!(asm.contains(".cpu cortex-m4"));
    }

    #[test]
    fn atomics_rejected_on_m0plus() {
        let options = CompileOptions {
            target: Target::CortexM0Plus,
            ..Default::default()
        };
        let err = compile_source(
            "def main() -> int32:\n    x: uint32 = 0\n    atomic_add(&x, 1)\n    return 0\n",
            "t.py",
            &options,
        )
        .unwrap_err();
        assert!(err.message.contains("cortex-m0plus"));
    }

    #[test]
    fn lex_errors_carry_the_lex_stage() {
        let err = compile_err("def main() -> int32:\n    s = \"oops\n");
        assert_eq!(err.stage, pynux_base::Stage::Lex);
    }

    #[test]
    fn type_errors_carry_the_type_stage() {
        let err = compile_err("def main() -> int32:\n    return missing\n");
        assert_eq!(err.stage, pynux_base::Stage::Type);
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn unit_name_strips_path_and_extension() {
        assert_eq!(unit_name("kernel/shell.py"), "shell");
        assert_eq!(unit_name("main.py"), "main");
    }
}
