//! # pynux-compile
//!
//! The back half of the Pynux compiler: semantic analysis and ARM Thumb-2
//! code generation for bare-metal Cortex-M targets.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ source → Lexer → Parser → AST   (pynux-language)         │
//! │               ↓                                          │
//! │       check_module  → CheckedModule   (analysis)         │
//! │               ↓                                          │
//! │       codegen_unit  → GAS assembly    (codegen)          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! [`compile_source`] runs the whole pipeline for one translation unit;
//! [`check_source`] stops after the checker.
//!
//! # Runtime ABI
//!
//! The generator emits *call sites* against a fixed helper set provided by
//! the hand-written assembly runtime, and never emits the helpers
//! themselves:
//!
//! | Symbols | Purpose |
//! |---|---|
//! | `uart_init` `uart_putc` `uart_getc` `uart_available` | serial I/O |
//! | `print_str` `print_int` `print_hex` `print_newline` | formatted output |
//! | `__aeabi_idiv` `__aeabi_idivmod` `__aeabi_uidivmod` `__pynux_pow` | division, power |
//! | `malloc` | bump allocation (`free` is a no-op and never relied upon) |
//! | `__pynux_strlen` `…strcmp` `…strcpy` `…strcat` `…memcpy` `…memset` | C-library equivalents |
//! | `__pynux_str_upper` … `__pynux_str_isalpha` | string methods |
//! | `__pynux_slice` `__pynux_in` `__pynux_read_line` | slicing, membership, line input |
//! | `__pynux_dict_get_int` `…set_int` `…get_str` | dict layout `[count, k, v, …]` |
//! | `__pynux_assert_fail` `…_msg` `__pynux_raise` | assertion / raise stubs |
//! | `__pynux_context_enter` `__pynux_context_exit` | `with`-statement hooks |
//!
//! All calls follow AAPCS: first four words in `r0..r3`, the rest on the
//! stack with `arg[4]` at `[sp, #0]`, `sp` 8-byte aligned at every `bl`,
//! results in `r0` (`r0:r1` for 64-bit).

pub mod analysis;
pub mod codegen;
pub mod compile;
pub mod diagnostic;
pub mod optimize;
pub mod target;

pub use compile::{check_source, compile_source, CompileOptions};
pub use diagnostic::RenderedDiagnostic;
pub use target::Target;
