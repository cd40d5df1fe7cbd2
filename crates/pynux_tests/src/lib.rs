//! Integration test crate for the pynux workspace.
//!
//! The crate body is empty; everything lives in `tests/`, exercising the
//! public API of the language and compile crates end-to-end: the lexer
//! round-trip, parser determinism, checker soundness, and the assembly
//! contract of the code generator (calling convention, string interning,
//! stack alignment, layout stability).
