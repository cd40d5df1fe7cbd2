//! # pynux-base
//!
//! Structural atoms for the pynux compiler.
//!
//! This crate provides the foundational types shared by every stage of the
//! compilation pipeline:
//!
//! - [`Arena`] — bump allocation for stable AST references
//! - [`Interner`]/[`Symbol`] — string interning for O(1) name equality
//! - [`Span`]/[`LineMap`] — source location tracking and line/column lookup
//! - [`Diagnostic`]/[`Result`] — stage-tagged errors with source positions
//!
//! # Design Principles
//!
//! This crate has **no knowledge of the Pynux language or of ARM assembly**.
//! It provides only generic, reusable infrastructure. Everything here is
//! per-compilation-unit state: a fresh [`Arena`] and [`Interner`] are created
//! for each source file and dropped after emission, which keeps the compiler
//! free of global mutable state and bit-for-bit reproducible.
//!
//! # Example
//!
//! ```
//! use pynux_base::{Arena, Interner, LineMap, Span};
//!
//! let arena: Arena<u32> = Arena::new();
//! let mut interner = Interner::new();
//!
//! let name = interner.intern("kernel_main");
//! assert_eq!(interner.resolve(name), "kernel_main");
//!
//! let map = LineMap::new("def main():\n    pass\n");
//! assert_eq!(map.locate(Span::new(16, 20).start), (2, 5));
//!
//! let slot = arena.alloc(42);
//! assert_eq!(*slot, 42);
//! ```

pub mod arena;
pub mod error;
pub mod intern;
pub mod span;

pub use arena::Arena;
pub use error::{Diagnostic, Result, Stage};
pub use intern::{Interner, Symbol};
pub use span::{LineMap, Span};
