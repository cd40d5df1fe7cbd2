//! # pynux-cli
//!
//! Library backing the `pynuxc` binary. The binary in `main.rs` is a thin
//! wrapper around [`run_cli`]; keeping the command handlers here makes them
//! unit-testable without spawning processes.
//!
//! # CLI Surface
//!
//! ```text
//! pynuxc compile <input.py> [-o <out.s>] [--target=<t>]
//!                [--error-format=<plain|json>] [--line-comments]
//! pynuxc check   <input.py> [--target=<t>] [--error-format=<plain|json>]
//! ```
//!
//! Exit code 0 on success; 1 with a one-line diagnostic on any error. The
//! compiler core is pure (no network, environment, or persisted state); the
//! CLI's only side effects are reading the input and writing the output.

pub mod cli;
pub mod style;

pub use cli::{run_cli, Cli, CliError, Commands, ErrorFormat};
