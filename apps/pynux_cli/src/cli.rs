//! Command-line interface for `pynuxc`.
//!
//! Argument parsing is built on [`clap`] derive macros; each variant of
//! [`Commands`] maps to one handler. Compiler diagnostics pass through
//! untouched in the `<file>:<line>:<col>: <stage>: <message>` format (or as
//! single-line JSON with `--error-format=json`); only I/O failures get the
//! styled `error:` prefix.
//!
//! # Examples
//!
//! ```bash
//! # Compile to the default output path (input with a .s extension)
//! pynuxc compile shell.py
//!
//! # Cross-target, explicit output
//! pynuxc compile boot.py -o boot.s --target=cortex-m0plus
//!
//! # Type-check only, machine-readable errors
//! pynuxc check kernel.py --error-format=json
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use pynux_compile::{check_source, compile_source, CompileOptions, RenderedDiagnostic, Target};

use crate::style::Style;

/// Top-level argument parser for `pynuxc`.
#[derive(Parser)]
#[command(name = "pynuxc")]
#[command(about = "The Pynux compiler", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// How diagnostics are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ErrorFormat {
    /// `<file>:<line>:<col>: <stage>: <message>`
    #[default]
    Plain,
    /// The same fields as one JSON object per line.
    Json,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Compile one source file to ARM Thumb-2 assembly.
    ///
    /// Reads `<INPUT>` and writes GAS-syntax assembly, by default next to
    /// the input with a `.s` extension. The output is linkable against the
    /// Pynux assembly runtime.
    Compile {
        /// The source file (conventionally `.py`).
        input: PathBuf,

        /// Output path for the assembly file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target core; controls the `.cpu` directive and which intrinsics
        /// are legal.
        #[arg(long, default_value = "cortex-m3")]
        target: Target,

        /// Diagnostic output format.
        #[arg(long, value_enum, default_value = "plain")]
        error_format: ErrorFormat,

        /// Interleave `@ line N` source markers into the assembly.
        #[arg(long)]
        line_comments: bool,
    },

    /// Parse and type-check without emitting assembly.
    ///
    /// Prints nothing on success; exits non-zero with a diagnostic on the
    /// first error.
    Check {
        /// The source file to check.
        input: PathBuf,

        /// Target core (affects intrinsic availability).
        #[arg(long, default_value = "cortex-m3")]
        target: Target,

        /// Diagnostic output format.
        #[arg(long, value_enum, default_value = "plain")]
        error_format: ErrorFormat,
    },
}

/// A CLI failure, already formatted for stderr.
#[derive(Debug)]
pub enum CliError {
    /// A compiler diagnostic, rendered in the requested format.
    Diagnostic(String),
    /// An I/O failure outside the compiler core.
    Io(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Diagnostic(line) => f.write_str(line),
            CliError::Io(message) => {
                write!(f, "{}: {}", Style::bold_red("error"), message)
            }
        }
    }
}

impl std::error::Error for CliError {}

/// Parses arguments and dispatches to the command handlers.
pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            input,
            output,
            target,
            error_format,
            line_comments,
        } => compile_command(&input, output, target, error_format, line_comments),
        Commands::Check {
            input,
            target,
            error_format,
        } => check_command(&input, target, error_format),
    }
}

/// The `compile` subcommand: one `.py` in, one `.s` out.
pub fn compile_command(
    input: &Path,
    output: Option<PathBuf>,
    target: Target,
    error_format: ErrorFormat,
    line_comments: bool,
) -> Result<(), CliError> {
    let source = read_input(input)?;
    let file_name = input.to_string_lossy();
    let options = CompileOptions {
        target,
        line_comments,
    };

    let asm = compile_source(&source, &file_name, &options)
        .map_err(|diag| render(&file_name, &source, &diag, error_format))?;

    let out_path = output.unwrap_or_else(|| input.with_extension("s"));
    fs::write(&out_path, asm).map_err(|e| {
        CliError::Io(format!("cannot write {}: {}", out_path.display(), e))
    })?;
    println!("{}", out_path.display());
    Ok(())
}

/// The `check` subcommand: pipeline through the checker, no output file.
pub fn check_command(
    input: &Path,
    target: Target,
    error_format: ErrorFormat,
) -> Result<(), CliError> {
    let source = read_input(input)?;
    let file_name = input.to_string_lossy();
    let options = CompileOptions {
        target,
        line_comments: false,
    };
    check_source(&source, &options)
        .map_err(|diag| render(&file_name, &source, &diag, error_format))
}

fn read_input(input: &Path) -> Result<String, CliError> {
    fs::read_to_string(input)
        .map_err(|e| CliError::Io(format!("cannot read {}: {}", input.display(), e)))
}

fn render(
    file: &str,
    source: &str,
    diag: &pynux_base::Diagnostic,
    format: ErrorFormat,
) -> CliError {
    let rendered = RenderedDiagnostic::new(file, source, diag);
    CliError::Diagnostic(match format {
        ErrorFormat::Plain => rendered.plain(),
        ErrorFormat::Json => rendered.json(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_source(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn compile_writes_assembly_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_source(&dir, "hello.py", "def main() -> int32:\n    return 0\n");
        compile_command(&input, None, Target::CortexM3, ErrorFormat::Plain, false).unwrap();
        let out = dir.path().join("hello.s");
        let asm = fs::read_to_string(out).unwrap();
        assert!(asm.contains(".cpu cortex-m3"));
        assert!(asm.contains(".global main"));
    }

    #[test]
    fn compile_honors_explicit_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_source(&dir, "a.py", "def main() -> int32:\n    return 0\n");
        let out = dir.path().join("custom.s");
        compile_command(
            &input,
            Some(out.clone()),
            Target::CortexM3,
            ErrorFormat::Plain,
            false,
        )
        .unwrap();
        assert!(out.exists());
    }

    #[test]
    fn diagnostics_carry_position_and_stage() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_source(&dir, "bad.py", "def main() -> int32:\n    return nope\n");
        let err = check_command(&input, Target::CortexM3, ErrorFormat::Plain).unwrap_err();
        let CliError::Diagnostic(line) = err else {
            panic!("expected a diagnostic");
        };
        assert!(line.contains("bad.py:2:"));
        assert!(line.contains(": type: "));
        assert!(line.contains("nope"));
    }

    #[test]
    fn json_diagnostics_are_one_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_source(&dir, "bad.py", "x = $\n");
        let err = check_command(&input, Target::CortexM3, ErrorFormat::Json).unwrap_err();
        let CliError::Diagnostic(line) = err else {
            panic!("expected a diagnostic");
        };
        assert!(line.starts_with('{'));
        assert!(line.contains("\"stage\":\"lex\""));
    }

    #[test]
    fn check_leaves_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_source(&dir, "ok.py", "def main() -> int32:\n    return 0\n");
        check_command(&input, Target::CortexM3, ErrorFormat::Plain).unwrap();
        assert!(!dir.path().join("ok.s").exists());
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let err = check_command(
            Path::new("/nonexistent/nope.py"),
            Target::CortexM3,
            ErrorFormat::Plain,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
