//! Pynux compiler driver - standalone binary.
//!
//! The binary is a thin wrapper around [`pynux_cli::run_cli`]; all command
//! logic lives in the library crate for testability.
//!
//! # Exit Codes
//!
//! - `0` - Success
//! - `1` - Error (one-line diagnostic printed to stderr)

fn main() {
    if let Err(e) = pynux_cli::run_cli() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
