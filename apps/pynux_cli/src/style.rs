//! ANSI terminal styling for CLI messages.
//!
//! Compiler diagnostics are printed verbatim (the single-line format is a
//! machine contract); styling applies only to auxiliary CLI messages such
//! as I/O failures. Colors are suppressed when `NO_COLOR` is set.

/// ANSI escape code wrappers.
pub struct Style;

impl Style {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const RED: &'static str = "\x1b[31m";
    pub const CYAN: &'static str = "\x1b[36m";

    fn enabled() -> bool {
        std::env::var_os("NO_COLOR").is_none()
    }

    pub fn bold_red(s: &str) -> String {
        if Self::enabled() {
            format!("{}{}{}{}", Self::BOLD, Self::RED, s, Self::RESET)
        } else {
            s.to_string()
        }
    }

    pub fn cyan(s: &str) -> String {
        if Self::enabled() {
            format!("{}{}{}", Self::CYAN, s, Self::RESET)
        } else {
            s.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styled_text_contains_the_message() {
        assert!(Style::bold_red("error").contains("error"));
        assert!(Style::cyan("note").contains("note"));
    }
}
