//! Target CPU selection.
//!
//! The target controls the `.cpu` directive, which instruction encodings the
//! generator may emit, and which intrinsics the checker accepts. Everything
//! emitted elsewhere sticks to the Thumb subset common to all three cores;
//! the differences are confined to what this module reports.

use std::fmt;
use std::str::FromStr;

/// A supported Cortex-M core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// ARMv7-M, full Thumb-2. The mps2-an385 board model.
    #[default]
    CortexM3,
    /// ARMv6-M, 16-bit Thumb only. RP2040.
    CortexM0Plus,
    /// ARMv7E-M. STM32F4 (the FPU is not used).
    CortexM4,
}

impl Target {
    /// The operand of the emitted `.cpu` directive.
    pub fn cpu_directive(self) -> &'static str {
        match self {
            Target::CortexM3 => "cortex-m3",
            Target::CortexM0Plus => "cortex-m0plus",
            Target::CortexM4 => "cortex-m4",
        }
    }

    /// Whether wide Thumb-2 encodings (`ldrex`, `ubfx`, `pop {…, lr}`) exist.
    pub fn has_thumb2(self) -> bool {
        !matches!(self, Target::CortexM0Plus)
    }

    /// Exclusive-monitor atomics (`ldrex`/`strex`/`clrex`).
    pub fn has_exclusives(self) -> bool {
        self.has_thumb2()
    }

    /// Bitfield extract/insert (`ubfx`/`bfi`).
    pub fn has_bitfield(self) -> bool {
        self.has_thumb2()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cpu_directive())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cortex-m3" => Ok(Target::CortexM3),
            "cortex-m0plus" => Ok(Target::CortexM0Plus),
            "cortex-m4" => Ok(Target::CortexM4),
            other => Err(format!(
                "unknown target '{}' (expected cortex-m3, cortex-m0plus, or cortex-m4)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_match_names() {
        assert_eq!(Target::CortexM3.cpu_directive(), "cortex-m3");
        assert_eq!("cortex-m0plus".parse::<Target>(), Ok(Target::CortexM0Plus));
    }

    #[test]
    fn m0plus_has_no_wide_encodings() {
        assert!(!Target::CortexM0Plus.has_thumb2());
        assert!(!Target::CortexM0Plus.has_exclusives());
        assert!(Target::CortexM4.has_exclusives());
    }

    #[test]
    fn unknown_target_is_rejected() {
        assert!("cortex-a53".parse::<Target>().is_err());
    }
}
