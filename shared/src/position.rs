/*!
Logical shutter position and the single-byte command protocol.

The device understands exactly two commands and never answers:

| Byte   | Char | Logical position |
|--------|------|------------------|
| `0x41` | `A`  | 1 (open)         |
| `0x40` | `@`  | 0 (closed)       |
*/

use crate::protocol::{CLOSE_COMMAND, OPEN_COMMAND};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary shutter position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Position {
    #[default]
    Closed = 0,
    Open = 1,
}

impl Position {
    /// Quantize an arbitrary host value to a binary position.
    ///
    /// Anything strictly greater than zero is `Open`; zero, negative values
    /// and values that do not compare (NaN) are `Closed`. Fractional and
    /// out-of-range inputs are clamped silently rather than rejected.
    pub fn from_value<T: Zero + PartialOrd>(target: T) -> Self {
        if target > T::zero() {
            Self::Open
        } else {
            Self::Closed
        }
    }

    /// Command byte that drives the shutter to this position
    pub fn command_byte(self) -> u8 {
        match self {
            Self::Open => OPEN_COMMAND,
            Self::Closed => CLOSE_COMMAND,
        }
    }

    /// Logical complement
    pub fn toggled(self) -> Self {
        match self {
            Self::Open => Self::Closed,
            Self::Closed => Self::Open,
        }
    }

    /// Position as the host framework's actuator value
    pub fn value(self) -> f64 {
        self as u8 as f64
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_asymmetric() {
        assert_eq!(Position::from_value(1.0), Position::Open);
        assert_eq!(Position::from_value(0.2), Position::Open);
        assert_eq!(Position::from_value(42), Position::Open);
        assert_eq!(Position::from_value(0.0), Position::Closed);
        assert_eq!(Position::from_value(-0.0), Position::Closed);
        assert_eq!(Position::from_value(-5), Position::Closed);
        assert_eq!(Position::from_value(-0.7), Position::Closed);
        assert_eq!(Position::from_value(f64::NAN), Position::Closed);
    }

    #[test]
    fn test_command_bytes() {
        assert_eq!(Position::Open.command_byte(), 0x41);
        assert_eq!(Position::Closed.command_byte(), 0x40);
    }

    #[test]
    fn test_toggle_and_value() {
        assert_eq!(Position::Closed.toggled(), Position::Open);
        assert_eq!(Position::Open.toggled(), Position::Closed);
        assert_eq!(Position::Open.value(), 1.0);
        assert_eq!(Position::Closed.value(), 0.0);
        assert_eq!(Position::default(), Position::Closed);
    }
}
