//! Error types for context construction, trapped exceptions and parsing.

use thiserror::Error;

/// A malformed [`Context`](crate::Context) was detected at construction
/// time. These errors are never deferred to the point of use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The requested precision is outside `[PREC_MIN, PREC_MAX]`.
    #[error("precision {got} is outside the supported range [2, 2^31]")]
    InvalidPrecision { got: usize },
    /// The exponent bounds are inverted or outside `[EMIN_MIN, EMAX_MAX]`.
    #[error("invalid exponent range [{emin}, {emax}]")]
    InvalidExponentRange { emin: i64, emax: i64 },
}

/// Failure to interpret a decimal string as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("invalid character {0:?} in number")]
    InvalidChar(char),
    #[error("malformed exponent")]
    BadExponent,
}

/// An arithmetic or conversion operation failed.
///
/// The trap variants are raised by [`record_operation`]
/// (crate::flags::FlagRegister::record_operation) when a fired exception
/// flag is listed in the effective context's trap set; the flag is then
/// *not* recorded in the register and the numeric result is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("inexact result")]
    Inexact,
    #[error("overflow")]
    Overflow,
    #[error("underflow")]
    Underflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid operation")]
    InvalidOperation,
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}
