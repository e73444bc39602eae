//! Arbitrary-precision binary floating point arithmetic with explicit,
//! composable control over precision, rounding mode and exponent range.
//!
//! The center of the crate is the [`Context`]: an immutable, possibly
//! partial bundle of numeric attributes. Contexts combine with a
//! right-biased [`merge`](Context::merge), and every thread carries a
//! stack of them whose top is the ambient *current context*. Operations
//! resolve their effective settings by merging the current context with
//! an optional per-call override, compute the exact result, round once,
//! and record the exceptions that fired in a sticky, thread-local
//! [flag register](FlagRegister) (or raise an error for flag kinds the
//! effective context traps).
//!
//! ```
//! use ctxfloat::{self as cf, Context, Flags, Float, RoundingMode, FP64};
//!
//! // 1/3 at the ambient 113 bits of precision.
//! let third = cf::div(&Float::from_u64(1), &Float::from_u64(3)).unwrap();
//! assert_eq!(third.precision(), 113);
//! assert!(cf::get_flags().contains(Flags::INEXACT));
//!
//! // The same division, scoped to binary64 with truncation.
//! {
//!     let _scope = cf::with_context(
//!         &FP64.with_rounding(RoundingMode::Zero),
//!     );
//!     let narrow = cf::div(&Float::from_u64(1), &Float::from_u64(3)).unwrap();
//!     assert_eq!(narrow.precision(), 53);
//! }
//! // The scope is gone; the default context is back.
//! assert_eq!(cf::get_current_context(), Context::DEFAULT);
//! ```

mod bigint;
mod cast;
mod context;
mod engine;
mod error;
mod flags;
mod ops;
mod stack;
mod string;
#[cfg(test)]
mod utils;
mod value;

pub use self::bigint::BigInt;
pub use self::context::{
    Context, RoundingMode, EMAX_MAX, EMIN_MIN, FP128, FP16, FP256, FP32,
    FP64, PREC_MAX, PREC_MIN,
};
pub use self::error::{ContextError, EvalError, ParseError};
pub use self::flags::{
    clear_flag, get_flags, raise_flag, set_flags, test_flag, FlagRegister,
    Flags,
};
pub use self::ops::{
    add, add_with, div, div_with, mul, mul_with, powi, powi_with, round,
    round_with, sqrt, sqrt_with, sub, sub_with,
};
pub use self::stack::{
    get_current_context, set_current_context, with_context, ContextGuard,
    ContextStack,
};
pub use self::string::{parse, parse_with};
pub use self::value::{Category, Float};
