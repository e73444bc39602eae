//! The public arithmetic operations.
//!
//! Every operation follows the same sequence: resolve the effective
//! context (the ambient current context with the optional per-call
//! override merged on top), hand the resolved numeric parameters to the
//! arithmetic kernel, fold the fired flags through the sticky register
//! (which turns trapped flags into errors), and return the result.
//!
//! Operands enter the computation exactly as constructed, whatever their
//! realized precision; precision is lost once, at the final rounding.
//! There is no implicit coercion: convert native operands up front with
//! the exact constructors on [`Float`].

use crate::context::Context;
use crate::engine::{self, Params};
use crate::error::EvalError;
use crate::flags::{self, Flags};
use crate::stack;
use crate::value::Float;

/// Resolves the effective context and extracts the numeric parameters and
/// trap set. Failure to resolve is a logic bug, not a user error: the
/// bottom of every context stack is total.
pub(crate) fn resolve_params(call: Option<&Context>) -> (Params, Flags) {
    let effective = stack::resolve(call);
    let params = match Params::from_context(&effective) {
        Some(p) => p,
        None => panic!("effective context is not total: {}", effective),
    };
    let traps = match effective.traps() {
        Some(t) => t,
        None => panic!("effective context is not total: {}", effective),
    };
    (params, traps)
}

fn unary(
    a: &Float,
    call: Option<&Context>,
    kernel: impl FnOnce(&Float, &Params) -> (Float, Flags),
) -> Result<Float, EvalError> {
    let (params, traps) = resolve_params(call);
    let (val, fired) = kernel(a, &params);
    flags::record_operation(fired, traps)?;
    Ok(val)
}

fn binary(
    a: &Float,
    b: &Float,
    call: Option<&Context>,
    kernel: impl FnOnce(&Float, &Float, &Params) -> (Float, Flags),
) -> Result<Float, EvalError> {
    let (params, traps) = resolve_params(call);
    let (val, fired) = kernel(a, b, &params);
    flags::record_operation(fired, traps)?;
    Ok(val)
}

/// Computes `a + b` under the current context.
pub fn add(a: &Float, b: &Float) -> Result<Float, EvalError> {
    binary(a, b, None, engine::add)
}

/// Computes `a + b` under the current context merged with `ctx`.
pub fn add_with(a: &Float, b: &Float, ctx: &Context) -> Result<Float, EvalError> {
    binary(a, b, Some(ctx), engine::add)
}

/// Computes `a - b` under the current context.
pub fn sub(a: &Float, b: &Float) -> Result<Float, EvalError> {
    binary(a, b, None, engine::sub)
}

/// Computes `a - b` under the current context merged with `ctx`.
pub fn sub_with(a: &Float, b: &Float, ctx: &Context) -> Result<Float, EvalError> {
    binary(a, b, Some(ctx), engine::sub)
}

/// Computes `a * b` under the current context.
pub fn mul(a: &Float, b: &Float) -> Result<Float, EvalError> {
    binary(a, b, None, engine::mul)
}

/// Computes `a * b` under the current context merged with `ctx`.
pub fn mul_with(a: &Float, b: &Float, ctx: &Context) -> Result<Float, EvalError> {
    binary(a, b, Some(ctx), engine::mul)
}

/// Computes `a / b` under the current context.
pub fn div(a: &Float, b: &Float) -> Result<Float, EvalError> {
    binary(a, b, None, engine::div)
}

/// Computes `a / b` under the current context merged with `ctx`.
pub fn div_with(a: &Float, b: &Float, ctx: &Context) -> Result<Float, EvalError> {
    binary(a, b, Some(ctx), engine::div)
}

/// Computes the square root of `a` under the current context.
pub fn sqrt(a: &Float) -> Result<Float, EvalError> {
    unary(a, None, engine::sqrt)
}

/// Computes the square root of `a` under the current context merged with
/// `ctx`.
pub fn sqrt_with(a: &Float, ctx: &Context) -> Result<Float, EvalError> {
    unary(a, Some(ctx), engine::sqrt)
}

/// Raises `a` to the integer power `n` under the current context.
pub fn powi(a: &Float, n: i64) -> Result<Float, EvalError> {
    unary(a, None, |a, p| engine::powi(a, n, p))
}

/// Raises `a` to the integer power `n` under the current context merged
/// with `ctx`.
pub fn powi_with(a: &Float, n: i64, ctx: &Context) -> Result<Float, EvalError> {
    unary(a, Some(ctx), |a, p| engine::powi(a, n, p))
}

/// Re-rounds `a` under the current context. Useful to bring an exactly
/// constructed value into the ambient format.
pub fn round(a: &Float) -> Result<Float, EvalError> {
    unary(a, None, engine::round)
}

/// Re-rounds `a` under the current context merged with `ctx`.
pub fn round_with(a: &Float, ctx: &Context) -> Result<Float, EvalError> {
    unary(a, Some(ctx), engine::round)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RoundingMode, FP32, FP64};
    use crate::flags::{get_flags, set_flags};
    use crate::stack::{get_current_context, with_context};

    // Ambient state is thread local; keep each test on its own thread.
    fn isolated(f: impl FnOnce() + Send + 'static) {
        std::thread::spawn(f).join().unwrap();
    }

    #[test]
    fn test_ops_match_hardware_under_fp64_scope() {
        isolated(|| {
            let _scope = with_context(&FP64);
            let mut lfsr = crate::utils::Lfsr::new();
            for _ in 0..10000 {
                let v0 = f64::from_bits(lfsr.get64());
                let v1 = f64::from_bits(lfsr.get64());
                let a = Float::from_f64(v0);
                let b = Float::from_f64(v1);
                for (ours, native) in [
                    (add(&a, &b).unwrap(), v0 + v1),
                    (sub(&a, &b).unwrap(), v0 - v1),
                    (mul(&a, &b).unwrap(), v0 * v1),
                    (div(&a, &b).unwrap(), v0 / v1),
                ] {
                    let ours = ours.to_f64();
                    assert_eq!(ours.is_nan(), native.is_nan());
                    assert!(
                        native.is_nan()
                            || ours.to_bits() == native.to_bits()
                    );
                }
            }
        });
    }

    #[test]
    fn test_default_context_precision() {
        isolated(|| {
            // Under the 113-bit default, double-precision inputs add
            // exactly.
            let a = Float::from_f64(0.1);
            let b = Float::from_f64(0.2);
            let r = add(&a, &b).unwrap();
            assert_eq!(r.precision(), 113);
            assert!(get_flags().is_empty());
        });
    }

    #[test]
    fn test_call_override_takes_precedence() {
        isolated(|| {
            let a = Float::from_u64(1);
            let b = Float::from_u64(3);
            let wide = div(&a, &b).unwrap();
            assert_eq!(wide.precision(), 113);
            let narrow = div_with(&a, &b, &FP32).unwrap();
            assert_eq!(narrow.precision(), 24);
            assert_eq!(narrow.to_f32(), 1.0f32 / 3.0);
            // The override did not change the ambient context.
            assert_eq!(get_current_context().precision(), Some(113));
        });
    }

    #[test]
    fn test_flag_stickiness_across_operations() {
        isolated(|| {
            set_flags(Flags::empty());
            let third =
                div(&Float::from_u64(1), &Float::from_u64(3)).unwrap();
            assert!(get_flags().contains(Flags::INEXACT));
            // A flag-free operation leaves the register untouched.
            let _ = add(&third, &third).unwrap();
            assert!(get_flags().contains(Flags::INEXACT));
            // Explicit clearing empties it, and clean ops keep it empty.
            set_flags(Flags::empty());
            let _ = add(&Float::from_u64(1), &Float::from_u64(2)).unwrap();
            assert!(get_flags().is_empty());
        });
    }

    #[test]
    fn test_trap_escalation() {
        isolated(|| {
            set_flags(Flags::empty());
            let trapping = Context::new().with_traps(Flags::OVERFLOW);
            let big = Float::from_f64(f64::MAX);
            let _scope = with_context(&FP64.merge(&trapping));
            let err = mul(&big, &big).unwrap_err();
            assert_eq!(err, EvalError::Overflow);
            // The trapped operation recorded nothing.
            assert!(get_flags().is_empty());
            // The same operation without the trap records sticky flags.
            let r = mul_with(&big, &big, &Context::new().with_traps(Flags::empty()))
                .unwrap();
            assert!(r.is_inf());
            assert!(get_flags().contains(Flags::OVERFLOW | Flags::INEXACT));
        });
    }

    #[test]
    fn test_trapped_inexact() {
        isolated(|| {
            let exact = Context::new().with_traps(Flags::INEXACT);
            let a = Float::from_u64(1);
            let b = Float::from_u64(3);
            assert_eq!(
                div_with(&a, &b, &exact).unwrap_err(),
                EvalError::Inexact
            );
            // 1/4 is exact and passes.
            let r = div_with(&a, &Float::from_u64(4), &exact).unwrap();
            assert_eq!(r.to_f64(), 0.25);
        });
    }

    #[test]
    fn test_scoped_narrowing_scenario() {
        isolated(|| {
            let before = get_current_context();
            assert_eq!(before.precision(), Some(113));
            {
                let _scope = with_context(
                    &Context::new()
                        .with_precision(24)
                        .unwrap()
                        .with_rounding(RoundingMode::Zero),
                );
                let third =
                    div(&Float::from_u64(1), &Float::from_u64(3)).unwrap();
                assert_eq!(third.precision(), 24);
                // Round toward zero: strictly below one third.
                assert!(third < div_with(&Float::from_u64(1), &Float::from_u64(3), &FP64).unwrap());
            }
            assert_eq!(get_current_context(), before);
        });
    }

    #[test]
    fn test_round_brings_exact_values_into_format() {
        isolated(|| {
            set_flags(Flags::empty());
            let exact = Float::from_bigint(
                crate::bigint::BigInt::from_u64(7).powi(100),
            );
            assert_eq!(exact.precision(), 281);
            let rounded = round(&exact).unwrap();
            assert_eq!(rounded.precision(), 113);
            assert!(get_flags().contains(Flags::INEXACT));
        });
    }

    #[test]
    fn test_mixed_realized_precision_rounds_once() {
        isolated(|| {
            // 2^200 + 1 at 113 bits: the exact sum is formed first, then
            // rounded once, so the tiny addend shows up only as the
            // inexact flag.
            set_flags(Flags::empty());
            let big = powi(&Float::from_u64(2), 200).unwrap();
            let r = add(&big, &Float::from_u64(1)).unwrap();
            assert_eq!(r, big);
            assert!(get_flags().contains(Flags::INEXACT));
        });
    }
}
