//! The arithmetic kernels.
//!
//! Every kernel takes fully resolved numeric parameters and returns the
//! rounded result together with the set of exception flags that fired.
//! The kernels never touch the context stack or the flag register; the
//! operation layer resolves parameters before the call and folds flags
//! after it.
//!
//! Each kernel computes the mathematically exact result, or an exact
//! description of it (an integer significand plus the classification of
//! the discarded fraction), and then rounds exactly once.

use core::cmp::Ordering;

use crate::bigint::{BigInt, LossFraction};
use crate::context::{Context, RoundingMode, EMAX_MAX, EMIN_MIN};
use crate::flags::Flags;
use crate::value::{Category, Float};

/// The resolved numeric parameters of one operation, extracted from a
/// total effective context.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Params {
    pub precision: usize,
    pub emin: i64,
    pub emax: i64,
    pub subnormalize: bool,
    pub rounding: RoundingMode,
}

impl Params {
    /// Extracts the numeric parameters from a context. Returns `None` if
    /// any numeric field is absent; the caller treats that as a logic bug,
    /// since effective contexts are total by construction.
    pub fn from_context(ctx: &Context) -> Option<Params> {
        Some(Params {
            precision: ctx.precision()?,
            emin: ctx.emin()?,
            emax: ctx.emax()?,
            subnormalize: ctx.subnormalize()?,
            rounding: ctx.rounding()?,
        })
    }
}

/// Combines the loss from a coarse truncation with the loss that was
/// already present below it: `high` classifies the bits removed by the
/// latest shift, `low` the bits that had been discarded earlier, further
/// down.
fn combine_loss(high: LossFraction, low: LossFraction) -> LossFraction {
    if !low.is_exactly_zero() {
        if high.is_exactly_zero() {
            return LossFraction::LessThanHalf;
        } else if high.is_exactly_half() {
            return LossFraction::MoreThanHalf;
        }
    }
    high
}

/// Returns true if the discarded fraction requires incrementing the kept
/// significand under the rounding mode `rm`. The caller guarantees that
/// the loss is not exactly zero.
fn need_round_away(
    rm: RoundingMode,
    sign: bool,
    loss: LossFraction,
    is_odd: bool,
) -> bool {
    debug_assert!(!loss.is_exactly_zero());
    match rm {
        RoundingMode::Positive => !sign,
        RoundingMode::Negative => sign,
        RoundingMode::Zero | RoundingMode::Faithful => false,
        RoundingMode::AwayFromZero => true,
        RoundingMode::NearestTiesToAway => loss.is_gte_half(),
        RoundingMode::NearestTiesToEven => {
            loss.is_mt_half() || (loss.is_exactly_half() && is_odd)
        }
    }
}

/// The exponent of the smallest representable magnitude.
fn floor_exp(p: &Params) -> i64 {
    if p.subnormalize {
        p.emin - (p.precision as i64 - 1)
    } else {
        p.emin
    }
}

/// The largest finite value of the format.
fn max_finite(sign: bool, p: &Params) -> Float {
    Float::from_parts(
        sign,
        p.emax - p.precision as i64 + 1,
        BigInt::all_ones(p.precision),
        p.precision,
    )
}

/// Substitutes the result of an overflowing computation: infinity or the
/// largest finite value, depending on the rounding direction.
fn overflow(sign: bool, p: &Params) -> (Float, Flags) {
    let flags = Flags::OVERFLOW | Flags::INEXACT;
    let to_inf = match p.rounding {
        RoundingMode::NearestTiesToEven
        | RoundingMode::NearestTiesToAway
        | RoundingMode::AwayFromZero => true,
        RoundingMode::Zero | RoundingMode::Faithful => false,
        RoundingMode::Positive => !sign,
        RoundingMode::Negative => sign,
    };
    if to_inf {
        (Float::infinity_with_prec(sign, p.precision), flags)
    } else {
        (max_finite(sign, p), flags)
    }
}

/// Rounds a value whose magnitude lies strictly below the smallest
/// representable magnitude `2^floor`. The only candidates are zero and
/// `2^floor` itself.
fn round_tiny(
    sign: bool,
    m: &BigInt,
    exp: i64,
    floor: i64,
    loss: LossFraction,
    p: &Params,
) -> (Float, Flags) {
    let flags = Flags::UNDERFLOW | Flags::INEXACT;
    let up = match p.rounding {
        RoundingMode::Zero | RoundingMode::Faithful => false,
        RoundingMode::AwayFromZero => true,
        RoundingMode::Positive => !sign,
        RoundingMode::Negative => sign,
        RoundingMode::NearestTiesToEven | RoundingMode::NearestTiesToAway => {
            if exp < floor - 1 {
                // Strictly below half of the smallest magnitude.
                false
            } else {
                // At or above the half point. The value is exactly half
                // iff the significand is a power of two with no discarded
                // tail; the tie rounds to zero for ties-to-even.
                let exact_half = loss.is_exactly_zero()
                    && m.msb_index() == m.trailing_zeros() + 1;
                if exact_half {
                    p.rounding == RoundingMode::NearestTiesToAway
                } else {
                    true
                }
            }
        }
    };
    let val = if up {
        Float::from_parts(sign, floor, BigInt::one(), p.precision)
    } else {
        Float::zero_with_prec(sign, p.precision)
    };
    (val, flags)
}

/// The rounding kernel. Takes a sign-magnitude result `m * 2^lsb` whose
/// discarded lower fraction is classified by `loss`, and rounds it to the
/// parameters `p`: clamps the significand width to the precision (or less
/// in the subnormal range), applies the rounding mode, and substitutes
/// overflowing and vanishing results.
pub(crate) fn round_parts(
    sign: bool,
    mut m: BigInt,
    mut lsb: i64,
    mut loss: LossFraction,
    p: &Params,
) -> (Float, Flags) {
    debug_assert!(!m.is_zero());
    let prec = p.precision as i64;
    let mut flags = Flags::empty();

    let msb = m.msb_index() as i64;
    let exp = lsb.saturating_add(msb - 1);

    let floor = floor_exp(p);
    if exp < floor {
        return round_tiny(sign, &m, exp, floor, loss, p);
    }

    // The number of significand bits available at this magnitude: the
    // full precision for normal results, fewer in the subnormal range.
    let keep = prec - (p.emin - exp).max(0);
    debug_assert!(keep >= 1);

    if msb > keep {
        let shift = (msb - keep) as usize;
        let shift_loss = m.loss_for_truncation(shift);
        m.shift_right(shift);
        lsb += shift as i64;
        loss = combine_loss(shift_loss, loss);
    }

    if loss.is_exactly_zero() {
        return (Float::from_parts(sign, lsb, m, p.precision), flags);
    }
    flags |= Flags::INEXACT;

    if need_round_away(p.rounding, sign, loss, m.is_odd()) {
        m.inplace_add(&BigInt::one());
        if m.msb_index() as i64 > keep {
            // The increment carried out of the kept width; the bit shifted
            // out here is zero, so no information is lost.
            m.shift_right(1);
            lsb += 1;
        }
    }

    let exp = lsb.saturating_add(m.msb_index() as i64 - 1);
    if exp > p.emax {
        return overflow(sign, p);
    }
    if exp < p.emin {
        flags |= Flags::UNDERFLOW;
    }
    (Float::from_parts(sign, lsb, m, p.precision), flags)
}

/// Re-rounds an existing value under the parameters `p`. Specials pass
/// through unchanged.
pub(crate) fn round(a: &Float, p: &Params) -> (Float, Flags) {
    match a.category() {
        Category::NaN => (Float::nan(a.sign()), Flags::empty()),
        Category::Infinity => (
            Float::infinity_with_prec(a.sign(), p.precision),
            Flags::empty(),
        ),
        Category::Zero => (
            Float::zero_with_prec(a.sign(), p.precision),
            Flags::empty(),
        ),
        Category::Normal => round_parts(
            a.sign(),
            a.significand(),
            a.lsb_exp(),
            LossFraction::ExactlyZero,
            p,
        ),
    }
}

/// Computes `a + b`.
pub(crate) fn add(a: &Float, b: &Float, p: &Params) -> (Float, Flags) {
    add_sub(a, b, false, p)
}

/// Computes `a - b`.
pub(crate) fn sub(a: &Float, b: &Float, p: &Params) -> (Float, Flags) {
    add_sub(a, b, true, p)
}

// Handbook of Floating-Point Arithmetic, Chapter 8: Algorithms for the
// Five Basic Operations. Special values follow the addition table.
fn add_sub(a: &Float, b: &Float, subtract: bool, p: &Params) -> (Float, Flags) {
    use Category::*;
    let bsign = b.sign() ^ subtract;
    match (a.category(), b.category()) {
        (NaN, _) => (Float::nan(a.sign()), Flags::empty()),
        (_, NaN) => (Float::nan(b.sign()), Flags::empty()),
        (Infinity, Infinity) => {
            if a.sign() == bsign {
                (
                    Float::infinity_with_prec(a.sign(), p.precision),
                    Flags::empty(),
                )
            } else {
                // Opposite infinities cancel to nothing meaningful.
                (Float::nan(a.sign()), Flags::INVALID_OPERATION)
            }
        }
        (Infinity, _) => (
            Float::infinity_with_prec(a.sign(), p.precision),
            Flags::empty(),
        ),
        (_, Infinity) => {
            (Float::infinity_with_prec(bsign, p.precision), Flags::empty())
        }
        (Zero, Zero) => {
            // An exact zero sum keeps the common sign; a mixed-sign zero
            // sum is negative only when rounding toward negative.
            let sign = if a.sign() == bsign {
                a.sign()
            } else {
                p.rounding == RoundingMode::Negative
            };
            (Float::zero_with_prec(sign, p.precision), Flags::empty())
        }
        (Zero, Normal) => {
            let b = if subtract { b.neg() } else { b.clone() };
            round(&b, p)
        }
        (Normal, Zero) => round(a, p),
        (Normal, Normal) => add_normals(a.sign(), a, bsign, b, p),
    }
}

fn add_normals(
    asign: bool,
    a: &Float,
    bsign: bool,
    b: &Float,
    p: &Params,
) -> (Float, Flags) {
    // Order the operands by magnitude so the subtraction below cannot
    // wrap, and so the smaller operand is the one that may degrade into a
    // sticky bit.
    let mag = a.cmp_magnitude(b);
    let (hs, hi, ls, lo) = match mag {
        Ordering::Less => (bsign, b, asign, a),
        _ => (asign, a, bsign, b),
    };
    if hs != ls && mag == Ordering::Equal {
        // Exact cancellation. The zero is negative only when rounding
        // toward negative.
        let sign = p.rounding == RoundingMode::Negative;
        return (Float::zero_with_prec(sign, p.precision), Flags::empty());
    }

    let prec = p.precision as i64;
    let gap = hi.exponent().saturating_sub(lo.exponent());

    if gap >= prec + 3 {
        // The smaller operand lies entirely below the guard position of
        // the result; only its existence matters. Widen the larger
        // operand so its own bits cover the guard window, then fold the
        // tail in as a sticky fraction strictly below the last bit.
        let mut m = hi.significand();
        let widen = (prec + 3 - m.msb_index() as i64).max(0) as usize;
        m.shift_left(widen);
        let lsb = hi.lsb_exp() - widen as i64;
        if hs != ls {
            let borrow = m.inplace_sub(&BigInt::one());
            debug_assert!(!borrow);
        }
        return round_parts(hs, m, lsb, LossFraction::LessThanHalf, p);
    }

    // Near case: align the significands on a common scale, exactly.
    let mut mh = hi.significand();
    let mut ml = lo.significand();
    let (lh, ll) = (hi.lsb_exp(), lo.lsb_exp());
    let lsb = if lh >= ll {
        mh.shift_left((lh - ll) as usize);
        ll
    } else {
        ml.shift_left((ll - lh) as usize);
        lh
    };
    if hs == ls {
        mh.inplace_add(&ml);
    } else {
        let borrow = mh.inplace_sub(&ml);
        debug_assert!(!borrow, "operands were ordered by magnitude");
        debug_assert!(!mh.is_zero(), "exact cancellation was handled above");
    }
    round_parts(hs, mh, lsb, LossFraction::ExactlyZero, p)
}

/// Computes `a * b`.
pub(crate) fn mul(a: &Float, b: &Float, p: &Params) -> (Float, Flags) {
    use Category::*;
    let sign = a.sign() ^ b.sign();
    match (a.category(), b.category()) {
        (NaN, _) => (Float::nan(a.sign()), Flags::empty()),
        (_, NaN) => (Float::nan(b.sign()), Flags::empty()),
        (Zero, Infinity) | (Infinity, Zero) => {
            (Float::nan(sign), Flags::INVALID_OPERATION)
        }
        (Infinity, _) | (_, Infinity) => (
            Float::infinity_with_prec(sign, p.precision),
            Flags::empty(),
        ),
        (Zero, _) | (_, Zero) => {
            (Float::zero_with_prec(sign, p.precision), Flags::empty())
        }
        (Normal, Normal) => {
            let mut m = a.significand();
            m.inplace_mul(b.significand_ref());
            let lsb = a.lsb_exp().saturating_add(b.lsb_exp());
            round_parts(sign, m, lsb, LossFraction::ExactlyZero, p)
        }
    }
}

/// Computes `a / b`.
pub(crate) fn div(a: &Float, b: &Float, p: &Params) -> (Float, Flags) {
    use Category::*;
    let sign = a.sign() ^ b.sign();
    match (a.category(), b.category()) {
        (NaN, _) => (Float::nan(a.sign()), Flags::empty()),
        (_, NaN) => (Float::nan(b.sign()), Flags::empty()),
        (Zero, Zero) | (Infinity, Infinity) => {
            (Float::nan(sign), Flags::INVALID_OPERATION)
        }
        (Infinity, _) => (
            Float::infinity_with_prec(sign, p.precision),
            Flags::empty(),
        ),
        (_, Infinity) | (Zero, _) => {
            (Float::zero_with_prec(sign, p.precision), Flags::empty())
        }
        (Normal, Zero) => (
            Float::infinity_with_prec(sign, p.precision),
            Flags::DIVISION_BY_ZERO,
        ),
        (Normal, Normal) => div_normals(sign, a, b, p),
    }
}

fn div_normals(sign: bool, a: &Float, b: &Float, p: &Params) -> (Float, Flags) {
    let mut num = a.significand();
    let mut den = b.significand();
    let wa = num.msb_index() as i64;
    let wb = den.msb_index() as i64;

    // Scale the dividend so the quotient comes out with two bits beyond
    // the precision; the remainder classifies everything below that.
    let s = p.precision as i64 + 2 + wb - wa;
    if s >= 0 {
        num.shift_left(s as usize);
    } else {
        den.shift_left((-s) as usize);
    }
    let rem = num.inplace_div(&den);

    let loss = if rem.is_zero() {
        LossFraction::ExactlyZero
    } else {
        let mut twice = rem;
        twice.shift_left(1);
        match twice.cmp(&den) {
            Ordering::Less => LossFraction::LessThanHalf,
            Ordering::Equal => LossFraction::ExactlyHalf,
            Ordering::Greater => LossFraction::MoreThanHalf,
        }
    };
    let lsb = a
        .lsb_exp()
        .saturating_sub(b.lsb_exp())
        .saturating_sub(s);
    round_parts(sign, num, lsb, loss, p)
}

/// Computes the square root of `a`.
pub(crate) fn sqrt(a: &Float, p: &Params) -> (Float, Flags) {
    match a.category() {
        Category::NaN => (Float::nan(a.sign()), Flags::empty()),
        // The square root of (+/-) zero is that zero.
        Category::Zero => (
            Float::zero_with_prec(a.sign(), p.precision),
            Flags::empty(),
        ),
        Category::Infinity | Category::Normal if a.sign() => {
            (Float::nan(true), Flags::INVALID_OPERATION)
        }
        Category::Infinity => (
            Float::infinity_with_prec(false, p.precision),
            Flags::empty(),
        ),
        Category::Normal => {
            let mut n = a.significand();
            let msb = n.msb_index() as i64;
            // Scale to an even exponent with enough bits that the root
            // carries two bits beyond the precision.
            let mut j = (2 * (p.precision as i64 + 2) - msb).max(0);
            if (a.lsb_exp() - j).rem_euclid(2) != 0 {
                j += 1;
            }
            n.shift_left(j as usize);
            let (root, rem) = n.isqrt();
            // The true root sits in [root, root+1); it is above the half
            // point iff rem > root, and never exactly on it.
            let loss = if rem.is_zero() {
                LossFraction::ExactlyZero
            } else if rem <= root {
                LossFraction::LessThanHalf
            } else {
                LossFraction::MoreThanHalf
            };
            let lsb = (a.lsb_exp() - j) / 2;
            round_parts(false, root, lsb, loss, p)
        }
    }
}

/// Computes `a` raised to the integer power `n`, squaring at an augmented
/// working precision and rounding to `p` once at the end.
pub(crate) fn powi(a: &Float, n: i64, p: &Params) -> (Float, Flags) {
    // x^0 is exactly one for every x, zeros and infinities included.
    if n == 0 {
        return round(&Float::from_u64(1), p);
    }
    let odd = n & 1 == 1;
    match a.category() {
        Category::NaN => return (Float::nan(a.sign()), Flags::empty()),
        Category::Infinity => {
            let sign = a.sign() && odd;
            return if n > 0 {
                (Float::infinity_with_prec(sign, p.precision), Flags::empty())
            } else {
                (Float::zero_with_prec(sign, p.precision), Flags::empty())
            };
        }
        Category::Zero => {
            let sign = a.sign() && odd;
            return if n > 0 {
                (Float::zero_with_prec(sign, p.precision), Flags::empty())
            } else {
                // Like dividing one by zero.
                (
                    Float::infinity_with_prec(sign, p.precision),
                    Flags::DIVISION_BY_ZERO,
                )
            };
        }
        Category::Normal => {}
    }

    let mag = n.unsigned_abs();
    let guard = (64 - mag.leading_zeros() as usize) + 4;
    let wp = Params {
        precision: p.precision + guard,
        emin: EMIN_MIN,
        emax: EMAX_MAX,
        subnormalize: false,
        rounding: RoundingMode::NearestTiesToEven,
    };

    let mut fired = Flags::empty();
    let mut acc = Float::from_u64(1);
    let mut base = a.clone();
    let mut e = mag;
    while e > 0 {
        if e & 1 == 1 {
            let (r, f) = mul(&acc, &base, &wp);
            acc = r;
            fired |= f;
        }
        e >>= 1;
        if e > 0 {
            let (r, f) = mul(&base, &base, &wp);
            base = r;
            fired |= f;
        }
    }
    if n < 0 {
        let (r, f) = div(&Float::from_u64(1), &acc, &wp);
        acc = r;
        fired |= f;
    }
    let (out, f) = round(&acc, p);
    // An inexact intermediate makes the result inexact even when the
    // final rounding is clean.
    (out, fired | f)
}

#[cfg(test)]
pub(crate) fn fp64_params() -> Params {
    Params {
        precision: 53,
        emin: -1022,
        emax: 1023,
        subnormalize: true,
        rounding: RoundingMode::NearestTiesToEven,
    }
}
