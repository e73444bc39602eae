//! Conversions between [`Float`] and the native machine formats.
//!
//! Loading a native value is always exact: the result's realized
//! precision is whatever the operand needs, never bounded by a context.
//! Converting back out is a diagnostic operation that rounds to nearest,
//! ties to even, bypassing the ambient context and the flag register.

use crate::bigint::BigInt;
use crate::context::RoundingMode;
use crate::engine::{self, Params};
use crate::value::{Category, Float};

// Binary interchange encodings, IEEE 754-2019 section 3.4.
const F64_MANTISSA: u32 = 52;
const F64_EXP_BITS: u32 = 11;
const F32_MANTISSA: u32 = 23;
const F32_EXP_BITS: u32 = 8;

fn params_f64() -> Params {
    Params {
        precision: 53,
        emin: -1022,
        emax: 1023,
        subnormalize: true,
        rounding: RoundingMode::NearestTiesToEven,
    }
}

fn params_f32() -> Params {
    Params {
        precision: 24,
        emin: -126,
        emax: 127,
        subnormalize: true,
        rounding: RoundingMode::NearestTiesToEven,
    }
}

/// Splits an interchange encoding into an exact float.
fn from_bits(bits: u64, mantissa_bits: u32, exp_bits: u32) -> Float {
    let sign = (bits >> (mantissa_bits + exp_bits)) & 1 == 1;
    let biased = (bits >> mantissa_bits) & ((1u64 << exp_bits) - 1);
    let fraction = bits & ((1u64 << mantissa_bits) - 1);
    let bias = (1i64 << (exp_bits - 1)) - 1;

    if biased == (1u64 << exp_bits) - 1 {
        return if fraction == 0 {
            Float::infinity(sign)
        } else {
            Float::nan(sign)
        };
    }
    let (m, lsb_exp) = if biased == 0 {
        if fraction == 0 {
            return Float::zero(sign);
        }
        // Subnormal: no implicit bit, fixed scale at the bottom.
        (fraction, 1 - bias - mantissa_bits as i64)
    } else {
        (
            fraction | (1u64 << mantissa_bits),
            biased as i64 - bias - mantissa_bits as i64,
        )
    };
    // Strip trailing zeros so the realized precision is exactly what the
    // value needs.
    let tz = m.trailing_zeros();
    let m = m >> tz;
    let bits_used = 64 - m.leading_zeros() as usize;
    Float::from_parts(
        sign,
        lsb_exp + tz as i64,
        BigInt::from_u64(m),
        bits_used,
    )
}

/// Packs a value that was already rounded to an interchange format.
fn to_bits(a: &Float, mantissa_bits: u32, exp_bits: u32) -> u64 {
    let bias = (1i64 << (exp_bits - 1)) - 1;
    let sign = (a.sign() as u64) << (mantissa_bits + exp_bits);
    match a.category() {
        Category::Zero => sign,
        Category::Infinity => {
            sign | (((1u64 << exp_bits) - 1) << mantissa_bits)
        }
        Category::NaN => {
            sign | (((1u64 << exp_bits) - 1) << mantissa_bits)
                | (1u64 << (mantissa_bits - 1))
        }
        Category::Normal => {
            let emin = 1 - bias;
            let exp = a.exponent();
            let m = a.significand();
            if exp < emin {
                // Subnormal encoding: biased exponent zero, fraction
                // scaled to the fixed bottom exponent.
                let bottom = 1 - bias - mantissa_bits as i64;
                let shift = a.lsb_exp() - bottom;
                debug_assert!(shift >= 0);
                let mut frac = m;
                frac.shift_left(shift as usize);
                sign | frac.as_u64()
            } else {
                // Align the significand to the full width and drop the
                // implicit leading bit.
                let width = mantissa_bits as usize + 1;
                let mut frac = m;
                frac.shift_left(width - frac.msb_index());
                frac.truncate_bits(mantissa_bits as usize);
                let biased = (exp + bias) as u64;
                sign | (biased << mantissa_bits) | frac.as_u64()
            }
        }
    }
}

impl Float {
    /// Loads a native `f64` exactly.
    pub fn from_f64(v: f64) -> Self {
        from_bits(v.to_bits(), F64_MANTISSA, F64_EXP_BITS)
    }

    /// Loads a native `f32` exactly.
    pub fn from_f32(v: f32) -> Self {
        from_bits(v.to_bits() as u64, F32_MANTISSA, F32_EXP_BITS)
    }

    /// Converts to a native `f64`, rounding to nearest (ties to even).
    /// This is a diagnostic conversion: it ignores the ambient context and
    /// does not touch the flag register.
    pub fn to_f64(&self) -> f64 {
        let (r, _) = engine::round(self, &params_f64());
        f64::from_bits(to_bits(&r, F64_MANTISSA, F64_EXP_BITS))
    }

    /// Converts to a native `f32`, rounding to nearest (ties to even).
    pub fn to_f32(&self) -> f32 {
        let (r, _) = engine::round(self, &params_f32());
        f32::from_bits(to_bits(&r, F32_MANTISSA, F32_EXP_BITS) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils;

    #[test]
    fn test_f64_round_trip() {
        let mut lfsr = utils::Lfsr::new();
        for _ in 0..50000 {
            let v = f64::from_bits(lfsr.get64());
            let f = Float::from_f64(v);
            let back = f.to_f64();
            assert_eq!(v.is_nan(), back.is_nan());
            assert!(v.is_nan() || v.to_bits() == back.to_bits());
        }
        for v in utils::special_values() {
            let back = Float::from_f64(v).to_f64();
            assert_eq!(v.is_nan(), back.is_nan());
            assert!(v.is_nan() || v.to_bits() == back.to_bits());
        }
    }

    #[test]
    fn test_f32_round_trip() {
        for bits in [
            0x3f8f_ffffu32,
            0x4080_0000,
            0x3f00_0000,
            0xc60b_40ec,
            0xbc67_5793,
            0x0000_0001, // smallest subnormal
            0x007f_ffff, // largest subnormal
            0x7f80_0000, // inf
            0xff80_0000, // -inf
        ] {
            let v = f32::from_bits(bits);
            let back = Float::from_f32(v).to_f32();
            assert!(v.is_nan() || v.to_bits() == back.to_bits());
        }
    }

    #[test]
    fn test_exact_load_precision() {
        // 1.0 needs one bit; 1.5 needs two.
        assert_eq!(Float::from_f64(1.0).precision(), 1);
        assert_eq!(Float::from_f64(1.5).precision(), 2);
        // The smallest subnormal is a single bit at the very bottom.
        let tiny = Float::from_f64(f64::from_bits(1));
        assert_eq!(tiny.precision(), 1);
        assert_eq!(tiny.exponent(), -1074);
    }

    #[test]
    fn test_downcast_to_f32() {
        for v in [0.3f64, 0.1, 14151215., 0.0000000001, 1e9] {
            assert_eq!(Float::from_f64(v).to_f32(), v as f32);
        }
        for v in utils::special_values() {
            let r = Float::from_f64(v).to_f32();
            assert_eq!(v.is_nan(), r.is_nan());
            assert!(v.is_nan() || r == v as f32);
        }
    }

    #[test]
    fn test_signed_zero_and_specials() {
        assert_eq!(Float::from_f64(-0.0).to_f64().to_bits(), (-0.0f64).to_bits());
        assert!(Float::from_f64(f64::NAN).is_nan());
        assert!(Float::from_f64(f64::INFINITY).is_inf());
        assert!(Float::from_f64(f64::NEG_INFINITY).is_negative());
        assert!(Float::nan(true).to_f64().is_nan());
        assert_eq!(Float::infinity(true).to_f64(), f64::NEG_INFINITY);
    }
}
