//! The arbitrary-precision floating point value.
//!
//! A value carries its own realized precision: the number of significand
//! bits it was computed (or constructed) with. This is independent of any
//! context. Operations round to the effective context's precision, while
//! the exact constructors in this module use however many bits the input
//! needs, so a value built from an integer is always lossless.

use core::cmp::Ordering;

use crate::bigint::BigInt;

/// The categories of floating point values. Queried through the
/// `is_inf`, `is_zero`, `is_nan` and `is_normal` accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Infinity,
    NaN,
    Normal,
    Zero,
}

/// An arbitrary-precision binary floating point number.
///
/// A finite nonzero value is `(-1)^sign * m * 2^(exp - msb(m) + 1)`, i.e.
/// `exp` is the exponent of the leading significand bit (the value reads
/// as `1.fff * 2^exp`). Trailing zeros in the significand carry no
/// information; comparison and equality are by numeric value.
#[derive(Debug, Clone)]
pub struct Float {
    // The sign bit. True means negative.
    sign: bool,
    // The exponent of the leading significand bit.
    exp: i64,
    // The significand. Nonzero iff the category is Normal.
    mantissa: BigInt,
    // The realized precision, in bits.
    prec: usize,
    // The kind of value this float represents.
    category: Category,
}

impl Float {
    /// Builds a float from raw parts. `exp` is the leading-bit exponent.
    pub(crate) fn raw(
        sign: bool,
        exp: i64,
        mantissa: BigInt,
        prec: usize,
        category: Category,
    ) -> Self {
        Float {
            sign,
            exp,
            mantissa,
            prec,
            category,
        }
    }

    /// Builds a normal float from a significand `m` and the exponent of
    /// its least significant bit, so the value is `m * 2^(lsb_exp)`.
    /// Returns a zero if `m` is zero.
    pub(crate) fn from_parts(
        sign: bool,
        lsb_exp: i64,
        mantissa: BigInt,
        prec: usize,
    ) -> Self {
        if mantissa.is_zero() {
            return Self::zero_with_prec(sign, prec);
        }
        let exp = lsb_exp.saturating_add(mantissa.msb_index() as i64 - 1);
        Float {
            sign,
            exp,
            mantissa,
            prec,
            category: Category::Normal,
        }
    }

    /// Returns a new zero float.
    pub fn zero(sign: bool) -> Self {
        Self::zero_with_prec(sign, 1)
    }

    pub(crate) fn zero_with_prec(sign: bool, prec: usize) -> Self {
        Float {
            sign,
            exp: 0,
            mantissa: BigInt::zero(),
            prec,
            category: Category::Zero,
        }
    }

    /// Returns a new infinity.
    pub fn infinity(sign: bool) -> Self {
        Float {
            sign,
            exp: 0,
            mantissa: BigInt::zero(),
            prec: 1,
            category: Category::Infinity,
        }
    }

    pub(crate) fn infinity_with_prec(sign: bool, prec: usize) -> Self {
        Float {
            sign,
            exp: 0,
            mantissa: BigInt::zero(),
            prec,
            category: Category::Infinity,
        }
    }

    /// Returns a new quiet NaN.
    pub fn nan(sign: bool) -> Self {
        Float {
            sign,
            exp: 0,
            mantissa: BigInt::zero(),
            prec: 1,
            category: Category::NaN,
        }
    }

    /// Loads the integer `val` exactly. The realized precision is the
    /// smallest `p` with `val < 2^p`, regardless of any context.
    pub fn from_u64(val: u64) -> Self {
        Self::from_bigint(BigInt::from_u64(val))
    }

    /// Loads the integer `val` exactly.
    pub fn from_i64(val: i64) -> Self {
        let mut a = Self::from_u64(val.unsigned_abs());
        a.sign = val < 0;
        a
    }

    /// Loads the 128-bit integer `val` exactly.
    pub fn from_u128(val: u128) -> Self {
        Self::from_bigint(BigInt::from_u128(val))
    }

    /// Loads the 128-bit integer `val` exactly.
    pub fn from_i128(val: i128) -> Self {
        let mut a = Self::from_u128(val.unsigned_abs());
        a.sign = val < 0;
        a
    }

    /// Loads an arbitrary-size integer exactly. The realized precision is
    /// the position of the highest set bit.
    pub fn from_bigint(val: BigInt) -> Self {
        if val.is_zero() {
            return Self::zero(false);
        }
        let bits = val.msb_index();
        Float {
            sign: false,
            exp: bits as i64 - 1,
            mantissa: val,
            prec: bits,
            category: Category::Normal,
        }
    }

    /// Returns true if the float is negative.
    pub fn is_negative(&self) -> bool {
        self.sign
    }

    /// Returns true if the float is +-inf.
    pub fn is_inf(&self) -> bool {
        matches!(self.category, Category::Infinity)
    }

    /// Returns true if the float is a NaN.
    pub fn is_nan(&self) -> bool {
        matches!(self.category, Category::NaN)
    }

    /// Returns true if the float is +-zero.
    pub fn is_zero(&self) -> bool {
        matches!(self.category, Category::Zero)
    }

    /// Returns true if this number is finite and nonzero.
    pub fn is_normal(&self) -> bool {
        matches!(self.category, Category::Normal)
    }

    /// Returns the sign of the float. True means negative.
    pub fn sign(&self) -> bool {
        self.sign
    }

    /// Returns the exponent of the leading significand bit.
    pub fn exponent(&self) -> i64 {
        self.exp
    }

    /// Returns a copy of the significand.
    pub fn significand(&self) -> BigInt {
        self.mantissa.clone()
    }

    pub(crate) fn significand_ref(&self) -> &BigInt {
        &self.mantissa
    }

    /// Returns the realized precision of this value, in bits. For results
    /// of arithmetic this equals the effective context's precision; for
    /// exactly constructed values it is whatever the input needed.
    pub fn precision(&self) -> usize {
        self.prec
    }

    /// Returns the category of the float.
    pub fn category(&self) -> Category {
        self.category
    }

    /// The exponent of the least significant significand bit. Only
    /// meaningful for normal values.
    pub(crate) fn lsb_exp(&self) -> i64 {
        debug_assert!(self.is_normal());
        self.exp - self.mantissa.msb_index() as i64 + 1
    }

    /// Returns a new float with a flipped sign. Exact, and independent of
    /// any context.
    pub fn neg(&self) -> Self {
        let mut x = self.clone();
        x.sign = !x.sign;
        x
    }

    /// Returns the absolute value. Exact, and independent of any context.
    pub fn abs(&self) -> Self {
        let mut x = self.clone();
        x.sign = false;
        x
    }

    /// Compares the magnitudes of two normal values.
    pub(crate) fn cmp_magnitude(&self, other: &Self) -> Ordering {
        debug_assert!(self.is_normal() && other.is_normal());
        if self.exp != other.exp {
            return self.exp.cmp(&other.exp);
        }
        // Same leading exponent: align the significands at the top bit.
        let wa = self.mantissa.msb_index();
        let wb = other.mantissa.msb_index();
        let mut ma = self.mantissa.clone();
        let mut mb = other.mantissa.clone();
        if wa < wb {
            ma.shift_left(wb - wa);
        } else {
            mb.shift_left(wa - wb);
        }
        ma.cmp(&mb)
    }
}

impl PartialEq for Float {
    /// Numeric comparison: signed zeros are equal, NaN compares unequal to
    /// everything (itself included), and normal values compare by value
    /// even when their realized precisions differ.
    fn eq(&self, other: &Self) -> bool {
        match (self.category, other.category) {
            (Category::NaN, _) | (_, Category::NaN) => false,
            (Category::Zero, Category::Zero) => true,
            (Category::Infinity, Category::Infinity) => self.sign == other.sign,
            (Category::Normal, Category::Normal) => {
                self.sign == other.sign
                    && self.cmp_magnitude(other) == Ordering::Equal
            }
            _ => false,
        }
    }
}

/// IEEE 754-2019 Section 5.11, comparison predicates: NaN is unordered,
/// zeros compare equal regardless of sign.
impl PartialOrd for Float {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let sign_ord = |sign: bool| -> Option<Ordering> {
            Some(if sign {
                Ordering::Less
            } else {
                Ordering::Greater
            })
        };

        match (self.category, other.category) {
            (Category::NaN, _) | (_, Category::NaN) => None,
            (Category::Zero, Category::Zero) => Some(Ordering::Equal),
            (Category::Infinity, Category::Infinity) => {
                if self.sign == other.sign {
                    Some(Ordering::Equal)
                } else {
                    sign_ord(self.sign)
                }
            }
            (Category::Infinity, _) | (_, Category::Zero) => sign_ord(self.sign),
            (Category::Zero, _) | (_, Category::Infinity) => {
                sign_ord(!other.sign)
            }
            (Category::Normal, Category::Normal) => {
                if self.sign != other.sign {
                    return sign_ord(self.sign);
                }
                let mag = self.cmp_magnitude(other);
                Some(if self.sign { mag.reverse() } else { mag })
            }
        }
    }
}

#[test]
fn test_exact_integer_precision() {
    // The natural precision of 7^100 is the smallest p with 7^100 < 2^p,
    // no matter what any context says.
    let big = BigInt::from_u64(7).powi(100);
    let expected_bits = big.msb_index();
    let x = Float::from_bigint(big);
    assert_eq!(x.precision(), expected_bits);
    assert_eq!(x.precision(), 281);

    assert_eq!(Float::from_u64(1).precision(), 1);
    assert_eq!(Float::from_u64(7).precision(), 3);
    assert_eq!(Float::from_u64(8).precision(), 4);
    assert_eq!(Float::from_i64(-255).precision(), 8);
}

#[test]
fn test_exact_integer_values() {
    let x = Float::from_u64(6);
    assert_eq!(x.exponent(), 2);
    assert!(!x.is_negative());
    let y = Float::from_i64(-6);
    assert!(y.is_negative());
    assert_eq!(x, y.neg());
    assert_eq!(x, y.abs());
    assert!(Float::from_i64(0).is_zero());
    assert_eq!(
        Float::from_u128(1 << 100),
        Float::from_bigint(BigInt::one_hot(100))
    );
}

#[test]
fn test_eq_across_precisions() {
    // 6 stored as 0b110 and as 0b1100000 are the same number.
    let narrow = Float::from_parts(false, 1, BigInt::from_u64(0b11), 2);
    let wide = Float::from_parts(false, -4, BigInt::from_u64(0b1100000), 16);
    assert_eq!(narrow, wide);
    assert_eq!(narrow.exponent(), wide.exponent());
    assert_ne!(narrow.precision(), wide.precision());
}

#[test]
fn test_comparison_specials() {
    let nan = Float::nan(false);
    let inf = Float::infinity(false);
    let ninf = Float::infinity(true);
    let one = Float::from_u64(1);
    let none = Float::from_i64(-1);
    let zero = Float::zero(false);
    let nzero = Float::zero(true);

    assert_ne!(nan, nan);
    assert!(!(nan < one) && !(nan > one));
    assert_eq!(zero, nzero);
    assert!(inf > one);
    assert!(ninf < none);
    assert!(ninf < inf);
    assert!(none < zero);
    assert!(zero < one);
    assert!(none < one);
}

#[test]
fn test_comparison_orders_by_value() {
    let vals: Vec<Float> =
        [-100i64, -7, -1, 0, 1, 2, 3, 90210].iter().map(|v| Float::from_i64(*v)).collect();
    for (i, a) in vals.iter().enumerate() {
        for (j, b) in vals.iter().enumerate() {
            assert_eq!(i.cmp(&j), a.partial_cmp(b).unwrap(), "{:?} {:?}", a, b);
        }
    }
}
