//! Rounding contexts: a possibly-partial bundle of precision, exponent
//! range, subnormalization, rounding mode and trap settings, combinable
//! with a right-biased merge.

use core::fmt::{self, Display};

use crate::error::ContextError;
use crate::flags::Flags;

/// The supported rounding modes.
/// See IEEE 754-2019 Section 4.3 Rounding-direction attributes. `Faithful`
/// has no IEEE equivalent: it promises one of the two neighboring
/// representable values (this implementation truncates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoundingMode {
    NearestTiesToEven,
    NearestTiesToAway,
    Zero,
    Positive,
    Negative,
    AwayFromZero,
    Faithful,
}

impl RoundingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::NearestTiesToEven => "NearestTiesToEven",
            RoundingMode::NearestTiesToAway => "NearestTiesToAway",
            RoundingMode::Zero => "Zero",
            RoundingMode::Positive => "Positive",
            RoundingMode::Negative => "Negative",
            RoundingMode::AwayFromZero => "AwayFromZero",
            RoundingMode::Faithful => "Faithful",
        }
    }
}

impl Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The lowest precision a context may request, in bits.
pub const PREC_MIN: usize = 2;
/// The highest precision a context may request, in bits.
pub const PREC_MAX: usize = 1 << 31;
/// The lowest permitted minimum exponent.
pub const EMIN_MIN: i64 = -(1 << 62);
/// The highest permitted maximum exponent.
pub const EMAX_MAX: i64 = 1 << 62;

/// An immutable bundle of numeric evaluation attributes. Every field is
/// independently optional; an absent field means "inherit from whatever
/// this context is merged onto". The all-absent context is the identity of
/// [`merge`](Context::merge).
///
/// A finite nonzero value `(-1)^s * 1.f * 2^e` is representable under a
/// context when `emin <= e <= emax`; with `subnormalize` enabled, values
/// extend below `2^emin` with reduced effective precision, down to
/// `2^(emin - precision + 1)`.
///
/// The exponent bounds are set and validated as a pair, so every context
/// carries either both bounds or neither, and `emin < emax` holds whenever
/// they are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Context {
    precision: Option<usize>,
    emin: Option<i64>,
    emax: Option<i64>,
    subnormalize: Option<bool>,
    rounding: Option<RoundingMode>,
    traps: Option<Flags>,
}

impl Context {
    /// The context with every field absent.
    pub const fn new() -> Self {
        Context {
            precision: None,
            emin: None,
            emax: None,
            subnormalize: None,
            rounding: None,
            traps: None,
        }
    }

    /// The total context at the bottom of every context stack: precision
    /// 113, a practically unbounded exponent range, subnormalization on,
    /// round to nearest with ties to even, and no traps.
    pub const DEFAULT: Context = Context {
        precision: Some(113),
        emin: Some(-1_073_741_823),
        emax: Some(1_073_741_823),
        subnormalize: Some(true),
        rounding: Some(RoundingMode::NearestTiesToEven),
        traps: Some(Flags::empty()),
    };

    /// Returns a copy of this context with the precision set. The value
    /// must lie in `[PREC_MIN, PREC_MAX]`.
    pub fn with_precision(self, precision: usize) -> Result<Self, ContextError> {
        if !(PREC_MIN..=PREC_MAX).contains(&precision) {
            return Err(ContextError::InvalidPrecision { got: precision });
        }
        Ok(Context {
            precision: Some(precision),
            ..self
        })
    }

    /// Returns a copy of this context with both exponent bounds set.
    /// Requires `EMIN_MIN <= emin < emax <= EMAX_MAX`.
    pub fn with_exponent_range(
        self,
        emin: i64,
        emax: i64,
    ) -> Result<Self, ContextError> {
        if emin >= emax || emin < EMIN_MIN || emax > EMAX_MAX {
            return Err(ContextError::InvalidExponentRange { emin, emax });
        }
        Ok(Context {
            emin: Some(emin),
            emax: Some(emax),
            ..self
        })
    }

    /// Returns a copy of this context with subnormalization switched on or
    /// off.
    pub fn with_subnormalize(self, on: bool) -> Self {
        Context {
            subnormalize: Some(on),
            ..self
        }
    }

    /// Returns a copy of this context with the rounding mode set.
    pub fn with_rounding(self, rounding: RoundingMode) -> Self {
        Context {
            rounding: Some(rounding),
            ..self
        }
    }

    /// Returns a copy of this context with the trap set replaced. Flags in
    /// the trap set turn the corresponding exception into an error instead
    /// of a sticky-register entry.
    pub fn with_traps(self, traps: Flags) -> Self {
        Context {
            traps: Some(traps),
            ..self
        }
    }

    /// Combines two contexts field by field: each field of the result is
    /// the override's field when present, and this context's field
    /// otherwise. Associative but not commutative; `Context::new()` is the
    /// identity on both sides. Neither operand is modified.
    pub fn merge(&self, over: &Context) -> Context {
        Context {
            precision: over.precision.or(self.precision),
            emin: over.emin.or(self.emin),
            emax: over.emax.or(self.emax),
            subnormalize: over.subnormalize.or(self.subnormalize),
            rounding: over.rounding.or(self.rounding),
            traps: over.traps.or(self.traps),
        }
    }

    /// The precision in bits, if set.
    pub fn precision(&self) -> Option<usize> {
        self.precision
    }
    /// The minimum normal exponent, if set.
    pub fn emin(&self) -> Option<i64> {
        self.emin
    }
    /// The maximum exponent, if set.
    pub fn emax(&self) -> Option<i64> {
        self.emax
    }
    /// Whether results subnormalize below `2^emin`, if set.
    pub fn subnormalize(&self) -> Option<bool> {
        self.subnormalize
    }
    /// The rounding mode, if set.
    pub fn rounding(&self) -> Option<RoundingMode> {
        self.rounding
    }
    /// The trapped flag set, if set.
    pub fn traps(&self) -> Option<Flags> {
        self.traps
    }

    /// Returns true when every field is present.
    pub fn is_total(&self) -> bool {
        self.precision.is_some()
            && self.emin.is_some()
            && self.emax.is_some()
            && self.subnormalize.is_some()
            && self.rounding.is_some()
            && self.traps.is_some()
    }
}

impl Default for Context {
    /// The empty (all-absent) context, the identity of `merge`.
    fn default() -> Self {
        Self::new()
    }
}

/// Renders only the present fields, in a fixed canonical order, so that
/// the output is stable for diagnostics and tests.
impl Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context(")?;
        let mut sep = "";
        if let Some(p) = self.precision {
            write!(f, "{}precision={}", sep, p)?;
            sep = ", ";
        }
        if let Some(e) = self.emin {
            write!(f, "{}emin={}", sep, e)?;
            sep = ", ";
        }
        if let Some(e) = self.emax {
            write!(f, "{}emax={}", sep, e)?;
            sep = ", ";
        }
        if let Some(s) = self.subnormalize {
            write!(f, "{}subnormalize={}", sep, s)?;
            sep = ", ";
        }
        if let Some(r) = self.rounding {
            write!(f, "{}rounding={}", sep, r)?;
            sep = ", ";
        }
        if let Some(t) = self.traps {
            write!(f, "{}traps={}", sep, t)?;
        }
        write!(f, ")")
    }
}

// IEEE 754-2019
// Table 3.5 — Binary interchange format parameters.
//
// Each preset pins the precision, exponent range and subnormalization of
// the corresponding interchange format; rounding and traps are left absent
// and inherit from the context the preset is merged onto.

/// Binary16: 11 bits of precision, exponents in [-14, 15].
pub const FP16: Context = interchange(11, -14, 15);
/// Binary32: 24 bits of precision, exponents in [-126, 127].
pub const FP32: Context = interchange(24, -126, 127);
/// Binary64: 53 bits of precision, exponents in [-1022, 1023].
pub const FP64: Context = interchange(53, -1022, 1023);
/// Binary128: 113 bits of precision, exponents in [-16382, 16383].
pub const FP128: Context = interchange(113, -16382, 16383);
/// Binary256: 237 bits of precision, exponents in [-262142, 262143].
pub const FP256: Context = interchange(237, -262142, 262143);

const fn interchange(precision: usize, emin: i64, emax: i64) -> Context {
    Context {
        precision: Some(precision),
        emin: Some(emin),
        emax: Some(emax),
        subnormalize: Some(true),
        rounding: None,
        traps: None,
    }
}

#[test]
fn test_merge_right_bias() {
    let a = Context::DEFAULT;
    let b = Context::new().with_precision(24).unwrap();
    let m = a.merge(&b);
    assert_eq!(m.precision(), Some(24));
    assert_eq!(m.emin(), a.emin());
    assert_eq!(m.emax(), a.emax());
    assert_eq!(m.rounding(), a.rounding());
    assert_eq!(m.traps(), a.traps());
}

#[test]
fn test_merge_identity_and_idempotence() {
    let e = Context::new();
    let a = Context::new()
        .with_precision(100)
        .unwrap()
        .with_rounding(RoundingMode::Zero);
    assert_eq!(a.merge(&e), a);
    assert_eq!(e.merge(&a), a);
    assert_eq!(a.merge(&a), a);
    assert_eq!(e.merge(&e), e);
}

#[test]
fn test_merge_totality() {
    assert!(Context::DEFAULT.is_total());
    assert!(!FP64.is_total());
    assert!(Context::DEFAULT.merge(&FP64).is_total());
    assert!(Context::DEFAULT
        .merge(&Context::new().with_subnormalize(false))
        .is_total());
}

#[test]
fn test_validation() {
    assert!(matches!(
        Context::new().with_precision(1),
        Err(ContextError::InvalidPrecision { got: 1 })
    ));
    assert!(Context::new().with_precision(2).is_ok());
    assert!(Context::new().with_precision(PREC_MAX).is_ok());
    assert!(Context::new().with_precision(PREC_MAX + 1).is_err());
    assert!(matches!(
        Context::new().with_exponent_range(10, 10),
        Err(ContextError::InvalidExponentRange { emin: 10, emax: 10 })
    ));
    assert!(Context::new().with_exponent_range(10, 11).is_ok());
    assert!(Context::new()
        .with_exponent_range(EMIN_MIN - 1, 0)
        .is_err());
    assert!(Context::new()
        .with_exponent_range(0, EMAX_MAX + 1)
        .is_err());
}

#[test]
fn test_absent_is_not_a_sentinel() {
    let a = Context::new();
    let b = Context::new().with_subnormalize(false);
    // Absent and present-false are different contexts.
    assert_ne!(a, b);
    assert_eq!(a.subnormalize(), None);
    assert_eq!(b.subnormalize(), Some(false));
}

#[test]
fn test_display_canonical_order() {
    let c = Context::new()
        .with_rounding(RoundingMode::Zero)
        .with_precision(24)
        .unwrap();
    // Fields print in canonical order regardless of construction order.
    assert_eq!(format!("{}", c), "Context(precision=24, rounding=Zero)");
    assert_eq!(format!("{}", Context::new()), "Context()");
    assert_eq!(
        format!("{}", Context::DEFAULT),
        "Context(precision=113, emin=-1073741823, emax=1073741823, \
         subnormalize=true, rounding=NearestTiesToEven, traps=(none))"
    );
}

#[test]
fn test_interchange_presets() {
    for (ctx, p, lo, hi) in [
        (FP16, 11, -14, 15),
        (FP32, 24, -126, 127),
        (FP64, 53, -1022, 1023),
        (FP128, 113, -16382, 16383),
        (FP256, 237, -262142, 262143),
    ] {
        assert_eq!(ctx.precision(), Some(p));
        assert_eq!(ctx.emin(), Some(lo));
        assert_eq!(ctx.emax(), Some(hi));
        assert_eq!(ctx.subnormalize(), Some(true));
        assert_eq!(ctx.rounding(), None);
        assert_eq!(ctx.traps(), None);
    }
}

#[cfg(test)]
mod merge_laws {
    use super::*;
    use proptest::prelude::*;

    fn arb_context() -> impl Strategy<Value = Context> {
        (
            proptest::option::of(2usize..4096),
            proptest::option::of((-100i64..0, 1i64..100)),
            proptest::option::of(any::<bool>()),
            proptest::option::of(0u8..7),
            proptest::option::of(0u8..32),
        )
            .prop_map(|(prec, exp, sub, rm, traps)| {
                let mut c = Context::new();
                if let Some(p) = prec {
                    c = c.with_precision(p).unwrap();
                }
                if let Some((lo, hi)) = exp {
                    c = c.with_exponent_range(lo, hi).unwrap();
                }
                if let Some(s) = sub {
                    c = c.with_subnormalize(s);
                }
                if let Some(r) = rm {
                    let modes = [
                        RoundingMode::NearestTiesToEven,
                        RoundingMode::NearestTiesToAway,
                        RoundingMode::Zero,
                        RoundingMode::Positive,
                        RoundingMode::Negative,
                        RoundingMode::AwayFromZero,
                        RoundingMode::Faithful,
                    ];
                    c = c.with_rounding(modes[r as usize]);
                }
                if let Some(t) = traps {
                    c = c.with_traps(Flags::from_bits_truncate(t));
                }
                c
            })
    }

    proptest! {
        #[test]
        fn associative(a in arb_context(), b in arb_context(), c in arb_context()) {
            prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        }

        #[test]
        fn identity(a in arb_context()) {
            let e = Context::new();
            prop_assert_eq!(a.merge(&e), a);
            prop_assert_eq!(e.merge(&a), a);
        }

        #[test]
        fn total_base_stays_total(b in arb_context()) {
            prop_assert!(Context::DEFAULT.merge(&b).is_total());
        }
    }
}
