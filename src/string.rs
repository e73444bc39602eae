//! Decimal string conversion.
//!
//! Parsing rounds once: the digit string is converted to an exact scaled
//! integer, divided by the power of five that the decimal exponent calls
//! for (with an exact remainder), and handed to the rounding kernel under
//! the effective context. Inexact parses raise the same sticky flag as
//! any other operation, and trap the same way.
//!
//! Printing follows the opposite path, converting the significand to a
//! base-10 integer and trimming the digits the realized precision cannot
//! justify. For the round-trip-faithful treatment of both directions see
//! "How to Print Floating-Point Numbers Accurately" (Steele & White).

use core::fmt::{self, Display};
use core::str::FromStr;

use crate::bigint::{BigInt, LossFraction};
use crate::context::Context;
use crate::engine::{self, Params};
use crate::error::{EvalError, ParseError};
use crate::flags::{self, Flags};
use crate::ops;
use crate::value::{Category, Float};

enum Parsed {
    Special(Float),
    Number {
        sign: bool,
        digits: BigInt,
        dec_exp: i64,
    },
}

fn parse_decimal(s: &str) -> Result<Parsed, ParseError> {
    if s.is_empty() {
        return Err(ParseError::Empty);
    }
    let (sign, rest) = match s.as_bytes()[0] {
        b'+' => (false, &s[1..]),
        b'-' => (true, &s[1..]),
        _ => (false, s),
    };
    if rest.is_empty() {
        return Err(ParseError::Empty);
    }
    if rest.eq_ignore_ascii_case("nan") {
        return Ok(Parsed::Special(Float::nan(sign)));
    }
    if rest.eq_ignore_ascii_case("inf") || rest.eq_ignore_ascii_case("infinity")
    {
        return Ok(Parsed::Special(Float::infinity(sign)));
    }

    let (num_part, exp_part) = match rest.find(['e', 'E']) {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };
    let exp: i64 = match exp_part {
        None => 0,
        Some(e) => e.parse().map_err(|_| ParseError::BadExponent)?,
    };

    let ten = BigInt::from_u64(10);
    let mut digits = BigInt::zero();
    let mut frac_digits: i64 = 0;
    let mut seen_point = false;
    let mut seen_digit = false;
    for ch in num_part.chars() {
        match ch {
            '.' if !seen_point => seen_point = true,
            d @ '0'..='9' => {
                seen_digit = true;
                digits.inplace_mul(&ten);
                digits.inplace_add(&BigInt::from_u64(d as u64 - '0' as u64));
                if seen_point {
                    frac_digits += 1;
                }
            }
            c => return Err(ParseError::InvalidChar(c)),
        }
    }
    if !seen_digit {
        return Err(ParseError::Empty);
    }
    Ok(Parsed::Number {
        sign,
        digits,
        dec_exp: exp - frac_digits,
    })
}

/// Converts an exact decimal `digits * 10^dec_exp` to a float under the
/// resolved parameters, rounding once.
fn decimal_to_float(
    sign: bool,
    digits: BigInt,
    dec_exp: i64,
    p: &Params,
) -> (Float, Flags) {
    if digits.is_zero() {
        return (Float::zero_with_prec(sign, p.precision), Flags::empty());
    }
    if dec_exp >= 0 {
        // An exact integer: scale up and round.
        let mut m = digits;
        m.inplace_mul(&BigInt::from_u64(10).powi(dec_exp as u64));
        engine::round_parts(sign, m, 0, LossFraction::ExactlyZero, p)
    } else {
        // digits / 10^k == (digits << s) / 5^k scaled by 2^-(s + k); the
        // remainder of the division classifies the discarded fraction.
        let k = dec_exp.unsigned_abs();
        let five_k = BigInt::from_u64(5).powi(k);
        let s = (p.precision as i64 + 2 + five_k.msb_index() as i64
            - digits.msb_index() as i64)
            .max(0);
        let mut num = digits;
        num.shift_left(s as usize);
        let rem = num.inplace_div(&five_k);
        let loss = if rem.is_zero() {
            LossFraction::ExactlyZero
        } else {
            let mut twice = rem;
            twice.shift_left(1);
            if twice < five_k {
                LossFraction::LessThanHalf
            } else {
                // 5^k is odd, so an exact half cannot occur.
                LossFraction::MoreThanHalf
            }
        };
        let lsb = -(s + k as i64);
        engine::round_parts(sign, num, lsb, loss, p)
    }
}

fn parse_impl(s: &str, call: Option<&Context>) -> Result<Float, EvalError> {
    let parsed = parse_decimal(s)?;
    match parsed {
        Parsed::Special(v) => Ok(v),
        Parsed::Number {
            sign,
            digits,
            dec_exp,
        } => {
            let (params, traps) = ops::resolve_params(call);
            let (val, fired) = decimal_to_float(sign, digits, dec_exp, &params);
            flags::record_operation(fired, traps)?;
            Ok(val)
        }
    }
}

/// Parses a decimal string under the current context.
pub fn parse(s: &str) -> Result<Float, EvalError> {
    parse_impl(s, None)
}

/// Parses a decimal string under the current context merged with `ctx`.
pub fn parse_with(s: &str, ctx: &Context) -> Result<Float, EvalError> {
    parse_impl(s, Some(ctx))
}

impl FromStr for Float {
    type Err = EvalError;

    /// Parses under the ambient current context.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl Float {
    fn format_normal(&self) -> String {
        // Rewrite m * 2^lsb as integer * 10^-e, multiplying by powers of
        // five: 2^-k == 5^k * 10^-k.
        let lsb = self.lsb_exp();
        let mut int = self.significand();
        let mut e: i64 = 0;
        if lsb >= 0 {
            int.shift_left(lsb as usize);
        } else {
            let k = lsb.unsigned_abs();
            int.inplace_mul(&BigInt::from_u64(5).powi(k));
            e = k as i64;
        }

        // Drop fractional digits beyond what the significand width can
        // justify. Values with very short significands print their exact
        // expansion in full; 59/196 approximates log10(2).
        let bits = int.msb_index();
        let width = self.precision().max(24);
        if bits > width {
            let mut remove = ((bits - width) * 59 / 196) as i64;
            remove = remove.min(e);
            if remove > 0 {
                e -= remove;
                let ten_r = BigInt::from_u64(10).powi(remove as u64);
                let _ = int.inplace_div(&ten_r);
            }
        }

        let mut buf: Vec<char> = int.to_decimal_string().chars().collect();
        while (buf.len() as i64) < e {
            buf.insert(0, '0');
        }
        buf.insert(buf.len() - e as usize, '.');
        while buf.last() == Some(&'0') {
            let _ = buf.pop();
        }
        if buf.last() == Some(&'.') {
            buf.push('0');
        }
        if buf.first() == Some(&'.') {
            buf.insert(0, '0');
        }
        buf.into_iter().collect()
    }
}

impl Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign() {
            write!(f, "-")?;
        }
        match self.category() {
            Category::NaN => write!(f, "NaN"),
            Category::Infinity => write!(f, "Inf"),
            Category::Zero => write!(f, "0.0"),
            Category::Normal => write!(f, "{}", self.format_normal()),
        }
    }
}
