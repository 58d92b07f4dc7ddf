//! Turns numeric literal text into an exact binary fixed point value: an odd
//! mantissa and a base 2 exponent. The literal's type is the narrowest
//! unsigned fixed point type holding that mantissa.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use thiserror::Error;

use crate::middle::primitive::PrimitiveType;

/// Inexact quotients keep at least this many significant bits
const INEXACT_PRECISION: u64 = 64;

/// Largest radix exponent accepted before giving up on exact arithmetic
const MAX_RADIX_EXPONENT: i64 = 1 << 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("literal has no digits")]
    Empty,

    #[error("`{0}` is not a valid digit for this radix")]
    InvalidDigit(char),

    #[error("literal has more than one radix point")]
    MultiplePoints,

    #[error("malformed exponent")]
    InvalidExponent,

    #[error("exponent is out of range")]
    ExponentOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericLiteral {
    pub mantissa: BigUint,
    pub exponent: i32,
    /// The value was rounded to nearest because the literal has no finite
    /// binary representation (e.g. `0.1`)
    pub inexact: bool,
}

impl NumericLiteral {
    pub fn bitwidth(&self) -> u32 {
        self.mantissa.bits().max(1) as u32
    }

    pub fn ty(&self) -> PrimitiveType {
        PrimitiveType::unsigned(self.bitwidth()).with_exponent(self.exponent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Boolean(bool),
    Numeric(NumericLiteral),
}

impl Literal {
    pub fn ty(&self) -> PrimitiveType {
        match self {
            Literal::Boolean(_) => PrimitiveType::BOOLEAN,
            Literal::Numeric(numeric) => numeric.ty(),
        }
    }

    /// Accepts `123`, `1.25`, `1.5e3`, `25e-2`, `0x1F`, `0x1.8`, `0o17`,
    /// `0b1.01`, `true` and `false`. Underscores separate digits.
    pub fn parse(text: &str) -> Result<Self, LiteralError> {
        match text {
            "true" => return Ok(Literal::Boolean(true)),
            "false" => return Ok(Literal::Boolean(false)),
            _ => {}
        }

        let text: String = text.chars().filter(|c| *c != '_').collect();

        let (radix, body) = match text.get(..2) {
            Some("0x" | "0X") => (16, &text[2..]),
            Some("0o" | "0O") => (8, &text[2..]),
            Some("0b" | "0B") => (2, &text[2..]),
            _ => (10, text.as_str()),
        };

        // Only decimal literals carry an exponent, `e` is a hex digit
        let (digits, decimal_exponent) = match body.split_once(['e', 'E']) {
            Some((digits, exponent)) if radix == 10 => {
                if exponent.is_empty() || exponent == "-" || exponent == "+" {
                    return Err(LiteralError::InvalidExponent);
                }

                let exponent = exponent
                    .parse::<i64>()
                    .map_err(|_| LiteralError::InvalidExponent)?;

                (digits, exponent)
            }
            _ => (body, 0),
        };

        let (integer, fraction) = match digits.split_once('.') {
            Some((_, fraction)) if fraction.contains('.') => return Err(LiteralError::MultiplePoints),
            Some((integer, fraction)) => (integer, fraction),
            None => (digits, ""),
        };

        if integer.is_empty() && fraction.is_empty() {
            return Err(LiteralError::Empty);
        }

        if let Some(c) = integer
            .chars()
            .chain(fraction.chars())
            .find(|c| !c.is_digit(radix))
        {
            return Err(LiteralError::InvalidDigit(c));
        }

        let all_digits = format!("{integer}{fraction}");
        let mantissa = BigUint::parse_bytes(all_digits.as_bytes(), radix).ok_or(LiteralError::Empty)?;

        let radix_exponent = decimal_exponent - fraction.len() as i64;

        if radix_exponent.abs() > MAX_RADIX_EXPONENT {
            return Err(LiteralError::ExponentOutOfRange);
        }

        normalize(mantissa, radix, radix_exponent).map(Literal::Numeric)
    }
}

/// Factors `radix^n` into `2^k * odd`
fn factor_radix_power(radix: u32, n: u32) -> (u64, BigUint) {
    let twos = radix.trailing_zeros();
    let odd = BigUint::from(radix >> twos);

    (twos as u64 * n as u64, odd.pow(n))
}

fn normalize(mut mantissa: BigUint, radix: u32, radix_exponent: i64) -> Result<NumericLiteral, LiteralError> {
    let mut exponent: i64 = 0;
    let mut inexact = false;

    if radix_exponent >= 0 {
        mantissa *= BigUint::from(radix).pow(radix_exponent as u32);
    } else {
        let (twos, odd) = factor_radix_power(radix, radix_exponent.unsigned_abs() as u32);
        exponent -= twos as i64;

        if (&mantissa % &odd).is_zero() {
            mantissa /= &odd;
        } else {
            // Scale up so the quotient keeps enough significant bits
            let shift = (INEXACT_PRECISION + odd.bits()).saturating_sub(mantissa.bits()) + 1;
            mantissa <<= shift;
            exponent -= shift as i64;

            let remainder = &mantissa % &odd;
            mantissa /= &odd;

            if remainder * 2u32 >= odd {
                mantissa += BigUint::one();
            }

            inexact = true;
        }
    }

    if mantissa.is_zero() {
        return Ok(NumericLiteral {
            mantissa,
            exponent: 0,
            inexact,
        });
    }

    if let Some(zeros) = mantissa.trailing_zeros() {
        mantissa >>= zeros;
        exponent += zeros as i64;
    }

    Ok(NumericLiteral {
        mantissa,
        exponent: exponent.to_i32().ok_or(LiteralError::ExponentOutOfRange)?,
        inexact,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(text: &str) -> NumericLiteral {
        match Literal::parse(text) {
            Ok(Literal::Numeric(numeric)) => numeric,
            other => panic!("expected a numeric literal for {text}, got {other:?}"),
        }
    }

    fn exact(text: &str, mantissa: u64, exponent: i32) {
        let literal = numeric(text);

        assert_eq!(literal.mantissa, BigUint::from(mantissa), "{text}");
        assert_eq!(literal.exponent, exponent, "{text}");
        assert!(!literal.inexact, "{text}");
    }

    #[test]
    fn decimal_fraction() {
        exact("1.25", 5, -2);
        assert_eq!(numeric("1.25").bitwidth(), 3);
        assert_eq!(numeric("1.25").ty().to_string(), "ufixed3e-2");
    }

    #[test]
    fn trailing_zero_bits_move_into_the_exponent() {
        exact("0x10", 1, 4);
        exact("1.5e3", 375, 2);
        exact("96", 3, 5);
    }

    #[test]
    fn negative_decimal_exponent() {
        exact("25e-2", 1, -2);
        exact("0.5", 1, -1);
    }

    #[test]
    fn other_radixes() {
        exact("0x1F", 31, 0);
        exact("0x1.8", 3, -1);
        exact("0b1.01", 5, -2);
        exact("0b101", 5, 0);
        exact("0o17", 15, 0);
    }

    #[test]
    fn integers_are_plain_unsigned() {
        assert_eq!(numeric("123").ty(), PrimitiveType::unsigned(7));
        assert_eq!(numeric("1_000").ty().to_string(), "ufixed7e3");
    }

    #[test]
    fn zero_is_one_bit() {
        exact("0", 0, 0);
        exact("0.000", 0, 0);
        assert_eq!(numeric("0").ty(), PrimitiveType::unsigned(1));
    }

    #[test]
    fn inexact_values_are_rounded() {
        let tenth = numeric("0.1");

        assert!(tenth.inexact);
        assert!(tenth.mantissa.bits() >= 64);
        // The mantissa is odd after normalization
        assert_eq!(tenth.mantissa.trailing_zeros(), Some(0));

        let value = tenth.mantissa.to_f64().unwrap() * 2f64.powi(tenth.exponent);
        assert!((value - 0.1).abs() < 1e-18);
    }

    #[test]
    fn booleans() {
        assert_eq!(Literal::parse("true"), Ok(Literal::Boolean(true)));
        assert_eq!(Literal::parse("false").unwrap().ty(), PrimitiveType::BOOLEAN);
    }

    #[test]
    fn malformed_literals() {
        assert_eq!(Literal::parse(""), Err(LiteralError::Empty));
        assert_eq!(Literal::parse("0x"), Err(LiteralError::Empty));
        assert_eq!(Literal::parse("12a"), Err(LiteralError::InvalidDigit('a')));
        assert_eq!(Literal::parse("0b102"), Err(LiteralError::InvalidDigit('2')));
        assert_eq!(Literal::parse("1.2.3"), Err(LiteralError::MultiplePoints));
        assert_eq!(Literal::parse("1e"), Err(LiteralError::InvalidExponent));
        assert_eq!(Literal::parse("1e-"), Err(LiteralError::InvalidExponent));
        assert_eq!(Literal::parse("1e999999"), Err(LiteralError::ExponentOutOfRange));
    }
}
