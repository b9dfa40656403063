//! Decimal arithmetic over textual cell values.
//!
//! Cells are strings; numeric opcodes parse on read and format on write.
//! Everything is computed in-process on scaled 128-bit integers, and the
//! formatter always keeps a digit before the decimal point (`0.5`, `-0.5`),
//! which guest programs rely on.

use crate::emulator::errors::EmuError;

/// A fixed-point decimal: `units / 10^scale`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Decimal {
    units: i128,
    scale: u32,
}

fn pow10(n: u32) -> Result<i128, EmuError> {
    10i128
        .checked_pow(n)
        .ok_or(EmuError::NumericOverflow { op: "scale" })
}

impl Decimal {
    fn parse(token: &str) -> Result<Decimal, EmuError> {
        let err = || EmuError::NotANumber {
            token: token.to_string(),
        };

        let text = token.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if digits.contains('.') && (frac_part.is_empty() || !frac_part.bytes().all(|b| b.is_ascii_digit())) {
            return Err(err());
        }

        let scale = frac_part.len() as u32;
        let mut units: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add((b - b'0') as i128))
                .ok_or(EmuError::NumericOverflow { op: "parse" })?;
        }
        if negative {
            units = -units;
        }

        Ok(Decimal { units, scale })
    }

    /// Rescales to exactly `scale` fractional digits, truncating toward
    /// zero when digits are dropped.
    fn rescale(self, scale: u32) -> Result<Decimal, EmuError> {
        let units = if scale >= self.scale {
            self.units
                .checked_mul(pow10(scale - self.scale)?)
                .ok_or(EmuError::NumericOverflow { op: "rescale" })?
        } else {
            self.units / pow10(self.scale - scale)?
        };
        Ok(Decimal { units, scale })
    }

    /// Integer part, truncated toward zero.
    fn truncate(self) -> Result<i128, EmuError> {
        Ok(self.rescale(0)?.units)
    }

    fn format(self) -> String {
        if self.scale == 0 {
            return self.units.to_string();
        }
        let divisor = 10i128.pow(self.scale);
        let sign = if self.units < 0 { "-" } else { "" };
        let abs = self.units.unsigned_abs();
        let int_part = abs / divisor.unsigned_abs();
        let frac_part = abs % divisor.unsigned_abs();
        format!(
            "{sign}{int_part}.{frac_part:0width$}",
            width = self.scale as usize
        )
    }
}

/// True when the token is an optional sign, digits, and an optional
/// fractional part. The empty string is not a number.
pub fn is_number(token: &str) -> bool {
    Decimal::parse(token).is_ok()
}

/// Parses a strict integer: optional sign and digits, no fractional part.
pub fn parse_integer(token: &str) -> Result<i128, EmuError> {
    let text = token.trim();
    let digits = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EmuError::NotAnInteger {
            token: token.to_string(),
        });
    }
    text.parse::<i128>().map_err(|_| EmuError::NumericOverflow { op: "parse" })
}

/// Parses a decimal and truncates it toward zero, for the integer-only
/// division and modulus opcodes.
pub fn parse_truncated(token: &str) -> Result<i128, EmuError> {
    Decimal::parse(token)?.truncate()
}

/// `a + b`, fractional digits aligned to the wider operand.
pub fn add(a: &str, b: &str) -> Result<String, EmuError> {
    add_decimals(Decimal::parse(a)?, Decimal::parse(b)?)
}

/// `a - b`, fractional digits aligned to the wider operand.
pub fn sub(a: &str, b: &str) -> Result<String, EmuError> {
    let b = Decimal::parse(b)?;
    add_decimals(
        Decimal::parse(a)?,
        Decimal {
            units: -b.units,
            scale: b.scale,
        },
    )
}

/// `a + 1`, keeping the fractional digits of `a`.
pub fn incr(a: &str) -> Result<String, EmuError> {
    add(a, "1")
}

/// `a - 1`, keeping the fractional digits of `a`.
pub fn decr(a: &str) -> Result<String, EmuError> {
    sub(a, "1")
}

fn add_decimals(a: Decimal, b: Decimal) -> Result<String, EmuError> {
    let scale = a.scale.max(b.scale);
    let a = a.rescale(scale)?;
    let b = b.rescale(scale)?;
    let units = a
        .units
        .checked_add(b.units)
        .ok_or(EmuError::NumericOverflow { op: "add" })?;
    Ok(Decimal { units, scale }.format())
}

/// `a * b` with a two-decimal scale cap: the result carries
/// `min(scale a + scale b, max(2, scale a, scale b))` fractional digits,
/// truncated toward zero.
pub fn mul(a: &str, b: &str) -> Result<String, EmuError> {
    let a = Decimal::parse(a)?;
    let b = Decimal::parse(b)?;
    let units = a
        .units
        .checked_mul(b.units)
        .ok_or(EmuError::NumericOverflow { op: "mul" })?;
    let full = Decimal {
        units,
        scale: a.scale + b.scale,
    };
    let target = (a.scale + b.scale).min(2.max(a.scale).max(b.scale));
    Ok(full.rescale(target)?.format())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition() {
        assert_eq!(add("3", "4").unwrap(), "7");
        assert_eq!(add("-3", "4").unwrap(), "1");
        assert_eq!(add("0", "0").unwrap(), "0");
    }

    #[test]
    fn fractional_addition_aligns_scales() {
        assert_eq!(add("1.5", "0.25").unwrap(), "1.75");
        assert_eq!(add("2.50", "0.50").unwrap(), "3.00");
        assert_eq!(add("0.1", "0.2").unwrap(), "0.3");
    }

    #[test]
    fn leading_zero_is_preserved() {
        assert_eq!(add("0.5", "0").unwrap(), "0.5");
        assert_eq!(sub("0.25", "0.75").unwrap(), "-0.50");
        assert_eq!(sub("-1.25", "-0.75").unwrap(), "-0.50");
    }

    #[test]
    fn subtraction() {
        assert_eq!(sub("10", "3").unwrap(), "7");
        assert_eq!(sub("3", "10").unwrap(), "-7");
        assert_eq!(sub("1.00", "1").unwrap(), "0.00");
    }

    #[test]
    fn increment_and_decrement() {
        assert_eq!(incr("41").unwrap(), "42");
        assert_eq!(decr("0").unwrap(), "-1");
        assert_eq!(incr("0.5").unwrap(), "1.5");
        assert_eq!(decr("0.5").unwrap(), "-0.5");
    }

    #[test]
    fn multiplication_scale_rule() {
        assert_eq!(mul("3", "4").unwrap(), "12");
        assert_eq!(mul("1.25", "2.0").unwrap(), "2.50");
        assert_eq!(mul("-1.5", "2").unwrap(), "-3.0");
        // 0.125 * 0.125 = 0.015625, truncated to two decimals
        assert_eq!(mul("0.125", "0.125").unwrap(), "0.015");
    }

    #[test]
    fn mul_truncates_toward_zero() {
        assert_eq!(mul("-0.125", "0.125").unwrap(), "-0.015");
    }

    #[test]
    fn is_number_accepts_signed_decimals() {
        for token in ["0", "7", "-7", "+7", "3.25", "-0.5", " 12 "] {
            assert!(is_number(token), "expected number: {token:?}");
        }
    }

    #[test]
    fn is_number_rejects_garbage() {
        for token in ["", "abc", "1.", ".5", "1.2.3", "--1", "1e5", "0x10"] {
            assert!(!is_number(token), "expected non-number: {token:?}");
        }
    }

    #[test]
    fn strict_integer_parse() {
        assert_eq!(parse_integer("42").unwrap(), 42);
        assert_eq!(parse_integer("-42").unwrap(), -42);
        for token in ["", "4.2", "abc", "4a"] {
            assert!(matches!(
                parse_integer(token),
                Err(EmuError::NotAnInteger { .. })
            ));
        }
    }

    #[test]
    fn truncated_parse() {
        assert_eq!(parse_truncated("7").unwrap(), 7);
        assert_eq!(parse_truncated("7.9").unwrap(), 7);
        assert_eq!(parse_truncated("-7.9").unwrap(), -7);
        assert!(parse_truncated("x").is_err());
    }

    #[test]
    fn non_numbers_are_rejected() {
        assert!(matches!(add("a", "1"), Err(EmuError::NotANumber { .. })));
        assert!(matches!(mul("1", ""), Err(EmuError::NotANumber { .. })));
    }
}
