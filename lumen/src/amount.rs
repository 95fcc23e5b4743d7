//! Fixed-point amount codec.
//!
//! Amounts travel through the public API as decimal strings (`"2.5"`) so
//! nobody is tempted to do float arithmetic on money. Internally they are
//! `i64` stroops: `round(decimal * 10^7)`. Parsing is pure integer work;
//! anything with more than seven fractional digits is rejected rather than
//! silently rounded.
//!
//! ```
//! use lumen::amount::{parse_amount, to_amount_string};
//!
//! assert_eq!(parse_amount("2.5").unwrap(), 25_000_000);
//! assert_eq!(to_amount_string(10_000_000), "1.0000000");
//! ```

use thiserror::Error;

use crate::config::{AMOUNT_DECIMALS, STROOPS_PER_UNIT};

/// Errors produced while parsing an amount string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount {0:?}: expected a non-negative decimal number")]
    Malformed(String),

    #[error("invalid amount {0:?}: more than 7 fractional digits")]
    TooPrecise(String),

    #[error("amount {0:?} does not fit in 64 bits")]
    Overflow(String),
}

/// Parses a decimal amount string into stroops.
pub fn parse_amount(s: &str) -> Result<i64, AmountError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
        return Err(AmountError::Malformed(s.to_string()));
    }
    if frac.len() > AMOUNT_DECIMALS {
        return Err(AmountError::TooPrecise(s.to_string()));
    }

    let overflow = || AmountError::Overflow(s.to_string());

    let whole_units: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };

    let mut frac_units: i64 = 0;
    for (i, b) in frac.bytes().enumerate() {
        let place = 10i64.pow((AMOUNT_DECIMALS - 1 - i) as u32);
        frac_units += i64::from(b - b'0') * place;
    }

    whole_units
        .checked_mul(STROOPS_PER_UNIT)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(overflow)
}

/// Formats stroops as a decimal string with exactly seven fractional digits.
pub fn to_amount_string(stroops: i64) -> String {
    let sign = if stroops < 0 { "-" } else { "" };
    let abs = stroops.unsigned_abs();
    let unit = STROOPS_PER_UNIT as u64;
    format!(
        "{}{}.{:0>width$}",
        sign,
        abs / unit,
        abs % unit,
        width = AMOUNT_DECIMALS
    )
}

/// Parses an amount and re-renders it in canonical form.
pub fn canonical_amount(s: &str) -> Result<String, AmountError> {
    parse_amount(s).map(to_amount_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_common_amounts() {
        assert_eq!(parse_amount("2.5").unwrap(), 25_000_000);
        assert_eq!(parse_amount("1").unwrap(), 10_000_000);
        assert_eq!(parse_amount("0.0000001").unwrap(), 1);
        assert_eq!(parse_amount(".5").unwrap(), 5_000_000);
        assert_eq!(parse_amount("3.").unwrap(), 30_000_000);
        assert_eq!(parse_amount(" 10 ").unwrap(), 100_000_000);
    }

    #[test]
    fn formats_with_seven_decimals() {
        assert_eq!(to_amount_string(10_000_000), "1.0000000");
        assert_eq!(to_amount_string(1), "0.0000001");
        assert_eq!(to_amount_string(0), "0.0000000");
        assert_eq!(to_amount_string(-25_000_000), "-2.5000000");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_amount(""), Err(AmountError::Empty));
        assert!(matches!(parse_amount("."), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_amount("-1"), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_amount("1e5"), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_amount("1.2.3"), Err(AmountError::Malformed(_))));
        assert!(matches!(
            parse_amount("0.00000001"),
            Err(AmountError::TooPrecise(_))
        ));
    }

    #[test]
    fn rejects_overflow() {
        // i64::MAX stroops is 922337203685.4775807 units.
        assert_eq!(parse_amount("922337203685.4775807").unwrap(), i64::MAX);
        assert!(matches!(
            parse_amount("922337203685.4775808"),
            Err(AmountError::Overflow(_))
        ));
        assert!(matches!(
            parse_amount("99999999999999999999"),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn canonical_form() {
        assert_eq!(canonical_amount("2.5").unwrap(), "2.5000000");
        assert_eq!(canonical_amount("007.10").unwrap(), "7.1000000");
    }

    proptest! {
        #[test]
        fn round_trip_preserves_value(whole in 0u64..922_337_203_685u64, frac in 0u32..10_000_000u32, digits in 0usize..=7) {
            // Render `frac` with `digits` fractional places, dropping the rest.
            let scale = 10u32.pow(7 - digits as u32);
            let truncated = frac / scale;
            let s = if digits == 0 {
                whole.to_string()
            } else {
                format!("{}.{:0>width$}", whole, truncated, width = digits)
            };

            let expected = format!("{}.{:0>7}", whole, truncated * scale);
            prop_assert_eq!(to_amount_string(parse_amount(&s).unwrap()), expected);
        }

        #[test]
        fn format_then_parse_is_identity(stroops in 0i64..i64::MAX) {
            prop_assert_eq!(parse_amount(&to_amount_string(stroops)).unwrap(), stroops);
        }
    }
}
