//! Human-readable duration defaults (`"15m"`, `"1h30m"`) as unit
//! multiplications in generated code.
//!
//! The literal stays readable in the output (`15 * time.Minute`) instead of
//! becoming a precomputed nanosecond count. Go constant arithmetic rejects
//! fractional multiples of a typed unit, so `1.5h` is written as
//! `90 * time.Minute`.

use crate::core::error::GenError;

/// Units in decreasing size, with their size relative to the next one down
/// and in nanoseconds.
const UNITS: &[(&[&str], &str, u64, u64)] = &[
    (&["h"], "Hour", 60, 3_600_000_000_000),
    (&["m"], "Minute", 60, 60_000_000_000),
    (&["s"], "Second", 1000, 1_000_000_000),
    (&["ms"], "Millisecond", 1000, 1_000_000),
    (&["us", "µs", "μs"], "Microsecond", 1000, 1_000),
    (&["ns"], "Nanosecond", 1, 1),
];

/// One `N * unit` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationTerm {
    pub amount: u64,
    /// Go constant name in the `time` package (`Minute`).
    pub unit: &'static str,
    nanos: u64,
}

/// A parsed duration literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationLiteral {
    pub negative: bool,
    /// Empty for zero.
    pub terms: Vec<DurationTerm>,
}

impl DurationLiteral {
    /// Parse the `time.ParseDuration` syntax: an optional sign followed by
    /// one or more decimal numbers, each with a unit suffix. A bare `0` is
    /// allowed.
    pub fn parse(text: &str) -> Result<Self, GenError> {
        let invalid = || GenError::conflict(format!("`{}` is not a valid duration", text));

        let trimmed = text.trim();
        let (negative, mut rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        if rest == "0" {
            return Ok(Self {
                negative: false,
                terms: Vec::new(),
            });
        }
        if rest.is_empty() {
            return Err(invalid());
        }

        let mut terms = Vec::new();
        while !rest.is_empty() {
            let number_end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(invalid)?;
            let number = &rest[..number_end];
            rest = &rest[number_end..];

            let unit_end = rest
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(rest.len());
            let unit = &rest[..unit_end];
            rest = &rest[unit_end..];

            let position = UNITS
                .iter()
                .position(|(suffixes, ..)| suffixes.contains(&unit))
                .ok_or_else(invalid)?;
            let term = scale_term(number, position).ok_or_else(invalid)?;
            if term.amount > 0 {
                terms.push(term);
            }
        }

        // `time.Duration` is an int64 nanosecond count; larger constants do
        // not compile.
        let total = terms
            .iter()
            .map(|t| u128::from(t.amount) * u128::from(t.nanos))
            .sum::<u128>();
        if total > i64::MAX as u128 {
            return Err(GenError::conflict(format!(
                "`{}` overflows time.Duration",
                text
            )));
        }

        Ok(Self {
            negative: negative && !terms.is_empty(),
            terms,
        })
    }

    /// Go expression using `alias` as the name of the `time` package.
    pub fn to_go_expr(&self, alias: &str) -> String {
        match self.terms.as_slice() {
            [] => "0".to_string(),
            [term] => {
                let sign = if self.negative { "-" } else { "" };
                format!("{}{} * {}.{}", sign, term.amount, alias, term.unit)
            }
            terms => {
                let sum = terms
                    .iter()
                    .map(|t| format!("{}*{}.{}", t.amount, alias, t.unit))
                    .collect::<Vec<_>>()
                    .join(" + ");
                if self.negative {
                    format!("-({})", sum)
                } else {
                    sum
                }
            }
        }
    }
}

/// Turn `number` of unit `position` into a whole multiple, moving to smaller
/// units while there is a fractional part.
fn scale_term(number: &str, mut position: usize) -> Option<DurationTerm> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let mut fraction = fraction.trim_end_matches('0').to_string();
    let mut amount: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };

    while !fraction.is_empty() {
        let factor = UNITS[position].2;
        if factor == 1 {
            return None;
        }
        let scaled = factor * fraction.parse::<u64>().ok()?;
        let divisor = 10u64.checked_pow(fraction.len() as u32)?;
        amount = amount.checked_mul(factor)?.checked_add(scaled / divisor)?;
        let remainder = scaled % divisor;
        fraction = if remainder == 0 {
            String::new()
        } else {
            format!("{:0width$}", remainder, width = fraction.len())
                .trim_end_matches('0')
                .to_string()
        };
        position += 1;
    }

    Some(DurationTerm {
        amount,
        unit: UNITS[position].1,
        nanos: UNITS[position].3,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn expr(text: &str) -> String {
        DurationLiteral::parse(text).unwrap().to_go_expr("time")
    }

    #[test]
    fn test_single_unit() {
        assert_eq!(expr("15m"), "15 * time.Minute");
        assert_eq!(expr("2h"), "2 * time.Hour");
        assert_eq!(expr("250ms"), "250 * time.Millisecond");
        assert_eq!(expr("10µs"), "10 * time.Microsecond");
    }

    #[test]
    fn test_compound() {
        assert_eq!(expr("1h30m"), "1*time.Hour + 30*time.Minute");
        assert_eq!(expr("-1h30m"), "-(1*time.Hour + 30*time.Minute)");
    }

    #[test]
    fn test_sign_and_zero() {
        assert_eq!(expr("-15s"), "-15 * time.Second");
        assert_eq!(expr("0"), "0");
        assert_eq!(expr("-0s"), "0");
    }

    #[test]
    fn test_fractions_move_to_smaller_units() {
        assert_eq!(expr("1.5h"), "90 * time.Minute");
        assert_eq!(expr(".5s"), "500 * time.Millisecond");
        assert_eq!(expr("1.25s"), "1250 * time.Millisecond");
        assert_eq!(expr("2.0m"), "2 * time.Minute");
    }

    #[test]
    fn test_custom_alias() {
        assert_eq!(
            DurationLiteral::parse("5s").unwrap().to_go_expr("stdtime"),
            "5 * stdtime.Second"
        );
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert_eq!(expr("2562047h"), "2562047 * time.Hour");
        for text in ["3000000h", "2562048h", "2562047h48m", "9223372036854775808ns"] {
            let err = DurationLiteral::parse(text).unwrap_err();
            assert!(err.to_string().contains("overflows time.Duration"), "{}", text);
        }
    }

    #[test]
    fn test_invalid() {
        for text in ["", "15", "15x", "m", "1.5ns", "abc", "1h-5m"] {
            assert!(DurationLiteral::parse(text).is_err(), "{}", text);
        }
    }
}
