use thiserror::Error;

/// Amounts are signed integers: cents for monetary entries (so €12.34 is
/// stored as 1234), plain counts for item entries. Integer storage avoids
/// floating-point precision issues.
pub type Amount = i32;

/// Maximum number of decimal digits accepted in amount input. Nine digits
/// always fit an `i32` after the caller applies sign and scale.
pub const MAX_AMOUNT_DIGITS: usize = 9;

/// Decimal separator convention used when rendering amounts. Input parsing
/// is deliberately locale-blind: every `.` and `,` is stripped before the
/// digits are reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalSeparator {
    /// "1,234,567.89"
    Point,
    /// "1.234.567,89"
    Comma,
}

impl DecimalSeparator {
    fn decimal(self) -> char {
        match self {
            DecimalSeparator::Point => '.',
            DecimalSeparator::Comma => ',',
        }
    }

    fn grouping(self) -> char {
        match self {
            DecimalSeparator::Point => ',',
            DecimalSeparator::Comma => '.',
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid character in amount: {0:?}")]
    InvalidCharacter(char),
}

/// Outcome of [`parse_amount`]. `truncated` is set when the input exceeded
/// [`MAX_AMOUNT_DIGITS`] and trailing digits were dropped; that is a
/// warning for the caller to surface, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAmount {
    pub magnitude: Amount,
    pub truncated: bool,
}

/// Outcome of [`reformat_amount_input`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFormat {
    pub text: String,
    pub truncated: bool,
}

/// Parse user-entered amount text into an unsigned magnitude.
///
/// All decimal/grouping separators are stripped and the remaining digit
/// string is read as-is, so monetary input like "12.34" yields 1234 minor
/// units. The caller applies the sign. Inputs longer than nine digits are
/// truncated from the least-significant end.
pub fn parse_amount(input: &str) -> Result<ParsedAmount, AmountError> {
    let digits = collect_digits(input.trim())?;
    if digits.is_empty() {
        return Err(AmountError::Empty);
    }
    let (digits, truncated) = clamp_digits(&digits);
    Ok(ParsedAmount {
        magnitude: digits_value(digits) as Amount,
        truncated,
    })
}

/// Format minor units as a decimal string with exactly two fractional
/// digits, grouping the integer part in threes.
/// Example: 5 -> "0.05", 123456789 -> "1,234,567.89" (point separator).
pub fn format_monetary(minor_units: i64, sep: DecimalSeparator) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    let units = group_thousands(abs / 100, sep.grouping());
    format!("{}{}{}{:02}", sign, units, sep.decimal(), abs % 100)
}

/// Format an item count. Counts carry no scale, so this is a bare integer.
pub fn format_count(count: i64) -> String {
    count.to_string()
}

/// Recompute the canonical rendering of a partially-typed amount field.
///
/// Separators are stripped, over-long input is truncated to nine digits,
/// and the digit string is re-rendered: monetary mode re-inserts the
/// decimal separator two digits from the right (padding with zeros below
/// one unit), item mode drops leading zeros. Applying this to its own
/// output is a no-op.
pub fn reformat_amount_input(
    input: &str,
    monetary: bool,
    sep: DecimalSeparator,
) -> Result<LiveFormat, AmountError> {
    let digits = collect_digits(input.trim())?;
    let (digits, truncated) = clamp_digits(&digits);
    if digits.is_empty() {
        return Ok(LiveFormat {
            text: String::new(),
            truncated,
        });
    }
    let text = if monetary {
        format_monetary(digits_value(digits), sep)
    } else {
        digits.trim_start_matches('0').to_string()
    };
    Ok(LiveFormat { text, truncated })
}

fn collect_digits(input: &str) -> Result<String, AmountError> {
    let mut digits = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '0'..='9' => digits.push(c),
            '.' | ',' => {}
            other => return Err(AmountError::InvalidCharacter(other)),
        }
    }
    Ok(digits)
}

fn clamp_digits(digits: &str) -> (&str, bool) {
    if digits.len() > MAX_AMOUNT_DIGITS {
        (&digits[..MAX_AMOUNT_DIGITS], true)
    } else {
        (digits, false)
    }
}

fn group_thousands(value: u64, grouping: char) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(grouping);
        }
        grouped.push(c);
    }
    grouped
}

// Only called with at most nine digits, which always fit an i64.
fn digits_value(digits: &str) -> i64 {
    digits
        .bytes()
        .fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use DecimalSeparator::{Comma, Point};

    fn live(input: &str, monetary: bool, sep: DecimalSeparator) -> String {
        reformat_amount_input(input, monetary, sep).unwrap().text
    }

    #[test]
    fn test_format_monetary() {
        assert_eq!(format_monetary(5000, Point), "50.00");
        assert_eq!(format_monetary(1234, Point), "12.34");
        assert_eq!(format_monetary(105, Point), "1.05");
        assert_eq!(format_monetary(5, Point), "0.05");
        assert_eq!(format_monetary(0, Point), "0.00");
        assert_eq!(format_monetary(-5000, Point), "-50.00");
        assert_eq!(format_monetary(-1, Point), "-0.01");
        assert_eq!(format_monetary(123456789, Point), "1,234,567.89");
        assert_eq!(format_monetary(123456789, Comma), "1.234.567,89");
        assert_eq!(format_monetary(105, Comma), "1,05");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(
            parse_amount("50.00"),
            Ok(ParsedAmount {
                magnitude: 5000,
                truncated: false
            })
        );
        assert_eq!(parse_amount("12,34").unwrap().magnitude, 1234);
        assert_eq!(parse_amount("0.05").unwrap().magnitude, 5);
        assert_eq!(parse_amount("  105  ").unwrap().magnitude, 105);
        assert_eq!(parse_amount("1.234.567,89").unwrap().magnitude, 123456789);
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert_eq!(parse_amount(""), Err(AmountError::Empty));
        assert_eq!(parse_amount("..,"), Err(AmountError::Empty));
        assert_eq!(parse_amount("-50"), Err(AmountError::InvalidCharacter('-')));
        assert_eq!(parse_amount("12a"), Err(AmountError::InvalidCharacter('a')));
    }

    #[test]
    fn test_parse_truncates_past_nine_digits() {
        let parsed = parse_amount("1234567890").unwrap();
        assert_eq!(parsed.magnitude, 123456789);
        assert!(parsed.truncated);

        let parsed = parse_amount("12.345.678,90").unwrap();
        assert_eq!(parsed.magnitude, 123456789);
        assert!(parsed.truncated);
    }

    #[test]
    fn test_round_trip_both_separators() {
        for n in [0, 1, 99, 100, 999_999_999] {
            for sep in [Point, Comma] {
                let rendered = format_monetary(i64::from(n), sep);
                let parsed = parse_amount(&rendered).unwrap();
                assert_eq!(parsed.magnitude, n, "round trip of {rendered}");
                assert!(!parsed.truncated);
            }
        }
    }

    #[test]
    fn test_reformat_monetary_input() {
        // digits shift left past the implied decimal point as the user types
        assert_eq!(live("1", true, Comma), "0,01");
        assert_eq!(live("0,012", true, Comma), "0,12");
        assert_eq!(live("0,123", true, Comma), "1,23");
        assert_eq!(live("1,234", true, Comma), "12,34");
        assert_eq!(live("12,345", true, Comma), "123,45");
        assert_eq!(live("1.05", true, Point), "1.05");
    }

    #[test]
    fn test_reformat_item_input_strips_leading_zeros() {
        assert_eq!(live("007", false, Point), "7");
        assert_eq!(live("1.05", false, Point), "105");
        assert_eq!(live("000", false, Point), "");
    }

    #[test]
    fn test_reformat_empty_input() {
        assert_eq!(live("", true, Point), "");
        assert_eq!(live(",,", true, Point), "");
    }

    #[test]
    fn test_reformat_truncates_and_flags() {
        let out = reformat_amount_input("12345678901", true, Point).unwrap();
        assert_eq!(out.text, "1,234,567.89");
        assert!(out.truncated);
    }

    #[test]
    fn test_reformat_is_idempotent() {
        let inputs = ["1", "0,012", "12345678901", "007", "1.05", "", "123456789"];
        for input in inputs {
            for monetary in [true, false] {
                for sep in [Point, Comma] {
                    let once = reformat_amount_input(input, monetary, sep).unwrap();
                    let twice = reformat_amount_input(&once.text, monetary, sep).unwrap();
                    assert_eq!(once.text, twice.text, "input {input:?}");
                    assert!(!twice.truncated);
                }
            }
        }
    }
}
