use super::StructuralError;
use std::fmt;
use std::str::FromStr;

const MAX_EXPONENT: i64 = 1000;

/// Decimal number kept in one normalized textual form.
///
/// Exponents are expanded and leading integer zeros are dropped, as are trailing fraction
/// zeros, and negative zero becomes `0`. Two spellings of the same value therefore
/// canonicalize to identical bytes.
///
/// # Examples
/// ```rust
/// use invois_core::document::Number;
///
/// assert_eq!(Number::parse("1.50").unwrap().as_str(), "1.5");
/// assert_eq!(Number::parse("15e-1").unwrap().as_str(), "1.5");
/// assert_eq!(Number::parse("-0.0").unwrap().as_str(), "0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number(String);

impl Number {
    pub fn parse(text: &str) -> Result<Self, StructuralError> {
        let invalid = |reason| StructuralError::InvalidNumber {
            value: text.to_string(),
            reason,
        };

        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(index) => (
                &unsigned[..index],
                parse_exponent(&unsigned[index + 1..]).ok_or_else(|| invalid("bad exponent"))?,
            ),
            None => (unsigned, 0),
        };
        let (int_digits, frac_digits) = match mantissa.split_once('.') {
            Some((_, "")) => return Err(invalid("missing fraction digits")),
            Some((int, frac)) => (int, frac),
            None => (mantissa, ""),
        };
        if int_digits.is_empty() {
            return Err(invalid("missing integer digits"));
        }
        if !int_digits.bytes().chain(frac_digits.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid("unexpected character"));
        }
        if exponent.abs() > MAX_EXPONENT {
            return Err(invalid("exponent out of range"));
        }

        let digits = format!("{int_digits}{frac_digits}");
        // Count of digits sitting left of the decimal point once the exponent is applied.
        let point = int_digits.len() as i64 + exponent;
        let (int_part, frac_part) = if point <= 0 {
            (String::from("0"), format!("{}{digits}", "0".repeat(point.unsigned_abs() as usize)))
        } else if point as usize >= digits.len() {
            let pad = point as usize - digits.len();
            (format!("{digits}{}", "0".repeat(pad)), String::new())
        } else {
            let (int, frac) = digits.split_at(point as usize);
            (int.to_string(), frac.to_string())
        };

        let int_part = match int_part.trim_start_matches('0') {
            "" => "0",
            trimmed => trimmed,
        };
        let frac_part = frac_part.trim_end_matches('0');
        let zero = int_part == "0" && frac_part.is_empty();

        let mut normalized = String::with_capacity(int_part.len() + frac_part.len() + 2);
        if negative && !zero {
            normalized.push('-');
        }
        normalized.push_str(int_part);
        if !frac_part.is_empty() {
            normalized.push('.');
            normalized.push_str(frac_part);
        }
        Ok(Self(normalized))
    }

    /// Render a float with a fixed number of fraction digits, then normalize.
    pub fn from_f64(value: f64, precision: usize) -> Result<Self, StructuralError> {
        if !value.is_finite() {
            return Err(StructuralError::InvalidNumber {
                value: value.to_string(),
                reason: "not a finite number",
            });
        }
        Self::parse(&format!("{value:.precision$}"))
    }

    pub fn from_i64(value: i64) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn parse_exponent(text: &str) -> Option<i64> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Number {
    type Err = StructuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(text: &str) -> String {
        Number::parse(text).expect("valid number").as_str().to_string()
    }

    #[test]
    fn normalizes_equivalent_spellings() {
        assert_eq!(norm("100"), "100");
        assert_eq!(norm("100.00"), "100");
        assert_eq!(norm("1e2"), "100");
        assert_eq!(norm("1E+2"), "100");
        assert_eq!(norm("0.015"), "0.015");
        assert_eq!(norm("15e-3"), "0.015");
        assert_eq!(norm("007.50"), "7.5");
        assert_eq!(norm("-12.340"), "-12.34");
    }

    #[test]
    fn negative_zero_collapses() {
        assert_eq!(norm("-0"), "0");
        assert_eq!(norm("-0.000"), "0");
        assert_eq!(norm("0e10"), "0");
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["", "-", ".5", "1.", "1e", "1e+", "abc", "1.2.3", "1e5000", "+1"] {
            assert!(Number::parse(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn from_f64_rounds_to_precision() {
        assert_eq!(Number::from_f64(10.0, 2).expect("finite").as_str(), "10");
        assert_eq!(Number::from_f64(1.005, 3).expect("finite").as_str(), "1.005");
        assert_eq!(Number::from_f64(2.5, 2).expect("finite").as_str(), "2.5");
        assert!(Number::from_f64(f64::NAN, 2).is_err());
        assert!(Number::from_f64(f64::INFINITY, 2).is_err());
    }
}
