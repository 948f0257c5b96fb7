use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Arbitrary precision decimal, kept in its textual form.
///
/// Accepts plain and exponent notation plus the special values `NaN`,
/// `Infinity` and `-Infinity`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Numeric(String);

/// Error when text is not a valid decimal.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct InvalidNumeric {
    /// Byte position of the offending character.
    pub position: usize,
}

impl std::error::Error for InvalidNumeric { }

impl fmt::Display for InvalidNumeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid numeric literal at position {}", self.position)
    }
}

impl fmt::Debug for InvalidNumeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

enum Decoded {
    NaN,
    PosInf,
    NegInf,
    /// `0.digits * 10^exp`, `digits` without leading or trailing zeros.
    Finite { negative: bool, digits: Vec<u8>, exp: i64 },
}

impl Numeric {
    /// Validate and wrap decimal text.
    pub fn parse(text: &str) -> Result<Self, InvalidNumeric> {
        let text = text.trim();
        validate(text)?;
        Ok(Self(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_nan(&self) -> bool {
        self.0.eq_ignore_ascii_case("nan")
    }

    /// Numeric comparison, `NaN` sorts above every other value like postgres does.
    pub fn compare(&self, other: &Numeric) -> Ordering {
        compare_decoded(&decode(&self.0), &decode(&other.0))
    }

    /// Lossy conversion.
    pub fn to_f64(&self) -> f64 {
        match decode(&self.0) {
            Decoded::NaN => f64::NAN,
            Decoded::PosInf => f64::INFINITY,
            Decoded::NegInf => f64::NEG_INFINITY,
            Decoded::Finite { .. } => self.0.parse().unwrap_or(f64::NAN),
        }
    }
}

fn validate(text: &str) -> Result<(), InvalidNumeric> {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned.eq_ignore_ascii_case("infinity") || unsigned.eq_ignore_ascii_case("inf") {
        return Ok(());
    }
    if text.eq_ignore_ascii_case("nan") {
        return Ok(());
    }

    let offset = text.len() - unsigned.len();
    let bytes = unsigned.as_bytes();
    let mut i = 0;
    let mut digits = 0;

    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
        digits += bytes[i].is_ascii_digit() as usize;
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            digits += 1;
            i += 1;
        }
    }
    if digits == 0 {
        return Err(InvalidNumeric { position: offset + i });
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        let sign = i;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if start == i {
            return Err(InvalidNumeric { position: offset + i });
        }
        if exponent(&unsigned[sign..i]).abs() > MAX_EXPONENT {
            return Err(InvalidNumeric { position: offset + start });
        }
    }
    match i == bytes.len() {
        true => Ok(()),
        false => Err(InvalidNumeric { position: offset + i }),
    }
}

/// Largest accepted exponent magnitude, postgres refuses anything at or past `INT_MAX / 2`.
const MAX_EXPONENT: i64 = i32::MAX as i64 / 2 - 1;

/// Signed decimal exponent, saturating instead of overflowing.
fn exponent(text: &str) -> i64 {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = digits
        .bytes()
        .filter(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    match negative {
        true => -magnitude,
        false => magnitude,
    }
}

fn decode(text: &str) -> Decoded {
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if unsigned.eq_ignore_ascii_case("nan") {
        return Decoded::NaN;
    }
    if unsigned.eq_ignore_ascii_case("infinity") || unsigned.eq_ignore_ascii_case("inf") {
        return match negative {
            true => Decoded::NegInf,
            false => Decoded::PosInf,
        };
    }

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(idx) => (&unsigned[..idx], exponent(&unsigned[idx + 1..])),
        None => (unsigned, 0),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let mut digits = int
        .bytes()
        .chain(frac.bytes())
        .filter(u8::is_ascii_digit)
        .collect::<Vec<_>>();
    let mut exp = int.bytes().filter(u8::is_ascii_digit).count() as i64 + exponent;

    let leading = digits.iter().take_while(|d| **d == b'0').count();
    digits.drain(..leading);
    exp -= leading as i64;
    while digits.last() == Some(&b'0') {
        digits.pop();
    }

    match digits.is_empty() {
        true => Decoded::Finite { negative: false, digits, exp: 0 },
        false => Decoded::Finite { negative, digits, exp },
    }
}

fn compare_decoded(a: &Decoded, b: &Decoded) -> Ordering {
    use Decoded::*;

    fn rank(d: &Decoded) -> i8 {
        match d {
            NegInf => -2,
            Finite { .. } => 0,
            PosInf => 2,
            NaN => 3,
        }
    }

    match (a, b) {
        (
            Finite { negative: na, digits: da, exp: ea },
            Finite { negative: nb, digits: db, exp: eb },
        ) => {
            let magnitude = |d: &[u8], e: i64, other: &[u8], oe: i64| match (d.is_empty(), other.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => e.cmp(&oe).then_with(|| d.cmp(other)),
            };
            match (na, nb) {
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                (false, false) => magnitude(da.as_slice(), *ea, db.as_slice(), *eb),
                (true, true) => magnitude(db.as_slice(), *eb, da.as_slice(), *ea),
            }
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

impl FromStr for Numeric {
    type Err = InvalidNumeric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Numeric {
    type Error = InvalidNumeric;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Numeric> for String {
    fn from(value: Numeric) -> Self {
        value.0
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Self(itoa::Buffer::new().format(value).to_owned())
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Numeric").field(&self.0).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn n(s: &str) -> Numeric {
        Numeric::parse(s).unwrap()
    }

    #[test]
    fn validates() {
        assert!(Numeric::parse("12.50").is_ok());
        assert!(Numeric::parse("-1e-3").is_ok());
        assert!(Numeric::parse(".5").is_ok());
        assert!(Numeric::parse("NaN").is_ok());
        assert!(Numeric::parse("-Infinity").is_ok());
        assert_eq!(Numeric::parse("1.2.3").unwrap_err().position, 3);
        assert!(Numeric::parse("").is_err());
        assert!(Numeric::parse("e5").is_err());
    }

    #[test]
    fn exponent_out_of_range() {
        assert_eq!(Numeric::parse("1e99999999999999999999").unwrap_err().position, 2);
        assert_eq!(Numeric::parse("-2.5E-1073741824").unwrap_err().position, 6);
        assert!(Numeric::parse("1e1073741822").is_ok());
        assert_eq!(n("1e1073741822").compare(&n("9e1073741821")), Ordering::Greater);
        assert_eq!(n("1e-1073741822").compare(&n("0")), Ordering::Greater);
    }

    #[test]
    fn compares_numerically() {
        assert_eq!(n("10").compare(&n("9.99")), Ordering::Greater);
        assert_eq!(n("1.0").compare(&n("1.000")), Ordering::Equal);
        assert_eq!(n("-5").compare(&n("-3")), Ordering::Less);
        assert_eq!(n("0.001").compare(&n("1e-3")), Ordering::Equal);
        assert_eq!(n("-0").compare(&n("0")), Ordering::Equal);
        assert_eq!(n("Infinity").compare(&n("1e100")), Ordering::Greater);
        assert_eq!(n("NaN").compare(&n("Infinity")), Ordering::Greater);
        assert_eq!(n("-Infinity").compare(&n("-1e100")), Ordering::Less);
    }
}
