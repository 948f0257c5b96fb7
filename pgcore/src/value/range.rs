use std::{cmp::Ordering, fmt};

use super::Value;

/// Postgres range value.
///
/// A bound of [`None`] is unbounded. Constructing a non-empty range whose
/// lower bound is above its upper bound fails, whatever the subtype is.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    lower: Option<Value>,
    upper: Option<Value>,
    lower_inclusive: bool,
    upper_inclusive: bool,
    empty: bool,
}

impl Range {
    /// Create a non-empty range.
    ///
    /// [`Value::Null`] bounds are treated as unbounded, and unbounded sides are
    /// never inclusive.
    pub fn new(
        lower: Option<Value>,
        upper: Option<Value>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> Result<Self, RangeError> {
        let lower = lower.filter(|v| !v.is_null());
        let upper = upper.filter(|v| !v.is_null());

        if let (Some(l), Some(u)) = (&lower, &upper) {
            match l.partial_cmp(u) {
                Some(Ordering::Greater) => return Err(RangeError::LowerAboveUpper),
                Some(_) => {}
                None => return Err(RangeError::Incomparable),
            }
        }

        Ok(Self {
            lower_inclusive: lower_inclusive && lower.is_some(),
            upper_inclusive: upper_inclusive && upper.is_some(),
            lower,
            upper,
            empty: false,
        })
    }

    /// `[lower,upper)`, the canonical form of discrete ranges.
    pub fn closed_open(lower: impl Into<Value>, upper: impl Into<Value>) -> Result<Self, RangeError> {
        Self::new(Some(lower.into()), Some(upper.into()), true, false)
    }

    /// The `empty` range.
    pub const fn empty() -> Self {
        Self {
            lower: None,
            upper: None,
            lower_inclusive: false,
            upper_inclusive: false,
            empty: true,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn lower(&self) -> Option<&Value> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Option<&Value> {
        self.upper.as_ref()
    }

    pub const fn lower_inclusive(&self) -> bool {
        self.lower_inclusive
    }

    pub const fn upper_inclusive(&self) -> bool {
        self.upper_inclusive
    }

    /// First present finite bound, used to infer the range subtype.
    pub(crate) fn any_bound(&self) -> Option<&Value> {
        [&self.lower, &self.upper]
            .into_iter()
            .flatten()
            .find(|v| !matches!(v, Value::Infinity | Value::NegInfinity))
    }
}

/// Postgres multirange, ranges are kept in the order given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiRange(Vec<Range>);

impl MultiRange {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, range: Range) {
        self.0.push(range);
    }

    pub fn ranges(&self) -> &[Range] {
        &self.0
    }

    pub fn into_ranges(self) -> Vec<Range> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.0.iter()
    }
}

impl From<Vec<Range>> for MultiRange {
    fn from(value: Vec<Range>) -> Self {
        Self(value)
    }
}

impl FromIterator<Range> for MultiRange {
    fn from_iter<T: IntoIterator<Item = Range>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MultiRange {
    type Item = &'a Range;

    type IntoIter = std::slice::Iter<'a, Range>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An error when constructing a [`Range`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// Lower bound is greater than upper bound.
    LowerAboveUpper,
    /// Bounds cannot be ordered against each other.
    Incomparable,
}

impl std::error::Error for RangeError { }

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowerAboveUpper => f.write_str("range lower bound must be less than or equal to range upper bound"),
            Self::Incomparable => f.write_str("range bounds are not of comparable types"),
        }
    }
}

impl fmt::Debug for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Numeric;

    #[test]
    fn rejects_reversed_bounds() {
        assert_eq!(Range::closed_open(5, 3).unwrap_err(), RangeError::LowerAboveUpper);
        assert_eq!(
            Range::closed_open("b", "a").unwrap_err(),
            RangeError::LowerAboveUpper,
        );
        let date = |d| time::Date::from_ordinal_date(2024, d).unwrap();
        assert!(Range::closed_open(date(20), date(10)).is_err());
        assert!(Range::closed_open(date(10), date(20)).is_ok());
    }

    #[test]
    fn mixed_numbers_compare() {
        let n = Numeric::parse("2.5").unwrap();
        assert!(Range::closed_open(2, n.clone()).is_ok());
        assert!(Range::closed_open(3, n).is_err());
        assert!(Range::closed_open(1.5, 1).is_err());
    }

    #[test]
    fn rejects_incomparable_bounds() {
        assert_eq!(Range::closed_open(1, "a").unwrap_err(), RangeError::Incomparable);
    }

    #[test]
    fn unbounded_sides_are_exclusive() {
        let r = Range::new(None, Some(Value::Int(3)), true, true).unwrap();
        assert!(!r.lower_inclusive());
        assert!(r.upper_inclusive());
        let r = Range::new(Some(Value::Null), None, true, true).unwrap();
        assert_eq!(r.lower(), None);
        assert!(!r.is_empty());
        assert!(Range::empty().is_empty());
    }
}
