use std::{borrow::Cow, fmt};

use crate::value::Value;

/// An error when text from postgres does not match the grammar of a converter.
#[derive(Clone, PartialEq, Eq)]
pub struct ParseError {
    converter: String,
    expected: Cow<'static, str>,
    input: String,
    offset: usize,
}

impl ParseError {
    /// `offset` is counted in characters.
    pub fn new(
        converter: &str,
        expected: impl Into<Cow<'static, str>>,
        input: &str,
        offset: usize,
    ) -> Self {
        Self {
            converter: converter.to_owned(),
            expected: expected.into(),
            input: input.to_owned(),
            offset,
        }
    }

    /// Name of the converter that rejected the input.
    pub fn converter(&self) -> &str {
        &self.converter
    }

    /// Description of what the parser expected.
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// The complete text given to the converter.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Character offset of the failure within [`input`][ParseError::input].
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl std::error::Error for ParseError { }

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse `{}`, expected {} at offset {} in {:?}",
            self.converter, self.expected, self.offset, self.input,
        )
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// An error when a value does not have the shape a converter can serialize.
#[derive(Clone, PartialEq, Eq)]
pub struct ShapeError {
    converter: String,
    reason: Cow<'static, str>,
}

impl ShapeError {
    pub fn new(converter: &str, reason: impl Into<Cow<'static, str>>) -> Self {
        Self { converter: converter.to_owned(), reason: reason.into() }
    }

    /// Value of the wrong kind was given.
    pub fn mismatch(converter: &str, expected: &str, found: &Value) -> Self {
        Self::new(converter, format!("expected {expected}, found {}", found.kind()))
    }

    pub fn converter(&self) -> &str {
        &self.converter
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::error::Error for ShapeError { }

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` cannot serialize value, {}", self.converter, self.reason)
    }
}

impl fmt::Debug for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
