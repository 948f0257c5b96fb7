//! Multi-dimensional array converter.
use std::{fmt, sync::Arc};

use crate::{client::Session, common::Cursor, value::Value};

use super::{Converter, DynConverter, ParseError, ShapeError, write_quoted};

/// Array of any element type, any number of dimensions.
///
/// Arrays must be rectangular: every subarray at the same depth has the same
/// length, both when parsing and when serializing.
#[derive(Debug, Clone)]
pub struct ArrayConverter {
    name: String,
    item: DynConverter,
    delimiter: char,
}

/// Explicit bounds of an array literal, `[lower:upper]` per dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bounds(Vec<(i32, i32)>);

impl Bounds {
    /// `(lower, upper)` per dimension, both inclusive.
    pub fn dims(&self) -> &[(i32, i32)] {
        &self.0
    }

    pub fn lower(&self, dim: usize) -> Option<i32> {
        self.0.get(dim).map(|(l, _)| *l)
    }

    fn sizes(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().map(|(l, u)| *u as i64 - *l as i64 + 1)
    }
}

impl ArrayConverter {
    pub fn new(item: DynConverter) -> Self {
        Self {
            name: format!("{}[]", item.name()),
            item,
            delimiter: ',',
        }
    }

    /// Element delimiter, `,` for every type except `box`.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn item(&self) -> &DynConverter {
        &self.item
    }

    /// Parse array literal, also returning its explicit bounds if present.
    ///
    /// Elements are returned in order regardless of the bounds, which are
    /// only reported.
    pub fn parse_bounded(&self, text: &str) -> Result<(Value, Option<Bounds>), ParseError> {
        let mut parser = Parser { cursor: Cursor::new(text, &self.name), conv: self };
        parser.cursor.skip_ws();
        let bounds = parser.bounds()?;
        parser.cursor.skip_ws();
        let (items, sizes) = parser.level()?;
        parser.cursor.expect_eof()?;

        if let Some(bounds) = &bounds {
            let matches = bounds.0.len() == sizes.len()
                && bounds.sizes().zip(&sizes).all(|(b, s)| b == *s as i64);
            if !matches {
                return Err(parser.cursor.error_at(0, "array dimensions matching explicit bounds"));
            }
        }
        Ok((Value::Array(items), bounds))
    }

    /// Whether an array shaped value is a single element.
    fn is_item(&self, value: &Value) -> bool {
        self.item.dimensions() > 0 && self.item.format(value).is_ok()
    }

    /// Size of every dimension, following the first element of each level.
    fn sizes(&self, value: &Value) -> Vec<usize> {
        let mut sizes = vec![];
        let mut current = value;
        while let Value::Array(items) = current {
            if !sizes.is_empty() && self.is_item(current) {
                break;
            }
            sizes.push(items.len());
            match items.first() {
                Some(first) => current = first,
                None => break,
            }
        }
        sizes
    }

    fn write_level(&self, out: &mut String, items: &[Value], sizes: &[usize], depth: usize) -> Result<(), ShapeError> {
        if items.len() != sizes[depth] {
            return Err(ShapeError::new(
                &self.name,
                format!("expected {} elements at dimension {}, found {}", sizes[depth], depth + 1, items.len()),
            ));
        }

        out.push('{');
        for (i, item) in items.iter().enumerate() {
            if i != 0 {
                out.push(self.delimiter);
            }
            if depth + 1 < sizes.len() {
                match item {
                    Value::Array(sub) => self.write_level(out, sub, sizes, depth + 1)?,
                    other => {
                        return Err(ShapeError::new(
                            &self.name,
                            format!("expected subarray at dimension {}, found {}", depth + 2, other.kind()),
                        ));
                    }
                }
                continue;
            }
            match item {
                Value::Null => out.push_str("NULL"),
                Value::Array(_) if self.item.dimensions() == 0 => {
                    return Err(ShapeError::new(&self.name, format!("unexpected subarray at dimension {}", depth + 2)));
                }
                item => write_quoted(out, &self.item.format(item)?, false),
            }
        }
        out.push('}');
        Ok(())
    }
}

impl Converter for ArrayConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        self.parse_bounded(text).map(|(value, _)| value)
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let Value::Array(items) = value else {
            return Err(ShapeError::mismatch(&self.name, "array", value));
        };
        let sizes = self.sizes(value);
        let mut out = String::new();
        self.write_level(&mut out, items, &sizes, 0)?;
        Ok(out)
    }

    fn bind(&self, session: &Session) -> Option<DynConverter> {
        let item = self.item.bind(session)?;
        Some(Arc::new(Self {
            name: self.name.clone(),
            item,
            delimiter: self.delimiter,
        }))
    }
}

struct Parser<'a> {
    cursor: Cursor<'a>,
    conv: &'a ArrayConverter,
}

impl Parser<'_> {
    /// `[lo:hi][lo:hi]...=`
    fn bounds(&mut self) -> Result<Option<Bounds>, ParseError> {
        if self.cursor.peek() != Some('[') {
            return Ok(None);
        }
        let mut dims = vec![];
        while self.cursor.eat('[') {
            let lower = self.bound()?;
            self.cursor.expect(':', "`:`")?;
            let upper = self.bound()?;
            self.cursor.expect(']', "`]`")?;
            if upper < lower {
                return Err(self.cursor.error("upper bound not below lower bound"));
            }
            dims.push((lower, upper));
        }
        self.cursor.skip_ws();
        self.cursor.expect('=', "`=`")?;
        Ok(Some(Bounds(dims)))
    }

    fn bound(&mut self) -> Result<i32, ParseError> {
        let start = self.cursor.pos();
        let negative = self.cursor.eat('-');
        if !negative {
            self.cursor.eat('+');
        }
        let digits = self.cursor.take_while(|c| c.is_ascii_digit());
        match digits.parse::<i32>() {
            Ok(n) if negative => Ok(-n),
            Ok(n) => Ok(n),
            Err(_) => Err(self.cursor.error_at(start, "integer bound")),
        }
    }

    /// One `{...}` level, returning its items and the size of every dimension.
    fn level(&mut self) -> Result<(Vec<Value>, Vec<usize>), ParseError> {
        self.cursor.expect('{', "`{`")?;
        let mut items = vec![];
        let mut inner: Option<Vec<usize>> = None;

        self.cursor.skip_ws();
        if self.cursor.eat('}') {
            return Ok((items, vec![0]));
        }

        loop {
            self.cursor.skip_ws();
            let start = self.cursor.pos();
            let (value, sizes) = match self.cursor.peek() {
                Some('{') => {
                    let (sub, sizes) = self.level()?;
                    (Value::Array(sub), sizes)
                }
                Some('"') => (self.quoted()?, vec![]),
                _ => (self.bare()?, vec![]),
            };
            match &inner {
                None => inner = Some(sizes),
                Some(expected) if *expected != sizes => {
                    return Err(self.cursor.error_at(start, "sibling with matching dimensions"));
                }
                Some(_) => {}
            }
            items.push(value);

            self.cursor.skip_ws();
            if self.cursor.eat(self.conv.delimiter) {
                continue;
            }
            if self.cursor.eat('}') {
                break;
            }
            return Err(self.cursor.error("delimiter or `}`"));
        }

        let mut sizes = vec![items.len()];
        sizes.extend(inner.unwrap_or_default());
        Ok((items, sizes))
    }

    fn quoted(&mut self) -> Result<Value, ParseError> {
        self.cursor.expect('"', "`\"`")?;
        let mut text = String::new();
        loop {
            match self.cursor.bump() {
                Some('"') => break,
                Some('\\') => match self.cursor.bump() {
                    Some(ch) => text.push(ch),
                    None => return Err(self.cursor.error("escaped character")),
                },
                Some(ch) => text.push(ch),
                None => return Err(self.cursor.error("closing `\"`")),
            }
        }
        self.conv.item.parse(&text)
    }

    fn bare(&mut self) -> Result<Value, ParseError> {
        let start = self.cursor.pos();
        let delimiter = self.conv.delimiter;
        let mut text = String::new();
        let mut escaped = false;
        // length of `text` up to its last escaped or non whitespace character
        let mut keep = 0;
        loop {
            match self.cursor.peek() {
                Some(ch) if ch == delimiter || ch == '}' => break,
                Some('{' | '"') => return Err(self.cursor.error("delimiter or `}`")),
                Some('\\') => {
                    self.cursor.bump();
                    match self.cursor.bump() {
                        Some(ch) => text.push(ch),
                        None => return Err(self.cursor.error("escaped character")),
                    }
                    escaped = true;
                    keep = text.len();
                }
                Some(ch) => {
                    self.cursor.bump();
                    text.push(ch);
                    if !ch.is_whitespace() {
                        keep = text.len();
                    }
                }
                None => return Err(self.cursor.error("delimiter or `}`")),
            }
        }
        text.truncate(keep);

        if text.is_empty() {
            return Err(self.cursor.error_at(start, "array element"));
        }
        if !escaped && text.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }
        self.conv.item.parse(&text)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (l, u) in &self.0 {
            write!(f, "[{l}:{u}]")?;
        }
        Ok(())
    }
}
