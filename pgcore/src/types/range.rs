use std::sync::Arc;

use crate::{
    client::Session,
    common::Cursor,
    value::{MultiRange, Range, Value},
};

use super::{Converter, DynConverter, ParseError, ShapeError, read_slot, write_quoted};

/// Range over a subtype, `[lower,upper)` or `empty`.
#[derive(Debug, Clone)]
pub struct RangeConverter {
    name: String,
    subtype: DynConverter,
}

/// Multirange over a subtype, `{[1,2),[5,8)}`.
#[derive(Debug, Clone)]
pub struct MultiRangeConverter {
    name: String,
    range: RangeConverter,
}

impl RangeConverter {
    pub fn new(name: impl Into<String>, subtype: DynConverter) -> Self {
        Self { name: name.into(), subtype }
    }

    pub fn subtype(&self) -> &DynConverter {
        &self.subtype
    }

    fn parse_range(&self, cursor: &mut Cursor<'_>) -> Result<Range, ParseError> {
        cursor.skip_ws();
        if cursor.eat_word("empty") {
            return Ok(Range::empty());
        }

        let start = cursor.pos();
        let lower_inclusive = match cursor.bump() {
            Some('[') => true,
            Some('(') => false,
            _ => return Err(cursor.error_at(start, "`[`, `(` or `empty`")),
        };
        let lower = read_slot(cursor, &[','])?;
        cursor.expect(',', "`,`")?;
        let upper = read_slot(cursor, &[')', ']'])?;
        let upper_inclusive = match cursor.bump() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(cursor.error("`]` or `)`")),
        };

        let lower = self.bound(lower.as_deref())?;
        let upper = self.bound(upper.as_deref())?;
        Range::new(lower, upper, lower_inclusive, upper_inclusive)
            .map_err(|e| cursor.error_at(start, format!("valid range, {e}")))
    }

    fn bound(&self, text: Option<&str>) -> Result<Option<Value>, ParseError> {
        match text {
            Some(text) => self.subtype.parse(text).map(Some),
            None => Ok(None),
        }
    }

    fn write_range(&self, out: &mut String, range: &Range) -> Result<(), ShapeError> {
        if range.is_empty() {
            out.push_str("empty");
            return Ok(());
        }
        out.push(if range.lower_inclusive() { '[' } else { '(' });
        if let Some(lower) = range.lower() {
            write_quoted(out, &self.subtype.format(lower)?, true);
        }
        out.push(',');
        if let Some(upper) = range.upper() {
            write_quoted(out, &self.subtype.format(upper)?, true);
        }
        out.push(if range.upper_inclusive() { ']' } else { ')' });
        Ok(())
    }
}

impl Converter for RangeConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let mut cursor = Cursor::new(text, &self.name);
        let range = self.parse_range(&mut cursor)?;
        cursor.expect_eof()?;
        Ok(Value::range(range))
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let Value::Range(range) = value else {
            return Err(ShapeError::mismatch(&self.name, "range", value));
        };
        let mut out = String::new();
        self.write_range(&mut out, range)?;
        Ok(out)
    }

    fn bind(&self, session: &Session) -> Option<DynConverter> {
        let subtype = self.subtype.bind(session)?;
        Some(Arc::new(Self { name: self.name.clone(), subtype }))
    }
}

impl MultiRangeConverter {
    pub fn new(name: impl Into<String>, range: RangeConverter) -> Self {
        Self { name: name.into(), range }
    }
}

impl Converter for MultiRangeConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let mut cursor = Cursor::new(text, &self.name);
        cursor.skip_ws();
        cursor.expect('{', "`{`")?;
        let mut ranges = MultiRange::new();
        cursor.skip_ws();
        if !cursor.eat('}') {
            loop {
                ranges.push(self.range.parse_range(&mut cursor)?);
                cursor.skip_ws();
                if cursor.eat(',') {
                    continue;
                }
                cursor.expect('}', "`,` or `}`")?;
                break;
            }
        }
        cursor.expect_eof()?;
        Ok(Value::MultiRange(ranges))
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let Value::MultiRange(ranges) = value else {
            return Err(ShapeError::mismatch(&self.name, "multirange", value));
        };
        let mut out = String::from("{");
        for (i, range) in ranges.iter().enumerate() {
            if i != 0 {
                out.push(',');
            }
            self.range.write_range(&mut out, range)?;
        }
        out.push('}');
        Ok(out)
    }

    fn bind(&self, session: &Session) -> Option<DynConverter> {
        let subtype = self.range.subtype.bind(session)?;
        Some(Arc::new(Self {
            name: self.name.clone(),
            range: RangeConverter { name: self.range.name.clone(), subtype },
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{DateConverter, IntConverter, TextConverter};

    fn int4range() -> RangeConverter {
        RangeConverter::new("int4range", Arc::new(IntConverter::int4()))
    }

    #[test]
    fn parse_bounds() {
        let value = int4range().parse("[1,5)").unwrap();
        assert_eq!(value, Value::range(Range::closed_open(1, 5).unwrap()));
        let value = int4range().parse("(,5]").unwrap();
        assert_eq!(value, Value::range(Range::new(None, Some(Value::Int(5)), false, true).unwrap()));
        assert_eq!(int4range().parse(" EMPTY ").unwrap(), Value::range(Range::empty()));
    }

    #[test]
    fn reversed_bounds_rejected() {
        let err = int4range().parse("[5,3)").unwrap_err();
        assert_eq!(err.offset(), 0);
        assert!(int4range().format(&Value::range(Range::empty())).unwrap() == "empty");
    }

    #[test]
    fn quoted_bounds() {
        let conv = RangeConverter::new("textrange", Arc::new(TextConverter::default()));
        let value = conv.parse(r#"["a,b","c\"d"]"#).unwrap();
        let range = value.as_range().unwrap();
        assert_eq!(range.lower(), Some(&Value::from("a,b")));
        assert_eq!(range.upper(), Some(&Value::from("c\"d")));
        assert_eq!(conv.format(&value).unwrap(), r#"["a,b","c""d"]"#);
        assert_eq!(conv.parse(&conv.format(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn multirange() {
        let conv = MultiRangeConverter::new("int4multirange", int4range());
        let value = conv.parse("{[1,3), [5,8)}").unwrap();
        let Value::MultiRange(ranges) = &value else { panic!("not a multirange") };
        assert_eq!(ranges.len(), 2);
        assert_eq!(conv.format(&value).unwrap(), r#"{["1","3"),["5","8")}"#);
        assert_eq!(conv.parse("{}").unwrap(), Value::MultiRange(MultiRange::new()));
        assert!(conv.parse("{[1,3),}").is_err());
    }

    #[test]
    fn date_range_binds_subtype() {
        let conv = RangeConverter::new("daterange", Arc::new(DateConverter::default()));
        let session = Session { date_style: crate::client::DateStyle::parse("SQL, DMY"), ..Session::default() };
        let bound = conv.bind(&session).unwrap();
        let value = bound.parse("[15/01/2024,20/01/2024)").unwrap();
        assert_eq!(bound.format(&value).unwrap(), r#"["2024-01-15","2024-01-20")"#);
    }

    #[test]
    fn infinite_bound() {
        let conv = RangeConverter::new("daterange", Arc::new(DateConverter::default()));
        let value = conv.parse("[2024-01-01,infinity)").unwrap();
        let range = value.as_range().unwrap();
        assert_eq!(range.upper(), Some(&Value::Infinity));
        assert_eq!(conv.format(&value).unwrap(), r#"["2024-01-01","infinity")"#);
        assert!(conv.parse("[infinity,2024-01-01)").is_err());
    }
}
