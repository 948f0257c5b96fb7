use crate::{
    common::Cursor,
    value::{Point, Tid, Value},
};

use super::{Converter, FloatConverter, ParseError, ShapeError};

/// `point`, `(x,y)`.
///
/// Serializes a [`Value::Point`] or a two element array.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointConverter;

/// `tid`, `(block,offset)`.
///
/// Serializes a [`Value::Tid`] or a two element array.
#[derive(Debug, Clone, Copy, Default)]
pub struct TidConverter;

/// Parse `( a , b )` into two raw fields.
fn parse_pair<'a>(cursor: &mut Cursor<'a>) -> Result<(&'a str, &'a str), ParseError> {
    cursor.skip_ws();
    cursor.expect('(', "`(`")?;
    let a = cursor.take_while(|c| c != ',' && c != ')');
    cursor.expect(',', "`,`")?;
    let b = cursor.take_while(|c| c != ')');
    cursor.expect(')', "`)`")?;
    cursor.expect_eof()?;
    Ok((a.trim(), b.trim()))
}

/// Two element array items.
fn pair<'v>(name: &str, value: &'v Value) -> Result<(&'v Value, &'v Value), ShapeError> {
    match value.as_array() {
        Some([a, b]) => Ok((a, b)),
        Some(items) => Err(ShapeError::new(name, format!("expected 2 elements, found {}", items.len()))),
        None => Err(ShapeError::mismatch(name, "two element array", value)),
    }
}

fn float(name: &str, value: &Value) -> Result<f64, ShapeError> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::Numeric(n) => Ok(n.to_f64()),
        other => Err(ShapeError::mismatch(name, "number", other)),
    }
}

impl Converter for PointConverter {
    fn name(&self) -> &str {
        "point"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let mut cursor = Cursor::new(text, self.name());
        let (x, y) = parse_pair(&mut cursor)?;
        let coord = |raw: &str| match raw.parse::<f64>() {
            Ok(f) => Ok(f),
            Err(_) => Err(ParseError::new(self.name(), "coordinate", text, 0)),
        };
        Ok(Value::Point(Point::new(coord(x)?, coord(y)?)))
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let point = match value {
            Value::Point(p) => *p,
            value => {
                let (x, y) = pair(self.name(), value)?;
                Point::new(float(self.name(), x)?, float(self.name(), y)?)
            }
        };
        let fmt = |f: f64| FloatConverter::float8().format(&Value::Float(f));
        Ok(format!("({},{})", fmt(point.x)?, fmt(point.y)?))
    }

    fn dimensions(&self) -> usize {
        1
    }
}

impl Converter for TidConverter {
    fn name(&self) -> &str {
        "tid"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let mut cursor = Cursor::new(text, self.name());
        let (block, offset) = parse_pair(&mut cursor)?;
        match (block.parse(), offset.parse()) {
            (Ok(block), Ok(offset)) => Ok(Value::Tid(Tid::new(block, offset))),
            _ => Err(ParseError::new(self.name(), "block and offset number", text, 0)),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let tid = match value {
            Value::Tid(t) => *t,
            value => {
                let (block, offset) = pair(self.name(), value)?;
                match (block, offset) {
                    (Value::Int(b), Value::Int(o)) => match (u32::try_from(*b), u16::try_from(*o)) {
                        (Ok(b), Ok(o)) => Tid::new(b, o),
                        _ => return Err(ShapeError::new(self.name(), "block or offset out of range")),
                    },
                    _ => return Err(ShapeError::new(self.name(), "expected integer block and offset")),
                }
            }
        };
        Ok(format!("({},{})", tid.block, tid.offset))
    }

    fn dimensions(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn point_text() {
        assert_eq!(PointConverter.parse("(1.5, -2)").unwrap(), Value::Point(Point::new(1.5, -2.0)));
        assert_eq!(PointConverter.format(&Value::from(vec![1, 2])).unwrap(), "(1,2)");
        assert!(PointConverter.format(&Value::from(vec![1, 2, 3])).is_err());
        assert_eq!(PointConverter.parse("(1 2)").unwrap_err().offset(), 4);
    }

    #[test]
    fn tid_text() {
        assert_eq!(TidConverter.parse("(0,1)").unwrap(), Value::Tid(Tid::new(0, 1)));
        assert_eq!(TidConverter.format(&Value::Tid(Tid::new(7, 3))).unwrap(), "(7,3)");
        assert!(TidConverter.format(&Value::from(vec![-1, 3])).is_err());
    }
}
