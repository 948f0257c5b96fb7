use crate::{
    common::Cursor,
    value::{Hstore, Value},
};

use super::{Converter, ParseError, ShapeError, write_quoted};

/// `hstore` extension type, `"key"=>"value", "other"=>NULL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HstoreConverter;

impl HstoreConverter {
    fn token(cursor: &mut Cursor<'_>, what: &'static str) -> Result<(String, bool), ParseError> {
        cursor.skip_ws();
        let start = cursor.pos();
        let mut text = String::new();

        if cursor.eat('"') {
            loop {
                match cursor.bump() {
                    Some('"') => return Ok((text, true)),
                    Some('\\') => match cursor.bump() {
                        Some(ch) => text.push(ch),
                        None => return Err(cursor.error("escaped character")),
                    },
                    Some(ch) => text.push(ch),
                    None => return Err(cursor.error("closing `\"`")),
                }
            }
        }

        loop {
            match cursor.peek() {
                Some(ch) if ch.is_whitespace() || ch == ',' || ch == '"' => break,
                Some('=') if cursor.peek_second() == Some('>') => break,
                Some('\\') => {
                    cursor.bump();
                    match cursor.bump() {
                        Some(ch) => text.push(ch),
                        None => return Err(cursor.error("escaped character")),
                    }
                }
                Some(ch) => {
                    cursor.bump();
                    text.push(ch);
                }
                None => break,
            }
        }
        if text.is_empty() {
            return Err(cursor.error_at(start, what));
        }
        Ok((text, false))
    }
}

impl Converter for HstoreConverter {
    fn name(&self) -> &str {
        "hstore"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let mut cursor = Cursor::new(text, "hstore");
        let mut map = Hstore::new();

        cursor.skip_ws();
        if cursor.is_eof() {
            return Ok(Value::Hstore(map));
        }

        loop {
            let (key, _) = Self::token(&mut cursor, "key")?;
            cursor.skip_ws();
            if !(cursor.eat('=') && cursor.eat('>')) {
                return Err(cursor.error("`=>`"));
            }
            let (value, quoted) = Self::token(&mut cursor, "value")?;
            let value = (quoted || !value.eq_ignore_ascii_case("null")).then_some(value);
            map.insert(key, value);

            cursor.skip_ws();
            if cursor.is_eof() {
                break;
            }
            cursor.expect(',', "`,`")?;
        }
        Ok(Value::Hstore(map))
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let map = match value {
            Value::Hstore(map) => map,
            Value::Record(record) => {
                return self.format(&Value::Hstore(
                    record
                        .iter()
                        .map(|(k, v)| Ok((k.to_owned(), text_of(v)?)))
                        .collect::<Result<_, ShapeError>>()?,
                ));
            }
            value => return Err(ShapeError::mismatch("hstore", "hstore", value)),
        };

        let mut out = String::new();
        for (i, (key, value)) in map.iter().enumerate() {
            if i != 0 {
                out.push_str(", ");
            }
            write_quoted(&mut out, key, false);
            out.push_str("=>");
            match value {
                Some(value) => write_quoted(&mut out, value, false),
                None => out.push_str("NULL"),
            }
        }
        Ok(out)
    }
}

fn text_of(value: &Value) -> Result<Option<String>, ShapeError> {
    match value {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text.clone())),
        Value::Int(n) => Ok(Some(itoa::Buffer::new().format(*n).to_owned())),
        Value::Bool(b) => Ok(Some(if *b { "t" } else { "f" }.to_owned())),
        value => Err(ShapeError::mismatch("hstore", "text value", value)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::Record;

    fn hstore<const N: usize>(pairs: [(&str, Option<&str>); N]) -> Value {
        Value::Hstore(pairs.into_iter().map(|(k, v)| (k.to_owned(), v.map(str::to_owned))).collect())
    }

    #[test]
    fn parse_pairs() {
        let value = HstoreConverter.parse(r#""a"=>"b","c"=>NULL"#).unwrap();
        assert_eq!(value, hstore([("a", Some("b")), ("c", None)]));
        let value = HstoreConverter.parse(r#" a => 1 , "NULL" => "NULL", k=>null "#).unwrap();
        assert_eq!(value, hstore([("a", Some("1")), ("NULL", Some("NULL")), ("k", None)]));
        assert_eq!(HstoreConverter.parse("  ").unwrap(), hstore([]));
    }

    #[test]
    fn escapes() {
        let value = HstoreConverter.parse(r#""a\"b"=>"c\\d""#).unwrap();
        assert_eq!(value, hstore([("a\"b", Some("c\\d"))]));
        let text = HstoreConverter.format(&value).unwrap();
        assert_eq!(text, r#""a\"b"=>"c\\d""#);
        assert_eq!(HstoreConverter.parse(&text).unwrap(), value);
    }

    #[test]
    fn errors() {
        let err = HstoreConverter.parse("a=>").unwrap_err();
        assert_eq!(err.offset(), 3);
        assert!(HstoreConverter.parse("a b").is_err());
        assert!(HstoreConverter.parse(r#""a"=>"b" "c"=>"d""#).is_err());
        assert!(HstoreConverter.parse(r#""a=>b"#).is_err());
    }

    #[test]
    fn format_values() {
        let value = hstore([("x", None), ("a", Some("1"))]);
        assert_eq!(HstoreConverter.format(&value).unwrap(), r#""a"=>"1", "x"=>NULL"#);
        let record = Record::new().with("n", 1).with("m", Value::Null);
        assert_eq!(HstoreConverter.format(&Value::Record(record)).unwrap(), r#""m"=>NULL, "n"=>"1""#);
        assert!(HstoreConverter.format(&Value::Int(1)).is_err());
    }
}
