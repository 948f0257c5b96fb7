use std::sync::Arc;

use crate::{client::Session, common::Cursor, record::Record, value::Value};

use super::{Converter, DynConverter, ParseError, ShapeError, read_slot, write_quoted};

/// Composite (row) type with a fixed, ordered list of fields.
///
/// Serializes a [`Value::Record`], fields are looked up by name: missing fields
/// are written as NULL and unknown fields are ignored.
#[derive(Debug, Clone)]
pub struct CompositeConverter {
    name: String,
    fields: Vec<(String, DynConverter)>,
}

impl CompositeConverter {
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, DynConverter)>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(|(n, c)| (n.into(), c)).collect(),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &DynConverter)> {
        self.fields.iter().map(|(n, c)| (n.as_str(), c))
    }
}

impl Converter for CompositeConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let mut cursor = Cursor::new(text, &self.name);
        cursor.skip_ws();
        cursor.expect('(', "`(`")?;

        let mut record = Record::with_capacity(self.fields.len());
        if self.fields.is_empty() {
            cursor.expect(')', "`)`")?;
            cursor.expect_eof()?;
            return Ok(Value::Record(record));
        }

        let mut fields = self.fields.iter();
        loop {
            let start = cursor.pos();
            let slot = read_slot(&mut cursor, &[',', ')'])?;
            let Some((name, conv)) = fields.next() else {
                return Err(cursor.error_at(start, format!("{} fields", self.fields.len())));
            };
            record.insert(name.as_str(), conv.input(slot.as_deref())?);

            if cursor.eat(',') {
                continue;
            }
            cursor.expect(')', "`)`")?;
            break;
        }
        if fields.next().is_some() {
            return Err(cursor.error_at(cursor.pos().saturating_sub(1), format!("{} fields", self.fields.len())));
        }
        cursor.expect_eof()?;
        Ok(Value::Record(record))
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let Value::Record(record) = value else {
            return Err(ShapeError::mismatch(&self.name, "record", value));
        };
        let mut out = String::from("(");
        for (i, (name, conv)) in self.fields.iter().enumerate() {
            if i != 0 {
                out.push(',');
            }
            let value = record.get(name).unwrap_or(&Value::Null);
            if let Some(text) = conv.output(value)? {
                write_quoted(&mut out, &text, true);
            }
        }
        out.push(')');
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        1
    }

    fn bind(&self, session: &Session) -> Option<DynConverter> {
        let bound = self
            .fields
            .iter()
            .map(|(_, c)| c.bind(session))
            .collect::<Vec<_>>();
        if bound.iter().all(Option::is_none) {
            return None;
        }
        let fields = self
            .fields
            .iter()
            .zip(bound)
            .map(|((n, c), b)| (n.clone(), b.unwrap_or_else(|| c.clone())))
            .collect();
        Some(Arc::new(Self { name: self.name.clone(), fields }))
    }
}
