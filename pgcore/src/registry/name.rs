use std::fmt;

use crate::{common::Cursor, types::ParseError};

/// SQL standard spellings, resolved in `pg_catalog`.
static ALIASES: &[(&str, &str)] = &[
    ("int", "int4"),
    ("integer", "int4"),
    ("smallint", "int2"),
    ("bigint", "int8"),
    ("real", "float4"),
    ("float", "float8"),
    ("double precision", "float8"),
    ("boolean", "bool"),
    ("decimal", "numeric"),
    ("dec", "numeric"),
    ("character varying", "varchar"),
    ("char varying", "varchar"),
    ("character", "bpchar"),
    ("char", "bpchar"),
    ("bit varying", "varbit"),
    ("time without time zone", "time"),
    ("time with time zone", "timetz"),
    ("timestamp without time zone", "timestamp"),
    ("timestamp with time zone", "timestamptz"),
];

/// Parsed type name, like `public.mood` or `character varying(20)[]`.
///
/// Unquoted identifiers are folded to lowercase. Type modifiers are dropped,
/// except the precision of `float(p)` which picks `float4` or `float8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    pub schema: Option<String>,
    pub name: String,
    /// Count of `[]` suffixes.
    pub dims: usize,
}

struct Ident {
    text: String,
    quoted: bool,
}

impl TypeName {
    pub fn new(schema: Option<&str>, name: impl Into<String>) -> Self {
        Self { schema: schema.map(str::to_owned), name: name.into(), dims: 0 }
    }

    pub fn parse(text: &str) -> Result<TypeName, ParseError> {
        let mut cursor = Cursor::new(text, "type name");
        let mut parts: Vec<Vec<Ident>> = vec![Vec::new()];
        let mut dims = 0;
        let mut modifier = None;

        loop {
            cursor.skip_ws();
            let Some(ch) = cursor.peek() else { break };
            let start = cursor.pos();

            if ch == '[' && !parts[0].is_empty() {
                cursor.bump();
                cursor.skip_ws();
                cursor.take_while(|c| c.is_ascii_digit());
                cursor.skip_ws();
                cursor.expect(']', "`]`")?;
                dims += 1;
                continue;
            }

            let current = parts.last_mut().filter(|_| dims == 0);
            match (ch, current) {
                ('"', Some(current)) => {
                    cursor.bump();
                    let mut ident = String::new();
                    loop {
                        match cursor.bump() {
                            Some('"') if cursor.eat('"') => ident.push('"'),
                            Some('"') => break,
                            Some(ch) => ident.push(ch),
                            None => return Err(cursor.error("closing `\"`")),
                        }
                    }
                    if ident.is_empty() {
                        return Err(cursor.error_at(start, "non empty identifier"));
                    }
                    current.push(Ident { text: ident, quoted: true });
                }
                (ch, Some(current)) if ch.is_alphabetic() || ch == '_' => {
                    let word = cursor.take_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                    current.push(Ident { text: word.to_ascii_lowercase(), quoted: false });
                }
                ('.', Some(current)) if !current.is_empty() => {
                    cursor.bump();
                    parts.push(Vec::new());
                }
                ('(', Some(current)) if !current.is_empty() => {
                    cursor.bump();
                    modifier = Some((cursor.pos(), cursor.take_while(|c| c != ')')));
                    cursor.expect(')', "closing `)`")?;
                }
                _ => return Err(cursor.error("type name")),
            }
        }

        let mut name = match parts.as_mut_slice() {
            [words] if words.iter().all(|w| !w.quoted) && !words.is_empty() => {
                let joined = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
                if joined == "float" {
                    if let Some((pos, text)) = modifier {
                        return float_precision(&cursor, pos, text).map(|canonical| TypeName {
                            dims,
                            ..TypeName::new(Some("pg_catalog"), canonical)
                        });
                    }
                }
                match ALIASES.iter().find(|(alias, _)| *alias == joined) {
                    Some((_, canonical)) => TypeName::new(Some("pg_catalog"), *canonical),
                    None if words.len() == 1 => TypeName::new(None, joined),
                    None => return Err(cursor.error_at(0, "known type name")),
                }
            }
            [name] => TypeName::new(None, single(&cursor, name)?),
            [schema, name] => TypeName::new(Some(single(&cursor, schema)?.as_str()), single(&cursor, name)?),
            _ => return Err(cursor.error_at(0, "`name` or `schema.name`")),
        };
        name.dims = dims;
        Ok(name)
    }
}

/// `float(p)` is `float4` up to 24 bits of precision and `float8` up to 53.
fn float_precision(cursor: &Cursor<'_>, pos: usize, text: &str) -> Result<&'static str, ParseError> {
    match text.trim().parse::<u8>() {
        Ok(1..=24) => Ok("float4"),
        Ok(25..=53) => Ok("float8"),
        _ => Err(cursor.error_at(pos, "float precision between 1 and 53")),
    }
}

fn single(cursor: &Cursor<'_>, words: &mut Vec<Ident>) -> Result<String, ParseError> {
    match words.pop() {
        Some(ident) if words.is_empty() => Ok(ident.text),
        _ => Err(cursor.error_at(0, "single identifier per name part")),
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        f.write_str(&self.name)?;
        for _ in 0..self.dims {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(text: &str) -> TypeName {
        TypeName::parse(text).unwrap()
    }

    #[test]
    fn plain_and_qualified() {
        assert_eq!(parse("int4"), TypeName::new(None, "int4"));
        assert_eq!(parse(" Public.Mood "), TypeName::new(Some("public"), "mood"));
        assert_eq!(parse(r#""App"."My ""Type""""#), TypeName::new(Some("App"), r#"My "Type""#));
    }

    #[test]
    fn aliases() {
        assert_eq!(parse("INTEGER"), TypeName::new(Some("pg_catalog"), "int4"));
        assert_eq!(parse("double  precision"), TypeName::new(Some("pg_catalog"), "float8"));
        assert_eq!(parse("character varying(20)").name, "varchar");
        assert_eq!(parse("timestamp(3) with time zone").name, "timestamptz");
        assert_eq!(parse("char").name, "bpchar");
        assert_eq!(parse(r#""char""#), TypeName::new(None, "char"));
    }

    #[test]
    fn float_precision_picks_width() {
        assert_eq!(parse("float").name, "float8");
        assert_eq!(parse("float(1)"), TypeName::new(Some("pg_catalog"), "float4"));
        assert_eq!(parse("FLOAT( 24 )").name, "float4");
        assert_eq!(parse("float(25)").name, "float8");
        assert_eq!(parse("float(53)[]").to_string(), "pg_catalog.float8[]");
        assert_eq!(TypeName::parse("float(0)").unwrap_err().offset(), 6);
        assert!(TypeName::parse("float(54)").is_err());
        assert!(TypeName::parse("float(x)").is_err());
    }

    #[test]
    fn array_suffix() {
        let name = parse("text[][]");
        assert_eq!((name.name.as_str(), name.dims), ("text", 2));
        assert_eq!(parse("numeric(10, 2)[3]").dims, 1);
        assert_eq!(parse("bigint []").to_string(), "pg_catalog.int8[]");
    }

    #[test]
    fn invalid() {
        assert!(TypeName::parse("").is_err());
        assert!(TypeName::parse("[]").is_err());
        assert!(TypeName::parse("a.b.c").is_err());
        assert!(TypeName::parse("int[] x").is_err());
        assert!(TypeName::parse("no such type").is_err());
        assert_eq!(TypeName::parse("text[").unwrap_err().offset(), 5);
    }
}
