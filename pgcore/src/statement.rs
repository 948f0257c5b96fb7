use std::fmt;

/// Generated savepoint identifier, ready to be spliced into sql.
#[derive(Clone, PartialEq, Eq)]
pub struct SavepointName(String);

impl SavepointName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn savepoint(&self) -> String {
        format!("SAVEPOINT {}", self.0)
    }

    pub(crate) fn rollback_to(&self) -> String {
        format!("ROLLBACK TO SAVEPOINT {}", self.0)
    }

    pub(crate) fn release(&self) -> String {
        format!("RELEASE SAVEPOINT {}", self.0)
    }
}

impl fmt::Display for SavepointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SavepointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SavepointName").field(&self.0).finish()
    }
}

impl AsRef<str> for SavepointName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Savepoint names unique within one connection, `<prefix>_<n>`.
#[derive(Debug)]
pub(crate) struct SavepointNames {
    prefix: String,
    next: u32,
}

impl SavepointNames {
    pub(crate) fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_owned(), next: 0 }
    }

    pub(crate) fn next(&mut self) -> SavepointName {
        self.next = self.next.wrapping_add(1);
        let mut b = itoa::Buffer::new();
        let id = b.format(self.next);

        let mut name = String::with_capacity(self.prefix.len() + id.len() + 3);
        name.push_str(&self.prefix);
        name.push('_');
        name.push_str(id);
        SavepointName(quote_ident(name))
    }
}

/// Double quote `ident` unless it is a plain lowercase identifier.
fn quote_ident(ident: String) -> String {
    let plain = ident.starts_with(|c: char| c.is_ascii_lowercase() || c == '_')
        && ident.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        return ident;
    }
    let mut quoted = String::with_capacity(ident.len() + 2);
    quoted.push('"');
    quoted.push_str(&ident.replace('"', "\"\""));
    quoted.push('"');
    quoted
}
