use std::borrow::Cow;

use crate::types::ParseError;

/// Character cursor shared by the text-literal parsers.
///
/// Every failure is reported as a [`ParseError`] pointing at the character
/// the cursor currently stands on.
pub(crate) struct Cursor<'a> {
    source: &'a str,
    pos: usize,
    converter: &'a str,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str, converter: &'a str) -> Self {
        Self { source, pos: 0, converter }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Byte position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_second(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    pub fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Consume `ch` if it is the next character.
    pub fn eat(&mut self, ch: char) -> bool {
        match self.peek() {
            Some(c) if c == ch => {
                self.pos += c.len_utf8();
                true
            }
            _ => false,
        }
    }

    pub fn expect(&mut self, ch: char, expected: &'static str) -> Result<(), ParseError> {
        match self.eat(ch) {
            true => Ok(()),
            false => Err(self.error(expected)),
        }
    }

    /// Consume `word` ignoring ASCII case.
    pub fn eat_word(&mut self, word: &str) -> bool {
        let rest = self.rest();
        match rest.get(..word.len()) {
            Some(head) if head.eq_ignore_ascii_case(word) => {
                self.pos += word.len();
                true
            }
            _ => false,
        }
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    pub fn take_while(&mut self, mut f: impl FnMut(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !f(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.source[start..self.pos]
    }

    pub fn expect_eof(&mut self) -> Result<(), ParseError> {
        self.skip_ws();
        match self.is_eof() {
            true => Ok(()),
            false => Err(self.error("end of input")),
        }
    }

    pub fn error(&self, expected: impl Into<Cow<'static, str>>) -> ParseError {
        self.error_at(self.pos, expected)
    }

    pub fn error_at(&self, byte_pos: usize, expected: impl Into<Cow<'static, str>>) -> ParseError {
        let offset = self.source[..byte_pos.min(self.source.len())].chars().count();
        ParseError::new(self.converter, expected, self.source, offset)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offset_counts_chars() {
        let mut c = Cursor::new("ñø{x", "test");
        c.bump();
        c.bump();
        let err = c.error("`}`");
        assert_eq!(err.offset(), 2);
        assert_eq!(c.peek(), Some('{'));
    }

    #[test]
    fn eat_word_ignores_case() {
        let mut c = Cursor::new("NuLl,", "test");
        assert!(c.eat_word("null"));
        assert_eq!(c.rest(), ",");
        assert!(!c.eat_word("null"));
    }
}
