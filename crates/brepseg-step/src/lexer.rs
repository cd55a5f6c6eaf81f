//! Part 21 tokenizer.
//!
//! Splits a STEP exchange file into keywords, entity references, strings,
//! numbers, enumerations and punctuation. Comments (`/* ... */`) and
//! whitespace are dropped.

use crate::error::StepError;

/// A token in a STEP file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Keyword or type name, upper-cased (e.g. `ADVANCED_FACE`, `DATA`).
    Keyword(String),
    /// Entity reference (`#42` becomes `EntityRef(42)`).
    EntityRef(u64),
    /// String literal without its quotes.
    String(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration without its dots (`.T.` becomes `Enum("T")`).
    Enum(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `=`
    Equals,
    /// `*` (derived value).
    Asterisk,
    /// `$` (unset value).
    Dollar,
}

/// A token plus the line it started on.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Line number (1-indexed).
    pub line: usize,
}

/// Tokenizer over raw file bytes.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer for the given input.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, StepError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<SpannedToken>, StepError> {
        self.skip_trivia();

        let Some(ch) = self.peek() else {
            return Ok(None);
        };
        let line = self.line;

        let token = match ch {
            b'(' | b')' | b',' | b';' | b'=' | b'*' | b'$' => {
                self.bump();
                match ch {
                    b'(' => Token::LParen,
                    b')' => Token::RParen,
                    b',' => Token::Comma,
                    b';' => Token::Semicolon,
                    b'=' => Token::Equals,
                    b'*' => Token::Asterisk,
                    _ => Token::Dollar,
                }
            }
            b'#' => self.entity_ref()?,
            b'\'' => self.string()?,
            b'.' => self.enumeration()?,
            b'-' | b'+' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number()?,
            b'0'..=b'9' => self.number()?,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.keyword(),
            other => return Err(self.error(format!("unexpected character: '{}'", other as char))),
        };

        Ok(Some(SpannedToken { token, line }))
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> StepError {
        StepError::lexer(self.line, self.col, message)
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                self.bump();
            }
            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*') {
                self.bump();
                self.bump();
                while self.peek().is_some() {
                    if self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                        self.bump();
                        self.bump();
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            break;
        }
    }

    fn take_while(&mut self, mut pred: impl FnMut(u8) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&mut pred) {
            self.bump();
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn entity_ref(&mut self) -> Result<Token, StepError> {
        self.bump();
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(self.error("expected digits after '#'"));
        }
        digits
            .parse()
            .map(Token::EntityRef)
            .map_err(|_| self.error(format!("invalid entity ID: {digits}")))
    }

    fn string(&mut self) -> Result<Token, StepError> {
        let (line, col) = (self.line, self.col);
        self.bump();
        let mut content = Vec::new();
        loop {
            match self.bump() {
                None => return Err(StepError::lexer(line, col, "unterminated string")),
                Some(b'\'') if self.peek() == Some(b'\'') => {
                    self.bump();
                    content.push(b'\'');
                }
                Some(b'\'') => break,
                Some(c) => content.push(c),
            }
        }
        Ok(Token::String(String::from_utf8_lossy(&content).into_owned()))
    }

    fn enumeration(&mut self) -> Result<Token, StepError> {
        self.bump();
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        if name.is_empty() {
            return Err(self.error("empty enumeration"));
        }
        if self.bump() != Some(b'.') {
            return Err(self.error(format!("unterminated enumeration .{name}")));
        }
        Ok(Token::Enum(name.to_ascii_uppercase()))
    }

    fn number(&mut self) -> Result<Token, StepError> {
        let start = self.pos;
        let mut is_real = false;

        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.bump();
        }
        self.take_while(|c| c.is_ascii_digit());

        // `1.` and `1.5` are both reals; `.T.` after a number never occurs.
        if self.peek() == Some(b'.') && !self.peek_at(1).is_some_and(|c| c.is_ascii_alphabetic() && c != b'E' && c != b'e') {
            is_real = true;
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }

        if matches!(self.peek(), Some(b'E' | b'e')) {
            is_real = true;
            self.bump();
            if matches!(self.peek(), Some(b'-' | b'+')) {
                self.bump();
            }
            self.take_while(|c| c.is_ascii_digit());
        }

        let text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        if is_real {
            text.parse()
                .map(Token::Real)
                .map_err(|_| self.error(format!("invalid real number: {text}")))
        } else {
            text.parse()
                .map(Token::Integer)
                .map_err(|_| self.error(format!("invalid integer: {text}")))
        }
    }

    fn keyword(&mut self) -> Token {
        // Hyphens appear in ISO-10303-21 and END-ISO-10303-21.
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-');
        Token::Keyword(name.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        Lexer::new(input.as_bytes())
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|st| st.token)
            .collect()
    }

    #[test]
    fn test_entity_ref_and_keyword() {
        assert_eq!(
            tokenize("#12 = advanced_face"),
            vec![
                Token::EntityRef(12),
                Token::Equals,
                Token::Keyword("ADVANCED_FACE".into()),
            ]
        );
    }

    #[test]
    fn test_trailing_dot_reals() {
        assert_eq!(
            tokenize("(0.,1.,-2.5E-1)"),
            vec![
                Token::LParen,
                Token::Real(0.0),
                Token::Comma,
                Token::Real(1.0),
                Token::Comma,
                Token::Real(-0.25),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_enum_and_string() {
        assert_eq!(
            tokenize("'it''s' .T."),
            vec![Token::String("it's".into()), Token::Enum("T".into())]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            tokenize("/* faces */ #1 /* x */ $ *"),
            vec![Token::EntityRef(1), Token::Dollar, Token::Asterisk]
        );
    }

    #[test]
    fn test_line_tracking() {
        let tokens = Lexer::new(b"#1\n\n#2").tokenize().unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new(b"'abc").tokenize().unwrap_err();
        assert!(matches!(err, StepError::Lexer { line: 1, col: 1, .. }));
    }

    #[test]
    fn test_bad_character() {
        assert!(Lexer::new(b"#1 = @").tokenize().is_err());
    }
}
