//! Part 21 parser: builds an untyped entity table from tokens.
//!
//! Entities keep their type name and raw argument list; interpretation is
//! left to the reader. The table is ordered by entity id so every query over
//! it is deterministic.

use std::collections::BTreeMap;

use crate::error::StepError;
use crate::lexer::{Lexer, SpannedToken, Token};

/// A single argument value of a STEP entity.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// Entity reference (`#123`).
    EntityRef(u64),
    /// String literal.
    String(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (`.T.`).
    Enum(String),
    /// Parenthesized list.
    List(Vec<StepValue>),
    /// Derived value (`*`).
    Derived,
    /// Unset value (`$`).
    Null,
    /// Inline typed value such as `LENGTH_MEASURE(1.0)`.
    Typed {
        /// The type name.
        type_name: String,
        /// Arguments.
        args: Vec<StepValue>,
    },
}

impl StepValue {
    /// The referenced entity id, if this is a reference.
    pub fn as_entity_ref(&self) -> Option<u64> {
        match self {
            StepValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// The string contents, if this is a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The enumeration name, if this is an enumeration.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            StepValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// The list items, if this is a list.
    pub fn as_list(&self) -> Option<&[StepValue]> {
        match self {
            StepValue::List(v) => Some(v),
            _ => None,
        }
    }
}

/// A parsed DATA section entity.
#[derive(Debug, Clone)]
pub struct StepEntity {
    /// Entity id (from `#123`).
    pub id: u64,
    /// Type name. Complex instances join their partial type names with `+`.
    pub type_name: String,
    /// Constructor arguments.
    pub args: Vec<StepValue>,
}

impl StepEntity {
    /// Argument `index` as an entity reference.
    pub fn ref_arg(&self, index: usize) -> Result<u64, StepError> {
        self.args
            .get(index)
            .and_then(StepValue::as_entity_ref)
            .ok_or_else(|| StepError::bad_argument(self.id, index, "expected entity reference"))
    }

    /// Argument `index` as a list of entity references.
    pub fn ref_list_arg(&self, index: usize) -> Result<Vec<u64>, StepError> {
        let items = self
            .args
            .get(index)
            .and_then(StepValue::as_list)
            .ok_or_else(|| StepError::bad_argument(self.id, index, "expected list"))?;
        items
            .iter()
            .map(|v| {
                v.as_entity_ref().ok_or_else(|| {
                    StepError::bad_argument(self.id, index, "expected list of entity references")
                })
            })
            .collect()
    }

    /// Argument `index` as a boolean enumeration (`.T.` / `.F.`).
    pub fn bool_arg(&self, index: usize) -> Result<bool, StepError> {
        match self.args.get(index).and_then(StepValue::as_enum) {
            Some("T") | Some("TRUE") => Ok(true),
            Some("F") | Some("FALSE") => Ok(false),
            _ => Err(StepError::bad_argument(self.id, index, "expected .T. or .F.")),
        }
    }

    /// Argument 0 as the entity's label; empty when unset.
    pub fn label(&self) -> &str {
        self.args.first().and_then(StepValue::as_string).unwrap_or("")
    }
}

/// The parsed contents of a STEP file.
#[derive(Debug, Clone, Default)]
pub struct StepFile {
    /// DATA section entities keyed by id.
    pub entities: BTreeMap<u64, StepEntity>,
}

impl StepFile {
    /// Get an entity by id, failing if it is not defined.
    pub fn require(&self, id: u64) -> Result<&StepEntity, StepError> {
        self.entities.get(&id).ok_or(StepError::MissingEntity(id))
    }

    /// All entities of the given type, in ascending id order.
    pub fn entities_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a StepEntity> + 'a {
        self.entities.values().filter(move |e| e.type_name == type_name)
    }
}

/// Recursive-descent parser over a token stream.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    /// Parse a STEP file from bytes.
    pub fn parse(input: &[u8]) -> Result<StepFile, StepError> {
        let tokens = Lexer::new(input).tokenize()?;
        Parser { tokens, pos: 0 }.parse_file()
    }

    fn parse_file(&mut self) -> Result<StepFile, StepError> {
        let mut file = StepFile::default();

        self.expect_keyword("ISO-10303-21")?;
        self.expect(&Token::Semicolon)?;

        while self.peek().is_some() {
            if self.eat_keyword("HEADER") {
                self.expect(&Token::Semicolon)?;
                self.skip_header()?;
            } else if self.eat_keyword("DATA") {
                // DATA may carry a parameter list in AP242 multi-section files.
                if self.check(&Token::LParen) {
                    self.parse_args()?;
                }
                self.expect(&Token::Semicolon)?;
                while let Some(Token::EntityRef(_)) = self.peek() {
                    let entity = self.parse_entity()?;
                    if file.entities.insert(entity.id, entity).is_some() {
                        return Err(StepError::parser(None, "duplicate entity id"));
                    }
                }
                self.expect_keyword("ENDSEC")?;
                self.expect(&Token::Semicolon)?;
            } else if self.eat_keyword("END-ISO-10303-21") {
                self.expect(&Token::Semicolon)?;
                break;
            } else {
                let tok = self.peek().cloned();
                return Err(self.error(None, format!("unexpected token: {tok:?}")));
            }
        }

        Ok(file)
    }

    fn skip_header(&mut self) -> Result<(), StepError> {
        while let Some(Token::Keyword(name)) = self.peek() {
            if name == "ENDSEC" {
                break;
            }
            self.advance();
            self.parse_args()?;
            self.expect(&Token::Semicolon)?;
        }
        self.expect_keyword("ENDSEC")?;
        self.expect(&Token::Semicolon)
    }

    fn parse_entity(&mut self) -> Result<StepEntity, StepError> {
        let id = match self.advance() {
            Some(Token::EntityRef(id)) => id,
            other => return Err(self.error(None, format!("expected entity id, got {other:?}"))),
        };
        self.expect(&Token::Equals)?;

        let (type_name, args) = match self.advance() {
            Some(Token::Keyword(name)) => (name, self.parse_args()?),
            // Complex instance: ( A(...) B(...) ... )
            Some(Token::LParen) => {
                let mut names = Vec::new();
                let mut args = Vec::new();
                while let Some(Token::Keyword(name)) = self.peek() {
                    names.push(name.clone());
                    self.advance();
                    args.extend(self.parse_args()?);
                }
                self.expect(&Token::RParen)?;
                if names.is_empty() {
                    return Err(self.error(Some(id), "empty complex entity"));
                }
                (names.join("+"), args)
            }
            other => return Err(self.error(Some(id), format!("expected type name, got {other:?}"))),
        };
        self.expect(&Token::Semicolon)?;

        Ok(StepEntity { id, type_name, args })
    }

    fn parse_args(&mut self) -> Result<Vec<StepValue>, StepError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            args.push(self.parse_value()?);
            while self.check(&Token::Comma) {
                self.advance();
                args.push(self.parse_value()?);
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn parse_value(&mut self) -> Result<StepValue, StepError> {
        let value = match self.peek().cloned() {
            Some(Token::LParen) => return self.parse_args().map(StepValue::List),
            Some(Token::Keyword(type_name)) => {
                self.advance();
                let args = self.parse_args()?;
                return Ok(StepValue::Typed { type_name, args });
            }
            Some(Token::EntityRef(id)) => StepValue::EntityRef(id),
            Some(Token::String(s)) => StepValue::String(s),
            Some(Token::Real(v)) => StepValue::Real(v),
            Some(Token::Integer(v)) => StepValue::Integer(v),
            Some(Token::Enum(s)) => StepValue::Enum(s),
            Some(Token::Asterisk) => StepValue::Derived,
            Some(Token::Dollar) => StepValue::Null,
            other => return Err(self.error(None, format!("unexpected value: {other:?}"))),
        };
        self.advance();
        Ok(value)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|t| t.token.clone());
        self.pos += 1;
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat_keyword(&mut self, name: &str) -> bool {
        if matches!(self.peek(), Some(Token::Keyword(k)) if k == name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), StepError> {
        if self.check(expected) {
            self.advance();
            Ok(())
        } else {
            let actual = self.peek().cloned();
            Err(self.error(None, format!("expected {expected:?}, got {actual:?}")))
        }
    }

    fn expect_keyword(&mut self, name: &str) -> Result<(), StepError> {
        if self.eat_keyword(name) {
            Ok(())
        } else {
            let actual = self.peek().cloned();
            Err(self.error(None, format!("expected keyword '{name}', got {actual:?}")))
        }
    }

    fn error(&self, entity_id: Option<u64>, message: impl Into<String>) -> StepError {
        let line = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|t| t.line)
            .unwrap_or(0);
        StepError::parser(entity_id, format!("line {line}: {}", message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(data: &str) -> String {
        format!(
            "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\nENDSEC;\nDATA;\n{data}\nENDSEC;\nEND-ISO-10303-21;\n"
        )
    }

    #[test]
    fn test_parse_entities_in_id_order() {
        let src = wrap("#3 = PLANE('', #9);\n#1 = CARTESIAN_POINT('o', (0., 0., 0.));\n#2 = PLANE('', #9);");
        let file = Parser::parse(src.as_bytes()).unwrap();
        assert_eq!(file.entities.len(), 3);
        let planes: Vec<u64> = file.entities_of_type("PLANE").map(|e| e.id).collect();
        assert_eq!(planes, vec![2, 3]);
        assert_eq!(file.require(1).unwrap().label(), "o");
    }

    #[test]
    fn test_complex_instance() {
        let src = wrap("#7 = ( GEOMETRIC_REPRESENTATION_CONTEXT(3) GLOBAL_UNIT_ASSIGNED_CONTEXT((#1,#2)) REPRESENTATION_CONTEXT('',''));");
        let file = Parser::parse(src.as_bytes()).unwrap();
        let e = file.require(7).unwrap();
        assert_eq!(
            e.type_name,
            "GEOMETRIC_REPRESENTATION_CONTEXT+GLOBAL_UNIT_ASSIGNED_CONTEXT+REPRESENTATION_CONTEXT"
        );
        assert_eq!(e.args.len(), 4);
    }

    #[test]
    fn test_typed_value_and_accessors() {
        let src = wrap("#4 = ADVANCED_FACE('', (#5, #6), #8, .F.);\n#9 = MEASURE(LENGTH_MEASURE(1.5), $, *);");
        let file = Parser::parse(src.as_bytes()).unwrap();
        let face = file.require(4).unwrap();
        assert_eq!(face.ref_list_arg(1).unwrap(), vec![5, 6]);
        assert_eq!(face.ref_arg(2).unwrap(), 8);
        assert!(!face.bool_arg(3).unwrap());
        assert!(face.ref_arg(3).is_err());

        let m = file.require(9).unwrap();
        assert!(matches!(&m.args[0], StepValue::Typed { type_name, .. } if type_name == "LENGTH_MEASURE"));
        assert_eq!(m.args[1], StepValue::Null);
        assert_eq!(m.args[2], StepValue::Derived);
    }

    #[test]
    fn test_missing_magic() {
        assert!(Parser::parse(b"HEADER; ENDSEC;").is_err());
    }

    #[test]
    fn test_missing_entity() {
        let file = Parser::parse(wrap("").as_bytes()).unwrap();
        assert!(matches!(file.require(5), Err(StepError::MissingEntity(5))));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let src = wrap("#1 = PLANE('', #2);\n#1 = PLANE('', #3);");
        assert!(Parser::parse(src.as_bytes()).is_err());
    }
}
