//! Recursive-descent parser for the group/attribute grammar.

use super::ast::{Attribute, Group, Value};
use super::lexer::{parse_number, Lexer, Token, TokenKind};
use crate::error::ParseError;

/// Deepest group nesting the parser accepts.
pub const MAX_GROUP_DEPTH: usize = 64;

/// One statement inside a group body.
enum Statement {
    Attribute(Attribute),
    Group(Group),
}

/// Parser for library descriptions.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    recover: bool,
    /// Groups currently open
    depth: usize,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer. Error recovery is on.
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            current: Token::new(TokenKind::Eof, "", 0),
            recover: true,
            depth: 0,
            errors: Vec::new(),
        }
    }

    /// Enable or disable error recovery. Without it the first error aborts.
    pub fn with_recovery(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }

    /// Parse the whole input into its top-level groups.
    ///
    /// With recovery enabled, every malformed statement is reported and
    /// skipped; lexer errors always end parsing.
    pub fn parse(&mut self) -> Result<Vec<Group>, Vec<ParseError>> {
        let groups = match self.parse_file() {
            Ok(groups) => groups,
            Err(e) => {
                self.errors.push(e);
                Vec::new()
            }
        };

        if self.errors.is_empty() {
            tracing::debug!(groups = groups.len(), "parsed top-level groups");
            Ok(groups)
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn parse_file(&mut self) -> Result<Vec<Group>, ParseError> {
        self.advance()?;
        let mut groups = Vec::new();

        while self.current.kind != TokenKind::Eof {
            if self.current.kind == TokenKind::CloseBrace {
                let err = self.unexpected("group");
                self.handle(err)?;
                // A stray '}' is never consumed by synchronization at this level
                self.advance()?;
                continue;
            }

            match self.parse_statement() {
                Ok(Statement::Group(group)) => groups.push(group),
                Ok(Statement::Attribute(attr)) => {
                    let err = ParseError::UnexpectedToken {
                        expected: "group".to_string(),
                        found: format!("attribute '{}'", attr.key),
                        offset: attr.offset,
                    };
                    if !self.recover {
                        return Err(err);
                    }
                    self.errors.push(err);
                }
                Err(e) => {
                    self.handle(e)?;
                    self.synchronize()?;
                }
            }
        }

        Ok(groups)
    }

    /// Record a recoverable error, or give up on it.
    fn handle(&mut self, err: ParseError) -> Result<(), ParseError> {
        if self.recover && !matches!(err, ParseError::Lex(_)) {
            self.errors.push(err);
            Ok(())
        } else {
            Err(err)
        }
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn take(&mut self) -> Result<Token, ParseError> {
        let tok = self.current.clone();
        self.advance()?;
        Ok(tok)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.current.kind == kind {
            self.take()
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = match self.current.kind {
            TokenKind::Identifier | TokenKind::Number => {
                format!("{} '{}'", self.current.kind.describe(), self.current.text)
            }
            TokenKind::String => format!("string \"{}\"", self.current.text),
            kind => kind.describe().to_string(),
        };
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found,
            offset: self.current.offset,
        }
    }

    /// Skip to the end of the statement that just failed: past its `;` or
    /// its balanced `{ ... }`, or up to the `}` closing the enclosing group.
    fn synchronize(&mut self) -> Result<(), ParseError> {
        let mut nesting = 0usize;
        loop {
            match self.current.kind {
                TokenKind::Eof => return Ok(()),
                TokenKind::Semicolon if nesting == 0 => return self.advance(),
                TokenKind::CloseBrace if nesting == 0 => return Ok(()),
                TokenKind::CloseBrace => {
                    nesting -= 1;
                    self.advance()?;
                    if nesting == 0 {
                        return Ok(());
                    }
                }
                TokenKind::OpenBrace => {
                    nesting += 1;
                    self.advance()?;
                }
                _ => self.advance()?,
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let name = self.expect(TokenKind::Identifier)?;

        match self.current.kind {
            TokenKind::Colon => {
                self.advance()?;
                let value_offset = self.current.offset;
                let elisions = self.current.elisions.clone();
                let value = self.parse_value()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Attribute(Attribute {
                    key: name.text,
                    value,
                    offset: name.offset,
                    value_offset,
                    elisions,
                }))
            }
            TokenKind::OpenParen => {
                let value_offset = self.current.offset;
                let args = self.parse_args()?;
                match self.current.kind {
                    TokenKind::OpenBrace => {
                        let group = Group::new(name.text, args, name.offset);
                        self.parse_group_body(group).map(Statement::Group)
                    }
                    TokenKind::Semicolon => {
                        self.advance()?;
                        Ok(Statement::Attribute(Attribute {
                            key: name.text,
                            value: Value::List(args),
                            offset: name.offset,
                            value_offset,
                            elisions: Vec::new(),
                        }))
                    }
                    _ => Err(self.unexpected("'{' or ';'")),
                }
            }
            TokenKind::OpenBrace => {
                let group = Group::new(name.text, Vec::new(), name.offset);
                self.parse_group_body(group).map(Statement::Group)
            }
            _ => Err(self.unexpected("':', '(' or '{'")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Value>, ParseError> {
        self.expect(TokenKind::OpenParen)?;
        let mut args = Vec::new();

        if self.current.kind == TokenKind::CloseParen {
            self.advance()?;
            return Ok(args);
        }

        loop {
            args.push(self.parse_value()?);
            match self.current.kind {
                TokenKind::Comma => self.advance()?,
                TokenKind::CloseParen => {
                    self.advance()?;
                    return Ok(args);
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        match self.current.kind {
            TokenKind::Identifier => {
                let tok = self.take()?;
                Ok(match tok.text.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => Value::Identifier(tok.text),
                })
            }
            TokenKind::String => Ok(Value::String(self.take()?.text)),
            TokenKind::Number => match parse_number(&self.current.text) {
                Some(n) => {
                    self.advance()?;
                    Ok(Value::Number(n))
                }
                None => Err(self.unexpected("number")),
            },
            _ => Err(self.unexpected("value")),
        }
    }

    /// Parse `{ statements }`; the current token is the opening brace.
    fn parse_group_body(&mut self, group: Group) -> Result<Group, ParseError> {
        if self.depth == MAX_GROUP_DEPTH {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_GROUP_DEPTH,
                offset: group.offset,
            });
        }
        self.depth += 1;
        let result = self.parse_group_contents(group);
        self.depth -= 1;
        result
    }

    fn parse_group_contents(&mut self, mut group: Group) -> Result<Group, ParseError> {
        self.expect(TokenKind::OpenBrace)?;

        loop {
            match self.current.kind {
                TokenKind::CloseBrace => {
                    self.advance()?;
                    return Ok(group);
                }
                TokenKind::Eof => {
                    return Err(ParseError::UnclosedBlock {
                        group: group.label(),
                        offset: group.offset,
                    });
                }
                _ => {}
            }

            match self.parse_statement() {
                Ok(Statement::Group(child)) => group.groups.push(child),
                Ok(Statement::Attribute(attr)) => {
                    if group.attribute(&attr.key).is_some() {
                        // The duplicate is dropped; the statement itself was well formed
                        self.handle(ParseError::DuplicateAttribute {
                            key: attr.key,
                            group: group.label(),
                            offset: attr.offset,
                        })?;
                    } else {
                        group.attributes.push(attr);
                    }
                }
                Err(e) => {
                    self.handle(e)?;
                    self.synchronize()?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Elision;

    fn parse(input: &str) -> Result<Vec<Group>, Vec<ParseError>> {
        Parser::new(Lexer::new(input)).parse()
    }

    #[test]
    fn test_parse_nested_groups() {
        let input = r#"
            library(demo) {
                cell(BUF) {
                    area: 6;
                    pin(A) { direction: input; }
                    pin(Y) { direction: output; function: "A"; }
                }
            }
        "#;
        let groups = parse(input).unwrap();
        assert_eq!(groups.len(), 1);
        let lib = &groups[0];
        assert_eq!(lib.name, "library");
        assert_eq!(lib.args, vec![Value::Identifier("demo".to_string())]);

        let cell = &lib.groups[0];
        assert_eq!(cell.label(), "cell(BUF)");
        assert_eq!(cell.attribute("area").map(|a| &a.value), Some(&Value::Number(6.0)));
        assert_eq!(cell.groups_named("pin").count(), 2);

        let y = &cell.groups[1];
        assert_eq!(
            y.attribute("function").map(|a| &a.value),
            Some(&Value::String("A".to_string()))
        );
    }

    #[test]
    fn test_parse_booleans_and_args() {
        let input = "cell(DFF) { ff(IQ, IQN) { clocked_on: C; } pin(C) { clock: true; } }";
        let groups = parse(input).unwrap();
        let ff = &groups[0].groups[0];
        assert_eq!(ff.args.len(), 2);
        assert_eq!(
            ff.attribute("clocked_on").map(|a| &a.value),
            Some(&Value::Identifier("C".to_string()))
        );
        let clk = &groups[0].groups[1];
        assert_eq!(clk.attribute("clock").map(|a| &a.value), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_parse_complex_attribute() {
        let input = "library(x) { capacitive_load_unit(1, pf); }";
        let groups = parse(input).unwrap();
        let attr = groups[0].attribute("capacitive_load_unit").unwrap();
        assert_eq!(
            attr.value,
            Value::List(vec![Value::Number(1.0), Value::Identifier("pf".to_string())])
        );
    }

    #[test]
    fn test_duplicate_attribute() {
        let input = "pin(A) { direction: input; direction: output; }";
        let errors = parse(input).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ParseError::DuplicateAttribute { key, offset: 27, .. } if key == "direction"
        ));
    }

    #[test]
    fn test_unclosed_block() {
        let errors = parse("library(x) { cell(A) { area: 1; ").unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ParseError::UnclosedBlock { group, .. } if group == "cell(A)")));
    }

    #[test]
    fn test_recovery_collects_multiple_errors() {
        let input = r#"
            library(x) {
                cell(A { area: 1; }
                cell(B) { area 2; }
                cell(C) { area: 3; }
            }
        "#;
        let errors = parse(input).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind() == "UnexpectedToken"));
    }

    #[test]
    fn test_fail_fast_stops_at_first_error() {
        let input = "library(x) { cell(A { } cell(B) { area 2; } }";
        let errors = Parser::new(Lexer::new(input))
            .with_recovery(false)
            .parse()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |levels: usize| format!("{}{}", "g { ".repeat(levels), "}".repeat(levels));
        assert!(parse(&nested(10)).is_ok());

        // The too-deep group is skipped and its ancestors still close
        let errors = parse(&nested(100)).unwrap_err();
        assert_eq!(
            errors,
            vec![ParseError::NestingTooDeep {
                limit: MAX_GROUP_DEPTH,
                offset: 4 * MAX_GROUP_DEPTH,
            }]
        );
    }

    #[test]
    fn test_string_attribute_keeps_elisions() {
        let groups = parse(r#"pin(Q) { function: "A\"B"; }"#).unwrap();
        let attr = groups[0].attribute("function").unwrap();
        assert_eq!(attr.value, Value::String("A\"B".to_string()));
        assert_eq!(attr.elisions, vec![Elision { at: 1, len: 1 }]);
        assert_eq!(attr.source_offset(2), 23);
    }

    #[test]
    fn test_lex_error_is_fatal() {
        let errors = parse("library(x) { cell(A) { area: #; } cell(B { } }").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), "InvalidCharacter");
    }
}
