//! Lexer (tokenizer) for the library description language.

use super::ast::Elision;
use crate::error::LexError;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text (unescaped contents for strings)
    pub text: String,
    /// Byte offset of the token's first character
    pub offset: usize,
    /// Source bytes dropped while decoding a string
    pub elisions: Vec<Elision>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
            elisions: Vec::new(),
        }
    }
}

/// Token types in the description language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier (group name, attribute key, pin name, etc.)
    Identifier,
    /// A double-quoted string literal
    String,
    /// A number (integer or floating point)
    Number,
    /// Open brace '{'
    OpenBrace,
    /// Close brace '}'
    CloseBrace,
    /// Open parenthesis '('
    OpenParen,
    /// Close parenthesis ')'
    CloseParen,
    /// Semicolon ';'
    Semicolon,
    /// Colon ':'
    Colon,
    /// Comma ','
    Comma,
    /// End of file
    Eof,
}

impl TokenKind {
    /// Human-readable name used in parse errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::String => "string",
            Self::Number => "number",
            Self::OpenBrace => "'{'",
            Self::CloseBrace => "'}'",
            Self::OpenParen => "'('",
            Self::CloseParen => "')'",
            Self::Semicolon => "';'",
            Self::Colon => "':'",
            Self::Comma => "','",
            Self::Eof => "end of file",
        }
    }
}

/// Lexer for tokenizing library text.
///
/// Also usable as an [`Iterator`] over `Result<Token, LexError>`; iteration
/// ends at end of input or right after the first error. [`Lexer::reset`]
/// restarts from the beginning.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    finished: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            finished: false,
        }
    }

    /// Rewind to the start of the input.
    pub fn reset(&mut self) {
        self.chars = self.input.char_indices().peekable();
        self.finished = false;
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();

        let (start, ch) = match self.chars.peek().copied() {
            Some(next) => next,
            None => return Ok(Token::new(TokenKind::Eof, "", self.input.len())),
        };

        let punct = match ch {
            '{' => Some(TokenKind::OpenBrace),
            '}' => Some(TokenKind::CloseBrace),
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            ';' => Some(TokenKind::Semicolon),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            _ => None,
        };
        if let Some(kind) = punct {
            self.chars.next();
            return Ok(Token::new(kind, ch, start));
        }

        match ch {
            '"' => {
                let (text, elisions) = self.read_string(start)?;
                Ok(Token {
                    elisions,
                    ..Token::new(TokenKind::String, text, start)
                })
            }
            '-' | '+' | '.' | '0'..='9' => {
                let text = self.read_number();
                if text.chars().any(|c| c.is_ascii_digit()) {
                    Ok(Token::new(TokenKind::Number, text, start))
                } else {
                    Err(LexError::InvalidCharacter { ch, offset: start })
                }
            }
            _ if is_identifier_start(ch) => {
                Ok(Token::new(TokenKind::Identifier, self.read_identifier(), start))
            }
            _ => Err(LexError::InvalidCharacter { ch, offset: start }),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&(pos, ch)) = self.chars.peek() {
            let rest = &self.input[pos..];
            if ch.is_whitespace() {
                self.chars.next();
            } else if rest.starts_with("/*") {
                // An unterminated block comment runs to end of input
                let end = rest[2..].find("*/").map(|i| pos + 2 + i + 2);
                self.skip_to(end.unwrap_or(self.input.len()));
            } else if rest.starts_with("//") {
                let end = rest.find('\n').map(|i| pos + i);
                self.skip_to(end.unwrap_or(self.input.len()));
            } else if ch == '\\' && starts_with_newline(&rest[1..]) {
                // Line continuation
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn skip_to(&mut self, offset: usize) {
        while let Some(&(pos, _)) = self.chars.peek() {
            if pos >= offset {
                break;
            }
            self.chars.next();
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        while let Some(&(_, ch)) = self.chars.peek() {
            if is_identifier_continue(ch) {
                text.push(ch);
                self.chars.next();
            } else {
                break;
            }
        }
        text
    }

    fn read_string(&mut self, start: usize) -> Result<(String, Vec<Elision>), LexError> {
        // Opening quote
        self.chars.next();
        let mut text = String::new();
        let mut elisions = Vec::new();
        loop {
            match self.chars.next() {
                None | Some((_, '\n')) => {
                    return Err(LexError::UnterminatedString { offset: start });
                }
                Some((_, '"')) => return Ok((text, elisions)),
                Some((pos, '\\')) => {
                    let rest = &self.input[pos + 1..];
                    if rest.starts_with('"') {
                        self.chars.next();
                        elisions.push(Elision { at: text.len(), len: 1 });
                        text.push('"');
                    } else if starts_with_newline(rest) {
                        // Continuation inside a string: drop the line break
                        let mut len = 2;
                        if rest.starts_with('\r') {
                            self.chars.next();
                            len += 1;
                        }
                        self.chars.next();
                        elisions.push(Elision { at: text.len(), len });
                    } else {
                        text.push('\\');
                    }
                }
                Some((_, ch)) => text.push(ch),
            }
        }
    }

    fn read_number(&mut self) -> String {
        let mut text = String::new();

        // Optional sign
        if let Some(&(_, ch)) = self.chars.peek() {
            if ch == '-' || ch == '+' {
                text.push(ch);
                self.chars.next();
            }
        }

        self.read_digits(&mut text);

        // Decimal part
        if let Some(&(_, '.')) = self.chars.peek() {
            text.push('.');
            self.chars.next();
            self.read_digits(&mut text);
        }

        // Exponent part
        if let Some(&(pos, ch)) = self.chars.peek() {
            if ch == 'e' || ch == 'E' {
                let rest = self.input[pos + 1..].trim_start_matches(['-', '+']);
                if rest.starts_with(|c: char| c.is_ascii_digit()) {
                    text.push(ch);
                    self.chars.next();
                    if let Some(&(_, sign)) = self.chars.peek() {
                        if sign == '-' || sign == '+' {
                            text.push(sign);
                            self.chars.next();
                        }
                    }
                    self.read_digits(&mut text);
                }
            }
        }

        text
    }

    fn read_digits(&mut self, text: &mut String) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.chars.next();
            } else {
                break;
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(token) if token.kind == TokenKind::Eof => {
                self.finished = true;
                None
            }
            Ok(token) => Some(Ok(token)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}

pub(crate) fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

pub(crate) fn is_identifier_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '$' | '.')
}

fn starts_with_newline(text: &str) -> bool {
    text.starts_with('\n') || text.starts_with("\r\n")
}

/// Parse the text of a number token.
pub fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input).map(|tok| tok.unwrap().kind).collect()
    }

    #[test]
    fn test_lexer_basic() {
        let input = "cell(AND) { area: 4; }";
        let mut lexer = Lexer::new(input);

        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Identifier);
        assert_eq!(tok.text, "cell");
        assert_eq!(tok.offset, 0);

        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::OpenParen);
        assert_eq!(tok.offset, 4);

        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Identifier);
        assert_eq!(tok.text, "AND");

        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::CloseParen,
                TokenKind::OpenBrace,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn test_lexer_strings_and_comments() {
        let input = "/* header */ function : \"(A*B)\" ; // trailing\n";
        let tokens: Vec<Token> = Lexer::new(input).map(|t| t.unwrap()).collect();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].text, "function");
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].text, "(A*B)");
        assert_eq!(tokens[2].offset, 24);
    }

    #[test]
    fn test_lexer_line_continuation() {
        let input = "next_state : \"D\" \\\n ;";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::String,
                TokenKind::Semicolon
            ]
        );
    }

    #[test]
    fn test_string_escapes_are_recorded() {
        let tok = Lexer::new("\"a\\\"b\\\r\nc\"").next_token().unwrap();
        assert_eq!(tok.text, "a\"bc");
        assert_eq!(
            tok.elisions,
            vec![Elision { at: 1, len: 1 }, Elision { at: 3, len: 3 }]
        );
    }

    #[test]
    fn test_lexer_numbers() {
        let texts: Vec<String> = Lexer::new("6 -0.5 1e-3 2.5E+2")
            .map(|t| t.unwrap().text)
            .collect();
        assert_eq!(texts, vec!["6", "-0.5", "1e-3", "2.5E+2"]);
        assert_eq!(parse_number("1e-3"), Some(0.001));
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("function : \"A*B");
        let results: Vec<_> = lexer.by_ref().collect();
        assert_eq!(
            results.last(),
            Some(&Err(LexError::UnterminatedString { offset: 11 }))
        );
        // Fused after the error
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_invalid_character_and_reset() {
        let mut lexer = Lexer::new("pin(A) @");
        let err = lexer.find_map(|t| t.err());
        assert_eq!(err, Some(LexError::InvalidCharacter { ch: '@', offset: 7 }));

        lexer.reset();
        let first = lexer.next().unwrap().unwrap();
        assert_eq!(first.text, "pin");
    }
}
