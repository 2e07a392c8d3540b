//! Parser for Boolean function strings such as `"(A*B)"` or `"IQ'"`.

use indexmap::IndexSet;

use super::{Expr, MAX_EXPR_DEPTH};
use crate::dsl::{is_identifier_continue, is_identifier_start};
use crate::error::ExprError;

/// Parse a function string against the set of names it may reference.
///
/// Offsets in the returned error are byte offsets into `text`.
pub fn parse(text: &str, alphabet: &IndexSet<String>) -> Result<Expr, ExprError> {
    let mut parser = ExprParser {
        text,
        pos: 0,
        depth: 0,
        alphabet,
    };
    let (expr, _) = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some((offset, ')')) => Err(ExprError::UnbalancedParens { offset }),
        Some((offset, ch)) => Err(ExprError::UnexpectedCharacter { ch, offset }),
    }
}

/// A subexpression and the height of its tree.
type Parsed = (Expr, usize);

struct ExprParser<'a> {
    text: &'a str,
    pos: usize,
    /// Open parentheses and prefix `!` currently being parsed
    depth: usize,
    alphabet: &'a IndexSet<String>,
}

impl ExprParser<'_> {
    /// Next non-blank character and its offset, without consuming it.
    fn peek(&mut self) -> Option<(usize, char)> {
        let rest = &self.text[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        trimmed.chars().next().map(|ch| (self.pos, ch))
    }

    fn bump(&mut self, ch: char) {
        self.pos += ch.len_utf8();
    }

    fn end(&self) -> ExprError {
        ExprError::UnexpectedEnd {
            offset: self.text.len(),
        }
    }

    /// Run `f` one recursion level deeper.
    fn nested<T>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth == MAX_EXPR_DEPTH {
            return Err(too_deep(offset));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // or = xor { ("+" | "|") xor }
    fn parse_or(&mut self) -> Result<Parsed, ExprError> {
        let mut lhs = self.parse_xor()?;
        while let Some((offset, ch @ ('+' | '|'))) = self.peek() {
            self.bump(ch);
            let rhs = self.parse_xor()?;
            lhs = join(Expr::Or, lhs, rhs, offset)?;
        }
        Ok(lhs)
    }

    // xor = and { "^" and }
    fn parse_xor(&mut self) -> Result<Parsed, ExprError> {
        let mut lhs = self.parse_and()?;
        while let Some((offset, '^')) = self.peek() {
            self.bump('^');
            let rhs = self.parse_and()?;
            lhs = join(Expr::Xor, lhs, rhs, offset)?;
        }
        Ok(lhs)
    }

    // and = unary { ["*" | "&"] unary }
    fn parse_and(&mut self) -> Result<Parsed, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let (offset, rhs) = match self.peek() {
                Some((offset, ch @ ('*' | '&'))) => {
                    self.bump(ch);
                    (offset, self.parse_unary()?)
                }
                // Juxtaposition
                Some((offset, ch)) if starts_operand(ch) => (offset, self.parse_unary()?),
                _ => break,
            };
            lhs = join(Expr::And, lhs, rhs, offset)?;
        }
        Ok(lhs)
    }

    // unary = "!" unary | atom { "'" }
    fn parse_unary(&mut self) -> Result<Parsed, ExprError> {
        if let Some((offset, '!')) = self.peek() {
            self.bump('!');
            let inner = self.nested(offset, Self::parse_unary)?;
            return negate(inner, offset);
        }

        let mut expr = self.parse_atom()?;
        while let Some((offset, '\'')) = self.peek() {
            self.bump('\'');
            expr = negate(expr, offset)?;
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Parsed, ExprError> {
        let (offset, ch) = self.peek().ok_or_else(|| self.end())?;
        match ch {
            '(' => self.nested(offset, |parser| {
                parser.bump(ch);
                let inner = parser.parse_or()?;
                match parser.peek() {
                    Some((_, ')')) => {
                        parser.bump(')');
                        Ok(inner)
                    }
                    Some((at, other)) => Err(ExprError::UnexpectedCharacter {
                        ch: other,
                        offset: at,
                    }),
                    None => Err(ExprError::UnbalancedParens { offset }),
                }
            }),
            '0' => {
                self.bump(ch);
                Ok((Expr::Const(false), 0))
            }
            '1' => {
                self.bump(ch);
                Ok((Expr::Const(true), 0))
            }
            _ if is_identifier_start(ch) => {
                let rest = &self.text[offset..];
                let len = rest
                    .find(|c: char| !is_identifier_continue(c))
                    .unwrap_or(rest.len());
                let name = &rest[..len];
                self.pos = offset + len;
                if self.alphabet.contains(name) {
                    Ok((Expr::Signal(name.to_string()), 0))
                } else {
                    Err(ExprError::UnknownSignal {
                        name: name.to_string(),
                        offset,
                    })
                }
            }
            _ => Err(ExprError::UnexpectedCharacter { ch, offset }),
        }
    }
}

fn join(
    op: fn(Box<Expr>, Box<Expr>) -> Expr,
    (lhs, lhs_height): Parsed,
    (rhs, rhs_height): Parsed,
    offset: usize,
) -> Result<Parsed, ExprError> {
    let height = 1 + lhs_height.max(rhs_height);
    if height > MAX_EXPR_DEPTH {
        return Err(too_deep(offset));
    }
    Ok((op(Box::new(lhs), Box::new(rhs)), height))
}

fn negate((expr, height): Parsed, offset: usize) -> Result<Parsed, ExprError> {
    if height == MAX_EXPR_DEPTH {
        return Err(too_deep(offset));
    }
    Ok((Expr::Not(Box::new(expr)), height + 1))
}

fn too_deep(offset: usize) -> ExprError {
    ExprError::NestingTooDeep {
        limit: MAX_EXPR_DEPTH,
        offset,
    }
}

fn starts_operand(ch: char) -> bool {
    is_identifier_start(ch) || matches!(ch, '(' | '!' | '0' | '1')
}
