//! Boolean function expressions.
//!
//! Output functions and flip-flop controls are written as small Boolean
//! expressions inside string literals. This module parses them (independently
//! of the block grammar) and evaluates them.
//!
//! # Grammar
//!
//! Lowest to highest precedence; all binary operators are left-associative.
//!
//! ```text
//! or    = xor { ("+" | "|") xor }
//! xor   = and { "^" and }
//! and   = unary { ["*" | "&"] unary }       juxtaposition means AND
//! unary = "!" unary | atom { "'" }
//! atom  = "(" or ")" | signal | "0" | "1"
//! ```
//!
//! Postfix `'` may repeat: `A''` is `A`. Signal names use the identifier
//! characters of the block grammar. Expressions nested deeper than
//! [`MAX_EXPR_DEPTH`] levels are rejected.

mod parser;

pub use parser::parse;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexSet;

use crate::error::{LibertyError, Result};

/// Values of named signals used to evaluate an expression.
pub type Assignment = HashMap<String, bool>;

/// Widest function [`Expr::truth_table`] will enumerate.
pub const MAX_TRUTH_TABLE_SIGNALS: usize = 16;

/// Limit on both the height of a parsed tree and the open parentheses.
pub const MAX_EXPR_DEPTH: usize = 256;

/// An immutable Boolean expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Constant `0` or `1`
    Const(bool),
    /// Reference to a pin or internal state signal
    Signal(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn and(self, rhs: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    pub fn xor(self, rhs: Expr) -> Expr {
        Expr::Xor(Box::new(self), Box::new(rhs))
    }

    /// Evaluate under the given assignment.
    ///
    /// Both operands are always evaluated, so a missing signal is reported
    /// no matter what the other operand is.
    pub fn evaluate(&self, assignment: &Assignment) -> Result<bool> {
        Ok(match self {
            Expr::Const(value) => *value,
            Expr::Signal(name) => *assignment
                .get(name)
                .ok_or_else(|| LibertyError::unassigned(name))?,
            Expr::Not(inner) => !inner.evaluate(assignment)?,
            Expr::And(lhs, rhs) => {
                let (a, b) = (lhs.evaluate(assignment)?, rhs.evaluate(assignment)?);
                a && b
            }
            Expr::Or(lhs, rhs) => {
                let (a, b) = (lhs.evaluate(assignment)?, rhs.evaluate(assignment)?);
                a || b
            }
            Expr::Xor(lhs, rhs) => lhs.evaluate(assignment)? ^ rhs.evaluate(assignment)?,
        })
    }

    /// Referenced signal names in order of first appearance.
    pub fn signals(&self) -> IndexSet<&str> {
        let mut out = IndexSet::new();
        self.collect_signals(&mut out);
        out
    }

    fn collect_signals<'a>(&'a self, out: &mut IndexSet<&'a str>) {
        match self {
            Expr::Const(_) => {}
            Expr::Signal(name) => {
                out.insert(name.as_str());
            }
            Expr::Not(inner) => inner.collect_signals(out),
            Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) | Expr::Xor(lhs, rhs) => {
                lhs.collect_signals(out);
                rhs.collect_signals(out);
            }
        }
    }

    /// Every assignment of the referenced signals with the resulting value.
    ///
    /// Rows count up in binary with the first signal as the most significant
    /// bit.
    pub fn truth_table(&self) -> Result<Vec<(Assignment, bool)>> {
        let signals = self.signals();
        if signals.len() > MAX_TRUTH_TABLE_SIGNALS {
            return Err(LibertyError::TruthTableTooLarge {
                signals: signals.len(),
                limit: MAX_TRUTH_TABLE_SIGNALS,
            });
        }

        let width = signals.len();
        (0..1u32 << width)
            .map(|row| {
                let assignment: Assignment = signals
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.to_string(), row & (1 << (width - 1 - i)) != 0))
                    .collect();
                let value = self.evaluate(&assignment)?;
                Ok((assignment, value))
            })
            .collect()
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// Canonical, fully parenthesised form; parses back to an equal tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(value) => write!(f, "{}", u8::from(*value)),
            Expr::Signal(name) => write!(f, "{}", name),
            Expr::Not(inner) => write!(f, "{}'", inner),
            Expr::And(lhs, rhs) => write!(f, "({}*{})", lhs, rhs),
            Expr::Or(lhs, rhs) => write!(f, "({}+{})", lhs, rhs),
            Expr::Xor(lhs, rhs) => write!(f, "({}^{})", lhs, rhs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;
    use rstest::rstest;

    fn alphabet() -> IndexSet<String> {
        ["A", "B", "C"].into_iter().map(String::from).collect()
    }

    fn assign(pairs: &[(&str, bool)]) -> Assignment {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[rstest]
    #[case("A*B", false, false, false)]
    #[case("A*B", true, false, false)]
    #[case("A*B", true, true, true)]
    #[case("A+B", false, true, true)]
    #[case("A+B", false, false, false)]
    #[case("A^B", true, true, false)]
    #[case("A^B", true, false, true)]
    #[case("(A B)'", true, true, false)]
    #[case("!A + 0", false, true, true)]
    fn test_evaluate(#[case] text: &str, #[case] a: bool, #[case] b: bool, #[case] expected: bool) {
        let expr = parse(text, &alphabet()).unwrap();
        let value = expr.evaluate(&assign(&[("A", a), ("B", b)])).unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn test_unassigned_signal() {
        let expr = parse("A + B", &alphabet()).unwrap();
        // A alone would decide an OR, but B must still be assigned
        let err = expr.evaluate(&assign(&[("A", true)])).unwrap_err();
        assert!(matches!(err, LibertyError::UnassignedSignal { signal } if signal == "B"));
    }

    #[test]
    fn test_double_negation_law() {
        fn prop(a: bool, b: bool) -> bool {
            let alphabet = alphabet();
            let x = parse("(A*B)+A'", &alphabet).unwrap();
            let xx = parse("((A*B)+A')''", &alphabet).unwrap();
            let values = assign(&[("A", a), ("B", b)]);
            x.evaluate(&values).unwrap() == xx.evaluate(&values).unwrap()
        }
        quickcheck(prop as fn(bool, bool) -> bool);
    }

    #[test]
    fn test_display_reparses_to_same_tree() {
        for text in ["A", "A''", "(A*B)", "A + B C'", "!(A ^ B) + 1", "(A+B)'C"] {
            let expr = parse(text, &alphabet()).unwrap();
            let again = parse(&expr.to_string(), &alphabet()).unwrap();
            assert_eq!(expr, again, "{} -> {}", text, expr);
        }
    }

    #[test]
    fn test_signals_in_order() {
        let expr = parse("C*(A+C)'*B", &alphabet()).unwrap();
        let names: Vec<&str> = expr.signals().into_iter().collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_truth_table() {
        let expr = parse("A*B", &alphabet()).unwrap();
        let table = expr.truth_table().unwrap();
        assert_eq!(table.len(), 4);
        let ones: Vec<_> = table.iter().filter(|(_, v)| *v).collect();
        assert_eq!(ones.len(), 1);
        assert_eq!(ones[0].0, assign(&[("A", true), ("B", true)]));
    }
}
