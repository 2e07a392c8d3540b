//! Located, stage-tagged problem reports.
//!
//! Each stage reports its own error type; the pipeline converts all of them
//! into [`Diagnostic`]s that carry the stage, a stable kind name, the message,
//! the byte offset and the derived line/column.

use std::fmt;

use thiserror::Error;

use crate::error::{LexError, ParseError, SemanticError, ValidationError};

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Lex,
    Parse,
    Expr,
    Semantic,
    Validate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::Expr => "expr",
            Stage::Semantic => "semantic",
            Stage::Validate => "validate",
        };
        f.write_str(name)
    }
}

/// Maps byte offsets to 1-indexed line and column numbers.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(pos, _)| pos + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    /// Line and column (both 1-indexed, column counted in characters).
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .source
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - start);
        (line + 1, column + 1)
    }
}

/// A single located problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub stage: Stage,
    /// Stable kind name, e.g. `DuplicatePinName`
    pub kind: &'static str,
    pub message: String,
    /// Byte offset into the source text
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn new(
        stage: Stage,
        kind: &'static str,
        message: impl Into<String>,
        offset: usize,
        index: &LineIndex<'_>,
    ) -> Self {
        let (line, column) = index.locate(offset);
        Self {
            stage,
            kind,
            message: message.into(),
            offset,
            line,
            column,
        }
    }

    pub fn from_lex(error: &LexError, index: &LineIndex<'_>) -> Self {
        Self::new(Stage::Lex, error.kind(), error.to_string(), error.offset(), index)
    }

    pub fn from_parse(error: &ParseError, index: &LineIndex<'_>) -> Self {
        match error {
            ParseError::Lex(inner) => Self::from_lex(inner, index),
            _ => Self::new(Stage::Parse, error.kind(), error.to_string(), error.offset(), index),
        }
    }

    pub fn from_semantic(error: &SemanticError, index: &LineIndex<'_>) -> Self {
        let stage = match error {
            SemanticError::Expression { .. } => Stage::Expr,
            _ => Stage::Semantic,
        };
        Self::new(stage, error.kind(), error.to_string(), error.offset(), index)
    }

    pub fn from_validation(error: &ValidationError, index: &LineIndex<'_>) -> Self {
        Self::new(
            Stage::Validate,
            error.kind(),
            error.to_string(),
            error.offset(),
            index,
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} {}: {}",
            self.line, self.column, self.stage, self.kind, self.message
        )
    }
}

/// Non-empty list of diagnostics in source order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} problem(s) found in library description", .0.len())]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Sort into source order. Ties keep their reporting order.
    pub fn from_vec(mut items: Vec<Diagnostic>) -> Self {
        items.sort_by_key(|d| d.offset);
        Self(items)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any diagnostic has the given kind name.
    pub fn has_kind(&self, kind: &str) -> bool {
        self.0.iter().any(|d| d.kind == kind)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExprError;

    #[test]
    fn test_locate_offsets() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.locate(0), (1, 1));
        assert_eq!(index.locate(1), (1, 2));
        assert_eq!(index.locate(3), (2, 1));
        assert_eq!(index.locate(6), (3, 1));
        assert_eq!(index.locate(8), (4, 2));
        assert_eq!(index.locate(100), (4, 3));
    }

    #[test]
    fn test_diagnostics_sorted_by_offset() {
        let index = LineIndex::new("x\ny\nz");
        let diags = Diagnostics::from_vec(vec![
            Diagnostic::new(Stage::Validate, "B", "second", 4, &index),
            Diagnostic::new(Stage::Semantic, "A", "first", 2, &index),
            Diagnostic::new(Stage::Validate, "C", "third", 4, &index),
        ]);
        let kinds: Vec<_> = diags.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec!["A", "B", "C"]);
        assert_eq!(diags.iter().next().map(|d| d.line), Some(2));
    }

    #[test]
    fn test_expression_errors_report_expr_stage() {
        let index = LineIndex::new("function : \"A *\";");
        let error = SemanticError::Expression {
            cell: "AND".to_string(),
            context: "function of pin 'Y'".to_string(),
            offset: 15,
            source: ExprError::UnexpectedEnd { offset: 3 },
        };
        let diag = Diagnostic::from_semantic(&error, &index);
        assert_eq!(diag.stage, Stage::Expr);
        assert_eq!(diag.kind, "UnexpectedEnd");
        assert_eq!(diag.column, 16);
    }
}
