//! Error types for the cell-library reader.
//!
//! Every pipeline stage has its own error enum ([`LexError`], [`ParseError`],
//! [`ExprError`], [`SemanticError`], [`ValidationError`]) carrying enough
//! context (offset, cell, pin) to localize a problem without re-parsing.
//! [`LibertyError`] unifies them together with the query-model failures.

use thiserror::Error;

use crate::diagnostic::Diagnostics;

/// Result type alias using [`LibertyError`].
pub type Result<T> = std::result::Result<T, LibertyError>;

/// Unified error type for all library operations.
#[derive(Error, Debug)]
pub enum LibertyError {
    // ============ Pipeline Errors ============
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// One or more located problems collected over a whole invocation
    #[error(transparent)]
    Diagnostics(#[from] Diagnostics),

    // ============ Query Errors ============
    /// Cell not present in the library
    #[error("Cell '{name}' not found in library")]
    CellNotFound { name: String },

    /// Pin not present in the cell
    #[error("Pin '{pin}' not found in cell '{cell}'")]
    PinNotFound { cell: String, pin: String },

    /// Pin has no function to evaluate
    #[error("Pin '{pin}' of cell '{cell}' has no function")]
    MissingFunction { cell: String, pin: String },

    /// Cell has no flip-flop
    #[error("Cell '{cell}' is combinational and has no next state")]
    NotSequential { cell: String },

    /// Evaluation needs a value that the assignment does not provide
    #[error("No value assigned to signal '{signal}'")]
    UnassignedSignal { signal: String },

    /// Function references too many signals to enumerate
    #[error("Truth table over {signals} signals exceeds the limit of {limit}")]
    TruthTableTooLarge { signals: usize, limit: usize },

    /// Asynchronous clear and preset asserted together
    #[error("Clear and preset of cell '{cell}' are both asserted")]
    ClearPresetConflict { cell: String },

    // ============ I/O Errors ============
    /// Error reading a library file
    #[error("Failed to read library file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl LibertyError {
    /// Create a cell lookup error
    pub fn cell_not_found(name: impl Into<String>) -> Self {
        Self::CellNotFound { name: name.into() }
    }

    /// Create a pin lookup error
    pub fn pin_not_found(cell: impl Into<String>, pin: impl Into<String>) -> Self {
        Self::PinNotFound {
            cell: cell.into(),
            pin: pin.into(),
        }
    }

    /// Create an unassigned signal error
    pub fn unassigned(signal: impl Into<String>) -> Self {
        Self::UnassignedSignal {
            signal: signal.into(),
        }
    }
}

/// Lexical error. Lexing stops at the first one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString { offset: usize },

    #[error("invalid character '{ch}'")]
    InvalidCharacter { ch: char, offset: usize },
}

impl LexError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnterminatedString { .. } => "UnterminatedString",
            Self::InvalidCharacter { .. } => "InvalidCharacter",
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Self::UnterminatedString { offset } | Self::InvalidCharacter { offset, .. } => *offset,
        }
    }
}

/// Block-structure error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("group '{group}' is never closed")]
    UnclosedBlock { group: String, offset: usize },

    #[error("attribute '{key}' given twice in group '{group}'")]
    DuplicateAttribute {
        key: String,
        group: String,
        offset: usize,
    },

    #[error("groups nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize, offset: usize },
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lex(e) => e.kind(),
            Self::UnexpectedToken { .. } => "UnexpectedToken",
            Self::UnclosedBlock { .. } => "UnclosedBlock",
            Self::DuplicateAttribute { .. } => "DuplicateAttribute",
            Self::NestingTooDeep { .. } => "NestingTooDeep",
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Self::Lex(e) => e.offset(),
            Self::UnexpectedToken { offset, .. }
            | Self::UnclosedBlock { offset, .. }
            | Self::DuplicateAttribute { offset, .. }
            | Self::NestingTooDeep { offset, .. } => *offset,
        }
    }
}

/// Error in a Boolean function string. Offsets are relative to the string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("unknown signal '{name}'")]
    UnknownSignal { name: String, offset: usize },

    #[error("unbalanced parentheses")]
    UnbalancedParens { offset: usize },

    #[error("unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd { offset: usize },

    #[error("expression nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize, offset: usize },
}

impl ExprError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownSignal { .. } => "UnknownSignal",
            Self::UnbalancedParens { .. } => "UnbalancedParens",
            Self::UnexpectedCharacter { .. } => "UnexpectedCharacter",
            Self::UnexpectedEnd { .. } => "UnexpectedEnd",
            Self::NestingTooDeep { .. } => "NestingTooDeep",
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Self::UnknownSignal { offset, .. }
            | Self::UnbalancedParens { offset }
            | Self::UnexpectedCharacter { offset, .. }
            | Self::UnexpectedEnd { offset }
            | Self::NestingTooDeep { offset, .. } => *offset,
        }
    }
}

/// Error raised while turning generic groups into typed entities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("unknown attribute '{key}' in {group}")]
    UnknownAttribute {
        group: String,
        key: String,
        offset: usize,
    },

    #[error("unknown group '{name}' in {parent}")]
    UnknownGroup {
        parent: String,
        name: String,
        offset: usize,
    },

    #[error("{group} is missing required attribute '{key}'")]
    MissingAttribute {
        group: String,
        key: String,
        offset: usize,
    },

    #[error("attribute '{key}' expects {expected}, found {found}")]
    InvalidValue {
        key: String,
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("group '{group}' expects {expected} argument(s), found {found}")]
    BadArguments {
        group: String,
        expected: usize,
        found: usize,
        offset: usize,
    },

    /// A function-like attribute failed to parse; `offset` is absolute.
    #[error("in cell '{cell}', {context}: {source}")]
    Expression {
        cell: String,
        context: String,
        offset: usize,
        #[source]
        source: ExprError,
    },
}

impl SemanticError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownAttribute { .. } => "UnknownAttribute",
            Self::UnknownGroup { .. } => "UnknownGroup",
            Self::MissingAttribute { .. } => "MissingAttribute",
            Self::InvalidValue { .. } => "InvalidValue",
            Self::BadArguments { .. } => "BadArguments",
            Self::Expression { source, .. } => source.kind(),
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Self::UnknownAttribute { offset, .. }
            | Self::UnknownGroup { offset, .. }
            | Self::MissingAttribute { offset, .. }
            | Self::InvalidValue { offset, .. }
            | Self::BadArguments { offset, .. }
            | Self::Expression { offset, .. } => *offset,
        }
    }
}

/// Invariant violation found in a built library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cell name '{cell}' is declared more than once")]
    DuplicateCellName { cell: String, offset: usize },

    #[error("pin '{pin}' is declared more than once in cell '{cell}'")]
    DuplicatePinName {
        cell: String,
        pin: String,
        offset: usize,
    },

    #[error("input pin '{pin}' of cell '{cell}' declares a function")]
    BadOutputFunctionDirection {
        cell: String,
        pin: String,
        offset: usize,
    },

    #[error("output pin '{pin}' of cell '{cell}' is marked as a clock")]
    BadClockDirection {
        cell: String,
        pin: String,
        offset: usize,
    },

    #[error("{context} of cell '{cell}' references '{signal}', which is not {allowed}")]
    UnresolvedSignalReference {
        cell: String,
        context: String,
        signal: String,
        allowed: String,
        offset: usize,
    },

    #[error("cell '{cell}' has a flip-flop but no input pin marked 'clock: true'")]
    MissingClockPin { cell: String, offset: usize },

    #[error("cell '{cell}' marks several clock pins: {}", .pins.join(", "))]
    MultipleClockPins {
        cell: String,
        pins: Vec<String>,
        offset: usize,
    },

    #[error("cell '{cell}' declares {count} flip-flops")]
    MultipleFlipFlops {
        cell: String,
        count: usize,
        offset: usize,
    },

    #[error("internal state name '{name}' of cell '{cell}' is not unique")]
    DuplicateInternalStateName {
        cell: String,
        name: String,
        offset: usize,
    },
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateCellName { .. } => "DuplicateCellName",
            Self::DuplicatePinName { .. } => "DuplicatePinName",
            Self::BadOutputFunctionDirection { .. } => "BadOutputFunctionDirection",
            Self::BadClockDirection { .. } => "BadClockDirection",
            Self::UnresolvedSignalReference { .. } => "UnresolvedSignalReference",
            Self::MissingClockPin { .. } => "MissingClockPin",
            Self::MultipleClockPins { .. } => "MultipleClockPins",
            Self::MultipleFlipFlops { .. } => "MultipleFlipFlops",
            Self::DuplicateInternalStateName { .. } => "DuplicateInternalStateName",
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Self::DuplicateCellName { offset, .. }
            | Self::DuplicatePinName { offset, .. }
            | Self::BadOutputFunctionDirection { offset, .. }
            | Self::BadClockDirection { offset, .. }
            | Self::UnresolvedSignalReference { offset, .. }
            | Self::MissingClockPin { offset, .. }
            | Self::MultipleClockPins { offset, .. }
            | Self::MultipleFlipFlops { offset, .. }
            | Self::DuplicateInternalStateName { offset, .. } => *offset,
        }
    }

    /// Name of the cell the violation belongs to.
    pub fn cell(&self) -> &str {
        match self {
            Self::DuplicateCellName { cell, .. }
            | Self::DuplicatePinName { cell, .. }
            | Self::BadOutputFunctionDirection { cell, .. }
            | Self::BadClockDirection { cell, .. }
            | Self::UnresolvedSignalReference { cell, .. }
            | Self::MissingClockPin { cell, .. }
            | Self::MultipleClockPins { cell, .. }
            | Self::MultipleFlipFlops { cell, .. }
            | Self::DuplicateInternalStateName { cell, .. } => cell,
        }
    }
}
