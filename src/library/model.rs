//! Typed entities built from the generic group tree.

use std::fmt;

use indexmap::IndexMap;

use crate::dsl::Value;
use crate::expr::Expr;

/// Pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Parse a direction keyword.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// A parsed Boolean function together with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Text as written, without quotes
    pub text: String,
    pub expr: Expr,
    /// Absolute offset of the first character of `text`
    pub offset: usize,
}

/// A named terminal of a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    pub name: String,
    pub direction: Direction,
    /// Output function; only meaningful on output pins
    pub function: Option<Function>,
    /// Clock flag; only meaningful on input pins
    pub clock: bool,
    pub offset: usize,
}

impl Pin {
    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }
}

/// A single-bit flip-flop: `ff(IQ, IQN) { clocked_on: ...; next_state: ...; }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlipFlop {
    /// Current-state signal name (`IQ`)
    pub state: String,
    /// Complement signal name (`IQN`)
    pub state_inverted: String,
    /// Expression over the clock pin
    pub clocked_on: Function,
    /// Value captured on the active clock edge
    pub next_state: Function,
    /// Asynchronous reset to 0
    pub clear: Option<Function>,
    /// Asynchronous set to 1
    pub preset: Option<Function>,
    pub offset: usize,
}

impl FlipFlop {
    /// Both internal state names.
    pub fn state_names(&self) -> [&str; 2] {
        [&self.state, &self.state_inverted]
    }

    /// Internal state values for a stored bit `q`, ready to extend an
    /// [`Assignment`](crate::expr::Assignment).
    pub fn state_values(&self, q: bool) -> [(String, bool); 2] {
        [
            (self.state.clone(), q),
            (self.state_inverted.clone(), !q),
        ]
    }

    /// Every control expression with a label, in declaration order.
    pub fn controls(&self) -> Vec<(&'static str, &Function)> {
        let mut controls = vec![
            ("clocked_on", &self.clocked_on),
            ("next_state", &self.next_state),
        ];
        if let Some(clear) = &self.clear {
            controls.push(("clear", clear));
        }
        if let Some(preset) = &self.preset {
            controls.push(("preset", preset));
        }
        controls
    }
}

/// Whether a cell holds state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Combinational,
    Sequential,
}

/// A logic primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub name: String,
    pub area: Option<f64>,
    /// Pins in source order
    pub pins: Vec<Pin>,
    /// Flip-flop groups in source order; a valid cell has at most one
    pub flip_flops: Vec<FlipFlop>,
    pub offset: usize,
}

impl Cell {
    /// First pin with the given name.
    pub fn find_pin(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Pin> {
        self.pins.iter().filter(|p| p.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Pin> {
        self.pins.iter().filter(|p| p.is_output())
    }

    /// The flip-flop, if the cell is sequential.
    pub fn flip_flop(&self) -> Option<&FlipFlop> {
        self.flip_flops.first()
    }

    pub fn kind(&self) -> CellKind {
        if self.flip_flops.is_empty() {
            CellKind::Combinational
        } else {
            CellKind::Sequential
        }
    }

    pub fn is_sequential(&self) -> bool {
        self.kind() == CellKind::Sequential
    }
}

/// A parsed, not yet validated library.
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    pub name: String,
    /// Header attributes (units, delay model, ...) kept as written
    pub attributes: IndexMap<String, Value>,
    /// Cells in source order
    pub cells: Vec<Cell>,
    pub offset: usize,
}
