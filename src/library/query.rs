//! Read-only query model over a validated library.

use indexmap::IndexMap;

use super::model::{Cell, Library, Pin};
use crate::dsl::Value;
use crate::error::{LibertyError, Result};
use crate::expr::Assignment;

/// A library that passed validation.
///
/// Only obtainable through [`Library::validate`], so every query can rely on
/// the validator's invariants: unique names, resolved signal references and
/// at most one flip-flop per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLibrary {
    library: Library,
    /// Cell name -> position in `library.cells`
    index: IndexMap<String, usize>,
}

impl ValidatedLibrary {
    pub(super) fn new(library: Library) -> Self {
        let index = library
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| (cell.name.clone(), i))
            .collect();
        Self { library, index }
    }

    pub fn name(&self) -> &str {
        &self.library.name
    }

    /// Cells in source order.
    pub fn cells(&self) -> &[Cell] {
        &self.library.cells
    }

    /// Look up a cell by name.
    pub fn cell(&self, name: &str) -> Result<&Cell> {
        self.index
            .get(name)
            .map(|&i| &self.library.cells[i])
            .ok_or_else(|| LibertyError::cell_not_found(name))
    }

    /// Library header attribute, as written.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.library.attributes.get(key)
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn into_inner(self) -> Library {
        self.library
    }
}

impl Cell {
    /// Look up a pin by name.
    pub fn pin(&self, name: &str) -> Result<&Pin> {
        self.find_pin(name)
            .ok_or_else(|| LibertyError::pin_not_found(&self.name, name))
    }

    /// The input pin marked `clock: true`, if any.
    pub fn clock_pin(&self) -> Option<&Pin> {
        self.inputs().find(|p| p.clock)
    }

    /// Evaluate the function of an output pin.
    ///
    /// For a sequential cell the assignment must also hold the internal
    /// state, see [`FlipFlop::state_values`](super::FlipFlop::state_values).
    pub fn evaluate(&self, pin: &str, assignment: &Assignment) -> Result<bool> {
        let pin = self.pin(pin)?;
        let function = pin
            .function
            .as_ref()
            .ok_or_else(|| LibertyError::MissingFunction {
                cell: self.name.clone(),
                pin: pin.name.clone(),
            })?;
        function.expr.evaluate(assignment)
    }

    /// Value stored by the flip-flop after the active clock edge.
    ///
    /// An asserted `clear` forces 0 and an asserted `preset` forces 1;
    /// both at once is an error. Otherwise `next_state` is sampled.
    pub fn next_state(&self, assignment: &Assignment) -> Result<bool> {
        let ff = self.flip_flop().ok_or_else(|| LibertyError::NotSequential {
            cell: self.name.clone(),
        })?;

        let clear = match &ff.clear {
            Some(f) => f.expr.evaluate(assignment)?,
            None => false,
        };
        let preset = match &ff.preset {
            Some(f) => f.expr.evaluate(assignment)?,
            None => false,
        };

        match (clear, preset) {
            (true, true) => Err(LibertyError::ClearPresetConflict {
                cell: self.name.clone(),
            }),
            (true, false) => Ok(false),
            (false, true) => Ok(true),
            (false, false) => ff.next_state.expr.evaluate(assignment),
        }
    }

    /// Every assignment of the signals an output function references, with
    /// the resulting value.
    pub fn truth_table(&self, pin: &str) -> Result<Vec<(Assignment, bool)>> {
        let pin = self.pin(pin)?;
        match &pin.function {
            Some(function) => function.expr.truth_table(),
            None => Err(LibertyError::MissingFunction {
                cell: self.name.clone(),
                pin: pin.name.clone(),
            }),
        }
    }
}
