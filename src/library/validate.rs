//! Library validation.

use std::collections::HashSet;

use super::map_in_order;
use super::model::{Cell, Library};
use super::query::ValidatedLibrary;
use crate::error::ValidationError;

impl Library {
    /// Validate and promote to the read-only query model.
    pub fn validate(self) -> Result<ValidatedLibrary, Vec<ValidationError>> {
        self.validate_with(false)
    }

    /// [`Library::validate`], optionally checking cells in parallel.
    pub fn validate_with(self, parallel: bool) -> Result<ValidatedLibrary, Vec<ValidationError>> {
        let errors = validate_library_with(&self, parallel);
        if errors.is_empty() {
            Ok(ValidatedLibrary::new(self))
        } else {
            Err(errors)
        }
    }
}

/// Validate a library, returning every violation found.
///
/// Checks, independently for each cell:
/// - Cell names are unique in the library
/// - Pin names are unique in the cell
/// - Only output pins declare a function, only input pins are clocks
/// - Output functions reference only input pins and internal state
/// - At most one flip-flop, with distinct internal state names
/// - Flip-flop controls reference only input pins; `clocked_on` only clock pins
/// - A sequential cell has exactly one clock pin
///
/// Violations are ordered by cell, then by check.
pub fn validate_library(library: &Library) -> Vec<ValidationError> {
    validate_library_with(library, false)
}

/// [`validate_library`], optionally checking cells in parallel.
pub fn validate_library_with(library: &Library, parallel: bool) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    let duplicate: Vec<bool> = library
        .cells
        .iter()
        .map(|cell| !seen.insert(cell.name.as_str()))
        .collect();

    let indexed: Vec<(usize, &Cell)> = library.cells.iter().enumerate().collect();
    let errors: Vec<ValidationError> = map_in_order(&indexed, parallel, |(i, cell)| {
        let mut errors = Vec::new();
        if duplicate[*i] {
            errors.push(ValidationError::DuplicateCellName {
                cell: cell.name.clone(),
                offset: cell.offset,
            });
        }
        errors.extend(validate_cell(cell));
        errors
    })
    .into_iter()
    .flatten()
    .collect();

    tracing::debug!(
        library = %library.name,
        cells = library.cells.len(),
        violations = errors.len(),
        "validated library"
    );
    errors
}

/// Run every per-cell check.
pub fn validate_cell(cell: &Cell) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    check_pins(cell, &mut errors);
    check_output_functions(cell, &mut errors);
    check_flip_flops(cell, &mut errors);
    errors
}

fn check_pins(cell: &Cell, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for pin in &cell.pins {
        if !seen.insert(pin.name.as_str()) {
            errors.push(ValidationError::DuplicatePinName {
                cell: cell.name.clone(),
                pin: pin.name.clone(),
                offset: pin.offset,
            });
        }
    }

    for pin in &cell.pins {
        if pin.is_input() {
            if let Some(function) = &pin.function {
                errors.push(ValidationError::BadOutputFunctionDirection {
                    cell: cell.name.clone(),
                    pin: pin.name.clone(),
                    offset: function.offset,
                });
            }
        } else if pin.clock {
            errors.push(ValidationError::BadClockDirection {
                cell: cell.name.clone(),
                pin: pin.name.clone(),
                offset: pin.offset,
            });
        }
    }
}

fn check_output_functions(cell: &Cell, errors: &mut Vec<ValidationError>) {
    let mut allowed: HashSet<&str> = cell.inputs().map(|p| p.name.as_str()).collect();
    for ff in &cell.flip_flops {
        allowed.extend(ff.state_names());
    }

    for pin in cell.outputs() {
        let Some(function) = &pin.function else {
            continue;
        };
        for signal in function.expr.signals() {
            if !allowed.contains(signal) {
                errors.push(ValidationError::UnresolvedSignalReference {
                    cell: cell.name.clone(),
                    context: format!("function of pin '{}'", pin.name),
                    signal: signal.to_string(),
                    allowed: "an input pin or internal state".to_string(),
                    offset: function.offset,
                });
            }
        }
    }
}

fn check_flip_flops(cell: &Cell, errors: &mut Vec<ValidationError>) {
    if cell.flip_flops.is_empty() {
        return;
    }

    if cell.flip_flops.len() > 1 {
        errors.push(ValidationError::MultipleFlipFlops {
            cell: cell.name.clone(),
            count: cell.flip_flops.len(),
            offset: cell.flip_flops[1].offset,
        });
    }

    let inputs: HashSet<&str> = cell.inputs().map(|p| p.name.as_str()).collect();
    let clocks: Vec<&str> = cell
        .inputs()
        .filter(|p| p.clock)
        .map(|p| p.name.as_str())
        .collect();

    for ff in &cell.flip_flops {
        if ff.state == ff.state_inverted {
            errors.push(ValidationError::DuplicateInternalStateName {
                cell: cell.name.clone(),
                name: ff.state.clone(),
                offset: ff.offset,
            });
        }
        for name in ff.state_names() {
            if cell.find_pin(name).is_some() {
                errors.push(ValidationError::DuplicateInternalStateName {
                    cell: cell.name.clone(),
                    name: name.to_string(),
                    offset: ff.offset,
                });
            }
        }

        for (key, function) in ff.controls() {
            let clocked = key == "clocked_on";
            let allowed = if clocked {
                "an input pin marked 'clock: true'"
            } else {
                "an input pin"
            };
            for signal in function.expr.signals() {
                let permitted = if clocked {
                    clocks.contains(&signal)
                } else {
                    inputs.contains(signal)
                };
                if !permitted {
                    errors.push(ValidationError::UnresolvedSignalReference {
                        cell: cell.name.clone(),
                        context: format!("ff '{}'", key),
                        signal: signal.to_string(),
                        allowed: allowed.to_string(),
                        offset: function.offset,
                    });
                }
            }
        }
    }

    match clocks.len() {
        0 => errors.push(ValidationError::MissingClockPin {
            cell: cell.name.clone(),
            offset: cell.offset,
        }),
        1 => {}
        _ => errors.push(ValidationError::MultipleClockPins {
            cell: cell.name.clone(),
            pins: clocks.iter().map(|s| s.to_string()).collect(),
            offset: cell.offset,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::builder;

    fn build(text: &str) -> Library {
        let groups = crate::dsl::parse(text).unwrap();
        let mut built = builder::build(&groups, false);
        assert!(built.errors.is_empty(), "{:?}", built.errors);
        built.libraries.remove(0)
    }

    fn kinds(errors: &[ValidationError]) -> Vec<&'static str> {
        errors.iter().map(ValidationError::kind).collect()
    }

    #[test]
    fn test_valid_library() {
        let lib = build(
            r#"library(l) {
  cell(AND) {
    pin(A, B) { direction: input; }
    pin(Y) { direction: output; function: "A*B"; }
  }
}"#,
        );
        assert!(validate_library(&lib).is_empty());
        let validated = lib.validate().unwrap();
        // Already valid, so validating again finds nothing
        assert!(validate_library(validated.library()).is_empty());
    }

    #[test]
    fn test_input_with_function() {
        let text = r#"library(l) {
  cell(BAD) {
    pin(A) { direction: input; function: "A"; }
    pin(Y) { direction: output; function: "A"; }
  }
}"#;
        let errors = validate_library(&build(text));
        assert_eq!(kinds(&errors), vec!["BadOutputFunctionDirection"]);
        assert_eq!(errors[0].cell(), "BAD");
        assert_eq!(errors[0].offset(), text.find("\"A\"; }").unwrap() + 1);
    }

    #[test]
    fn test_duplicate_names() {
        let lib = build(
            r#"library(l) {
  cell(X) {
    pin(A) { direction: input; }
    pin(A) { direction: input; }
    pin(Y) { direction: output; function: "A"; }
  }
  cell(X) {
    pin(A) { direction: input; }
    pin(Y) { direction: output; function: "A'"; }
  }
}"#,
        );
        let errors = validate_library(&lib);
        assert_eq!(kinds(&errors), vec!["DuplicatePinName", "DuplicateCellName"]);
        assert!(errors[0].offset() < errors[1].offset());
    }

    #[test]
    fn test_clock_direction_and_references() {
        let lib = build(
            r#"library(l) {
  cell(C1) {
    pin(A) { direction: input; }
    pin(Y) { direction: output; clock: true; function: "A"; }
    pin(Z) { direction: output; function: "Y"; }
  }
}"#,
        );
        let errors = validate_library(&lib);
        assert_eq!(
            kinds(&errors),
            vec!["BadClockDirection", "UnresolvedSignalReference"]
        );
        assert!(matches!(
            &errors[1],
            ValidationError::UnresolvedSignalReference { signal, .. } if signal == "Y"
        ));
    }

    #[test]
    fn test_flip_flop_checks() {
        let lib = build(
            r#"library(l) {
  cell(FF) {
    ff(IQ, IQ) { clocked_on: "D"; next_state: "Q"; }
    ff(S, SN) { clocked_on: "D"; next_state: "D"; }
    pin(D) { direction: input; }
    pin(Q) { direction: output; function: "IQ"; }
  }
}"#,
        );
        let errors = validate_library(&lib);
        assert_eq!(
            kinds(&errors),
            vec![
                "MultipleFlipFlops",
                "DuplicateInternalStateName",
                // first ff: clocked_on on a non-clock pin, next_state on an output
                "UnresolvedSignalReference",
                "UnresolvedSignalReference",
                // second ff: clocked_on on a non-clock pin
                "UnresolvedSignalReference",
                "MissingClockPin",
            ]
        );
    }

    #[test]
    fn test_multiple_clock_pins() {
        let lib = build(
            r#"library(l) {
  cell(FF) {
    ff(IQ, IQN) { clocked_on: "C1"; next_state: "D"; }
    pin(C1, C2) { direction: input; clock: true; }
    pin(D) { direction: input; }
    pin(Q) { direction: output; function: "IQ"; }
  }
}"#,
        );
        let errors = validate_library(&lib);
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::MultipleClockPins { pins, .. }] if pins == &["C1", "C2"]
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let lib = build(
            r#"library(l) {
  cell(A) { pin(X) { direction: input; function: "X"; } }
  cell(A) { pin(X, X) { direction: input; } }
  cell(B) { pin(Y) { direction: output; clock: true; } }
}"#,
        );
        assert_eq!(validate_library(&lib), validate_library_with(&lib, true));
        assert!(lib.validate_with(true).is_err());
    }
}
