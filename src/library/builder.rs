//! Semantic builder: generic groups to typed entities.
//!
//! Each cell is built in two phases. The first reads every `pin` and `ff`
//! group and collects the cell's signal alphabet (pin names plus internal
//! state names); the second parses every function-like attribute against
//! that alphabet. Nothing is patched after construction.

use indexmap::{IndexMap, IndexSet};

use super::map_in_order;
use super::model::{Cell, Direction, FlipFlop, Function, Library, Pin};
use crate::dsl::{Attribute, Group, Value};
use crate::error::SemanticError;
use crate::expr;

/// Outcome of a build: every library that could be built plus every error.
///
/// Cells with errors are left out of their library; the rest are still
/// returned so that they can be validated in the same run.
#[derive(Debug, Default)]
pub struct Built {
    pub libraries: Vec<Library>,
    pub errors: Vec<SemanticError>,
}

/// Build typed libraries from the parser's top-level groups.
pub fn build(groups: &[Group], parallel: bool) -> Built {
    let mut built = Built::default();

    for group in groups {
        if group.name != "library" {
            built.errors.push(SemanticError::UnknownGroup {
                parent: "file".to_string(),
                name: group.name.clone(),
                offset: group.offset,
            });
            continue;
        }

        let (library, errors) = build_library(group, parallel);
        built.errors.extend(errors);
        built.libraries.extend(library);
    }

    tracing::debug!(
        libraries = built.libraries.len(),
        errors = built.errors.len(),
        "semantic build finished"
    );
    built
}

fn build_library(group: &Group, parallel: bool) -> (Option<Library>, Vec<SemanticError>) {
    let mut errors = Vec::new();
    let name = match name_arg(group) {
        Ok(name) => Some(name),
        Err(e) => {
            errors.push(e);
            None
        }
    };

    let attributes: IndexMap<String, Value> = group
        .attributes
        .iter()
        .map(|attr| (attr.key.clone(), attr.value.clone()))
        .collect();

    let mut cell_groups = Vec::new();
    for child in &group.groups {
        if child.name == "cell" {
            cell_groups.push(child);
        } else {
            errors.push(SemanticError::UnknownGroup {
                parent: group.label(),
                name: child.name.clone(),
                offset: child.offset,
            });
        }
    }

    let mut cells = Vec::with_capacity(cell_groups.len());
    for result in map_in_order(&cell_groups, parallel, |g| build_cell(g)) {
        match result {
            Ok(cell) => cells.push(cell),
            Err(cell_errors) => errors.extend(cell_errors),
        }
    }

    // Errors are reported in source order regardless of how cells were built
    errors.sort_by_key(SemanticError::offset);

    let library = name.map(|name| {
        tracing::debug!(library = %name, cells = cells.len(), "built library");
        Library {
            name,
            attributes,
            cells,
            offset: group.offset,
        }
    });
    (library, errors)
}

/// A function-like attribute before its expression is parsed.
#[derive(Clone)]
struct RawFunction<'a> {
    text: &'a str,
    /// Maps offsets in `text` back to the source
    source: &'a Attribute,
}

impl<'a> RawFunction<'a> {
    fn from_attribute(attr: &'a Attribute) -> Result<Self, SemanticError> {
        match &attr.value {
            Value::String(text) | Value::Identifier(text) => Ok(Self {
                text: text.as_str(),
                source: attr,
            }),
            other => Err(invalid_value(attr, "a string or identifier", other)),
        }
    }

    fn resolve(
        self,
        cell: &str,
        context: String,
        alphabet: &IndexSet<String>,
    ) -> Result<Function, SemanticError> {
        match expr::parse(self.text, alphabet) {
            Ok(expr) => Ok(Function {
                text: self.text.to_string(),
                expr,
                offset: self.source.source_offset(0),
            }),
            Err(source) => Err(SemanticError::Expression {
                cell: cell.to_string(),
                context,
                offset: self.source.source_offset(source.offset()),
                source,
            }),
        }
    }
}

/// Phase-one view of a `pin` group.
struct PinDecl<'a> {
    name: String,
    direction: Direction,
    clock: bool,
    function: Option<RawFunction<'a>>,
    offset: usize,
}

/// Phase-one view of an `ff` group.
struct FlipFlopDecl<'a> {
    state: String,
    state_inverted: String,
    clocked_on: RawFunction<'a>,
    next_state: RawFunction<'a>,
    clear: Option<RawFunction<'a>>,
    preset: Option<RawFunction<'a>>,
    offset: usize,
}

fn build_cell(group: &Group) -> Result<Cell, Vec<SemanticError>> {
    let mut errors = Vec::new();
    let name = name_arg(group).map_err(|e| vec![e])?;
    let label = group.label();

    let mut area = None;
    for attr in &group.attributes {
        match attr.key.as_str() {
            "area" => match attr.value.as_number() {
                Some(n) => area = Some(n),
                None => errors.push(invalid_value(attr, "a number", &attr.value)),
            },
            _ => errors.push(unknown_attribute(&label, attr)),
        }
    }

    // Phase 1: declarations and the signal alphabet
    let mut pin_decls = Vec::new();
    let mut ff_decls = Vec::new();
    let mut state_names = Vec::new();
    for child in &group.groups {
        match child.name.as_str() {
            "pin" => match read_pins(child) {
                Ok(decls) => pin_decls.extend(decls),
                Err(errs) => errors.extend(errs),
            },
            "ff" => {
                // State names stay referenceable even when the ff itself is malformed
                state_names.extend(child.args.iter().filter_map(Value::as_text));
                match read_flip_flop(child) {
                    Ok(decl) => ff_decls.push(decl),
                    Err(errs) => errors.extend(errs),
                }
            }
            _ => errors.push(SemanticError::UnknownGroup {
                parent: label.clone(),
                name: child.name.clone(),
                offset: child.offset,
            }),
        }
    }

    let mut alphabet: IndexSet<String> = pin_decls.iter().map(|p| p.name.clone()).collect();
    alphabet.extend(state_names.into_iter().map(str::to_string));

    // Phase 2: expressions
    let mut pins = Vec::with_capacity(pin_decls.len());
    for decl in pin_decls {
        let context = format!("function of pin '{}'", decl.name);
        let function = match decl.function {
            Some(raw) => match raw.resolve(&name, context, &alphabet) {
                Ok(function) => Some(function),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => None,
        };
        pins.push(Pin {
            name: decl.name,
            direction: decl.direction,
            function,
            clock: decl.clock,
            offset: decl.offset,
        });
    }

    let mut flip_flops = Vec::with_capacity(ff_decls.len());
    for decl in ff_decls {
        match resolve_flip_flop(decl, &name, &alphabet) {
            Ok(ff) => flip_flops.push(ff),
            Err(errs) => errors.extend(errs),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    tracing::trace!(cell = %name, pins = pins.len(), flip_flops = flip_flops.len(), "built cell");
    Ok(Cell {
        name,
        area,
        pins,
        flip_flops,
        offset: group.offset,
    })
}

/// `pin(A) { ... }`; `pin(A, B) { ... }` declares one pin per name.
fn read_pins(group: &Group) -> Result<Vec<PinDecl<'_>>, Vec<SemanticError>> {
    let mut errors = Vec::new();

    if group.args.is_empty() {
        errors.push(SemanticError::BadArguments {
            group: "pin".to_string(),
            expected: 1,
            found: 0,
            offset: group.offset,
        });
    }
    let mut names = Vec::new();
    for arg in &group.args {
        match arg.as_text() {
            Some(name) => names.push(name.to_string()),
            None => errors.push(SemanticError::InvalidValue {
                key: "pin name".to_string(),
                expected: "an identifier".to_string(),
                found: arg.to_string(),
                offset: group.offset,
            }),
        }
    }

    let label = group.label();
    let mut direction = None;
    let mut clock = false;
    let mut function = None;
    for attr in &group.attributes {
        match attr.key.as_str() {
            "direction" => match attr.value.as_text().and_then(Direction::from_keyword) {
                Some(d) => direction = Some(d),
                None => errors.push(invalid_value(attr, "input or output", &attr.value)),
            },
            "clock" => match attr.value.as_bool() {
                Some(b) => clock = b,
                None => errors.push(invalid_value(attr, "true or false", &attr.value)),
            },
            "function" => match RawFunction::from_attribute(attr) {
                Ok(raw) => function = Some(raw),
                Err(e) => errors.push(e),
            },
            _ => errors.push(unknown_attribute(&label, attr)),
        }
    }
    for child in &group.groups {
        errors.push(SemanticError::UnknownGroup {
            parent: label.clone(),
            name: child.name.clone(),
            offset: child.offset,
        });
    }

    let direction = match direction {
        Some(d) => d,
        None => {
            if group.attribute("direction").is_none() {
                errors.push(SemanticError::MissingAttribute {
                    group: label,
                    key: "direction".to_string(),
                    offset: group.offset,
                });
            }
            return Err(errors);
        }
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(names
        .into_iter()
        .map(|name| PinDecl {
            name,
            direction,
            clock,
            function: function.clone(),
            offset: group.offset,
        })
        .collect())
}

/// `ff(IQ, IQN) { clocked_on: ...; next_state: ...; }`
fn read_flip_flop(group: &Group) -> Result<FlipFlopDecl<'_>, Vec<SemanticError>> {
    let mut errors = Vec::new();
    let label = group.label();

    let names: Vec<&str> = group.args.iter().filter_map(Value::as_text).collect();
    if group.args.len() != 2 || names.len() != 2 {
        errors.push(SemanticError::BadArguments {
            group: "ff".to_string(),
            expected: 2,
            found: group.args.len(),
            offset: group.offset,
        });
    }

    let mut clocked_on: Option<RawFunction> = None;
    let mut next_state: Option<RawFunction> = None;
    let mut clear: Option<RawFunction> = None;
    let mut preset: Option<RawFunction> = None;
    for attr in &group.attributes {
        let slot = match attr.key.as_str() {
            "clocked_on" => &mut clocked_on,
            "next_state" => &mut next_state,
            "clear" => &mut clear,
            "preset" => &mut preset,
            _ => {
                errors.push(unknown_attribute(&label, attr));
                continue;
            }
        };
        match RawFunction::from_attribute(attr) {
            Ok(raw) => *slot = Some(raw),
            Err(e) => errors.push(e),
        }
    }
    for child in &group.groups {
        errors.push(SemanticError::UnknownGroup {
            parent: label.clone(),
            name: child.name.clone(),
            offset: child.offset,
        });
    }

    for required in ["clocked_on", "next_state"] {
        if group.attribute(required).is_none() {
            errors.push(SemanticError::MissingAttribute {
                group: label.clone(),
                key: required.to_string(),
                offset: group.offset,
            });
        }
    }

    match (names.as_slice(), clocked_on, next_state) {
        ([state, state_inverted], Some(clocked_on), Some(next_state)) if errors.is_empty() => {
            Ok(FlipFlopDecl {
                state: state.to_string(),
                state_inverted: state_inverted.to_string(),
                clocked_on,
                next_state,
                clear,
                preset,
                offset: group.offset,
            })
        }
        _ => Err(errors),
    }
}

fn resolve_flip_flop(
    decl: FlipFlopDecl<'_>,
    cell: &str,
    alphabet: &IndexSet<String>,
) -> Result<FlipFlop, Vec<SemanticError>> {
    let mut errors = Vec::new();
    let mut resolve = |raw: RawFunction<'_>, key: &str| {
        match raw.resolve(cell, format!("ff '{}'", key), alphabet) {
            Ok(function) => Some(function),
            Err(e) => {
                errors.push(e);
                None
            }
        }
    };

    let clocked_on = resolve(decl.clocked_on, "clocked_on");
    let next_state = resolve(decl.next_state, "next_state");
    let clear = decl.clear.map(|raw| resolve(raw, "clear"));
    let preset = decl.preset.map(|raw| resolve(raw, "preset"));

    match (clocked_on, next_state) {
        (Some(clocked_on), Some(next_state)) if errors.is_empty() => Ok(FlipFlop {
            state: decl.state,
            state_inverted: decl.state_inverted,
            clocked_on,
            next_state,
            clear: clear.flatten(),
            preset: preset.flatten(),
            offset: decl.offset,
        }),
        _ => Err(errors),
    }
}

/// The single name argument of a `library(...)` or `cell(...)` group.
fn name_arg(group: &Group) -> Result<String, SemanticError> {
    match group.args.as_slice() {
        [arg] => arg
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| SemanticError::InvalidValue {
                key: format!("{} name", group.name),
                expected: "an identifier".to_string(),
                found: arg.to_string(),
                offset: group.offset,
            }),
        args => Err(SemanticError::BadArguments {
            group: group.name.clone(),
            expected: 1,
            found: args.len(),
            offset: group.offset,
        }),
    }
}

fn unknown_attribute(group: &str, attr: &Attribute) -> SemanticError {
    SemanticError::UnknownAttribute {
        group: group.to_string(),
        key: attr.key.clone(),
        offset: attr.offset,
    }
}

fn invalid_value(attr: &Attribute, expected: &str, found: &Value) -> SemanticError {
    SemanticError::InvalidValue {
        key: attr.key.clone(),
        expected: expected.to_string(),
        found: found.to_string(),
        offset: attr.value_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExprError;
    use approx::assert_relative_eq;

    fn build_text(text: &str) -> Built {
        let groups = crate::dsl::parse(text).unwrap();
        build(&groups, false)
    }

    fn kinds(errors: &[SemanticError]) -> Vec<&'static str> {
        errors.iter().map(SemanticError::kind).collect()
    }

    #[test]
    fn test_build_combinational_cell() {
        let built = build_text(
            r#"library(demo) {
  delay_model: table_lookup;
  capacitive_load_unit(1, pf);
  cell(AND2) {
    area: 2.5;
    pin(A, B) { direction: input; }
    pin(Y) { direction: output; function: "A B"; }
  }
}"#,
        );
        assert!(built.errors.is_empty(), "{:?}", built.errors);
        let lib = &built.libraries[0];
        assert_eq!(lib.name, "demo");
        assert_eq!(
            lib.attributes.keys().collect::<Vec<_>>(),
            vec!["delay_model", "capacitive_load_unit"]
        );

        let cell = &lib.cells[0];
        assert_relative_eq!(cell.area.unwrap(), 2.5);
        let names: Vec<&str> = cell.pins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "Y"]);
        let y = cell.find_pin("Y").unwrap();
        let function = y.function.as_ref().unwrap();
        assert_eq!(function.text, "A B");
        assert_eq!(function.expr.to_string(), "(A*B)");
    }

    #[test]
    fn test_state_names_usable_before_ff_group() {
        // Pin functions may reference state declared later in the cell
        let built = build_text(
            r#"library(l) {
  cell(DFF) {
    pin(Q) { direction: output; function: "IQ"; }
    pin(C) { direction: input; clock: true; }
    pin(D) { direction: input; }
    ff(IQ, IQN) { clocked_on: "C"; next_state: "D"; }
  }
}"#,
        );
        assert!(built.errors.is_empty(), "{:?}", built.errors);
        let cell = &built.libraries[0].cells[0];
        assert!(cell.is_sequential());
        let ff = cell.flip_flop().unwrap();
        assert_eq!(ff.state_names(), ["IQ", "IQN"]);
        assert_eq!(ff.next_state.expr.to_string(), "D");
        assert!(ff.clear.is_none());
    }

    #[test]
    fn test_expression_error_offset_is_absolute() {
        let text = r#"library(l) {
  cell(X) {
    pin(A) { direction: input; }
    pin(Y) { direction: output; function: "A*Z"; }
  }
}"#;
        let built = build_text(text);
        assert!(built.libraries[0].cells.is_empty());
        match built.errors.as_slice() {
            [SemanticError::Expression {
                offset,
                source: ExprError::UnknownSignal { name, .. },
                ..
            }] => {
                assert_eq!(name, "Z");
                assert_eq!(*offset, text.find("Z\"").unwrap());
            }
            other => panic!("unexpected errors: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_ff_keeps_state_names() {
        // Only the missing attribute is reported, not the reference to IQ
        let built = build_text(
            r#"library(l) {
  cell(DFF) {
    ff(IQ, IQN) { clocked_on: "C"; }
    pin(C) { direction: input; clock: true; }
    pin(D) { direction: input; }
    pin(Q) { direction: output; function: "IQ"; }
  }
}"#,
        );
        assert!(built.libraries[0].cells.is_empty());
        assert_eq!(kinds(&built.errors), vec!["MissingAttribute"]);
    }

    #[test]
    fn test_expression_offset_after_line_continuation() {
        let text = "library(l) {\n  cell(X) {\n    pin(A) { direction: input; }\n    \
                    pin(Y) { direction: output; function: \"A*\\\n Z\"; }\n  }\n}";
        let built = build_text(text);
        match built.errors.as_slice() {
            [SemanticError::Expression {
                offset,
                source: ExprError::UnknownSignal { name, .. },
                ..
            }] => {
                assert_eq!(name, "Z");
                assert_eq!(*offset, text.find("Z\"").unwrap());
            }
            other => panic!("unexpected errors: {:?}", other),
        }
    }

    #[test]
    fn test_pin_names_with_identifier_punctuation() {
        let built = build_text(
            r#"library(l) {
  cell(X) {
    pin(a.b, $c) { direction: input; }
    pin(Y) { direction: output; function: "!a.b + $c"; }
  }
}"#,
        );
        assert!(built.errors.is_empty(), "{:?}", built.errors);
        let y = built.libraries[0].cells[0].find_pin("Y").unwrap();
        assert_eq!(y.function.as_ref().unwrap().expr.signals().len(), 2);
    }

    #[test]
    fn test_errors_in_one_cell_keep_others() {
        let built = build_text(
            r#"library(l) {
  cell(GOOD) {
    pin(A) { direction: input; }
  }
  cell(BAD) {
    drive: 4;
    pin(A) { clock: maybe; }
    ff(IQ) { next_state: "A"; }
    bus(B) { }
  }
  wire_load(small) { }
}"#,
        );
        let lib = &built.libraries[0];
        assert_eq!(lib.cells.len(), 1);
        assert_eq!(lib.cells[0].name, "GOOD");
        assert_eq!(
            kinds(&built.errors),
            vec![
                "UnknownAttribute",
                // reported at the pin group, before its `clock` value
                "MissingAttribute",
                "InvalidValue",
                "BadArguments",
                "MissingAttribute",
                "UnknownGroup",
                "UnknownGroup",
            ]
        );
    }

    #[test]
    fn test_non_library_top_level_group() {
        let built = build_text("cell(X) { }");
        assert!(built.libraries.is_empty());
        assert!(matches!(
            built.errors.as_slice(),
            [SemanticError::UnknownGroup { parent, name, .. }] if parent == "file" && name == "cell"
        ));
    }

    #[test]
    fn test_parallel_build_keeps_source_order() {
        let text = r#"library(l) {
  cell(A) { pin(X) { direction: input; } }
  cell(B) { pin(X) { direction: sideways; } }
  cell(C) { pin(X) { direction: input; } }
}"#;
        let groups = crate::dsl::parse(text).unwrap();
        let sequential = build(&groups, false);
        let parallel = build(&groups, true);
        assert_eq!(sequential.libraries, parallel.libraries);
        assert_eq!(sequential.errors, parallel.errors);
        let names: Vec<&str> = parallel.libraries[0]
            .cells
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
    }
}
