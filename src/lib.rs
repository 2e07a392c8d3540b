//! # Liberty Core
//!
//! Reader for standard-cell library descriptions.
//!
//! This library provides:
//! - A lexer and block parser for the group/attribute description language
//! - A parser and evaluator for the Boolean functions attached to pins
//! - A semantic builder that turns generic groups into typed cells, pins
//!   and flip-flops
//! - A validator that reports every invariant violation with its location
//! - A read-only query model for simulators and other downstream tools
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dsl`] - Lexer, generic group tree and block parser
//! - [`expr`] - Boolean function expressions
//! - [`library`] - Typed model, builder, validator and queries
//! - [`diagnostic`] - Located, stage-tagged problem reports
//! - [`pipeline`] - Runs every stage and collects diagnostics
//!
//! ## Usage
//!
//! ```
//! use liberty_core::expr::Assignment;
//!
//! let text = r#"
//! library(demo) {
//!   cell(NAND2) {
//!     pin(A, B) { direction: input; }
//!     pin(Y) { direction: output; function: "(A*B)'"; }
//!   }
//! }"#;
//!
//! let libraries = liberty_core::load(text).unwrap();
//! let nand = libraries[0].cell("NAND2").unwrap();
//!
//! let inputs: Assignment = [("A".to_string(), true), ("B".to_string(), true)]
//!     .into_iter()
//!     .collect();
//! assert!(!nand.evaluate("Y", &inputs).unwrap());
//! ```
//!
//! ## Pipeline
//!
//! 1. Lex and parse the text into a tree of generic groups
//! 2. Build each cell in two phases: collect its signal names, then parse its
//!    functions against them
//! 3. Validate the built cells
//!
//! Parse errors end the run. Otherwise semantic and validation problems from
//! all cells are reported together, sorted by source position.

pub mod diagnostic;
pub mod dsl;
pub mod error;
pub mod expr;
pub mod library;
pub mod pipeline;

// Re-export main types for convenience
pub use diagnostic::{Diagnostic, Diagnostics, Stage};
pub use error::{LibertyError, Result};
pub use library::{Cell, CellKind, Library, Pin, ValidatedLibrary};
pub use pipeline::{load, load_with, Config};

#[cfg(feature = "cli")]
pub use pipeline::load_file;
