//! End-to-end loading: lex, parse, build and validate.
//!
//! Every stage error is converted into a located [`Diagnostic`]. Parse errors
//! stop the pipeline (there is no reliable tree to build from); semantic and
//! validation problems are collected together so that one run reports
//! everything that is wrong.

use crate::diagnostic::{Diagnostic, Diagnostics, LineIndex};
use crate::dsl;
use crate::library::{builder, ValidatedLibrary};

/// Pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Keep parsing after a malformed statement.
    pub error_recovery: bool,
    /// Build and validate cells on the rayon pool.
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            error_recovery: true,
            parallel: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the parser recovers from malformed statements.
    ///
    /// With recovery off the first parse error is the only one reported.
    pub fn with_error_recovery(mut self, error_recovery: bool) -> Self {
        self.error_recovery = error_recovery;
        self
    }

    /// Set whether cells are processed in parallel.
    ///
    /// Has no effect unless the crate is built with the `parallel` feature.
    /// Reports are in source order either way.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Load every library in `text` with the default configuration.
pub fn load(text: &str) -> Result<Vec<ValidatedLibrary>, Diagnostics> {
    load_with(text, &Config::default())
}

/// Load every library in `text`.
///
/// On failure the diagnostics cover all stages that ran, sorted by offset.
pub fn load_with(text: &str, config: &Config) -> Result<Vec<ValidatedLibrary>, Diagnostics> {
    let index = LineIndex::new(text);

    let groups = dsl::parse_with_recovery(text, config.error_recovery).map_err(|errors| {
        tracing::debug!(errors = errors.len(), "parse failed");
        Diagnostics::from_vec(
            errors
                .iter()
                .map(|e| Diagnostic::from_parse(e, &index))
                .collect(),
        )
    })?;
    tracing::debug!(groups = groups.len(), "parsed");

    let built = builder::build(&groups, config.parallel);
    let mut diagnostics: Vec<Diagnostic> = built
        .errors
        .iter()
        .map(|e| Diagnostic::from_semantic(e, &index))
        .collect();

    let mut libraries = Vec::with_capacity(built.libraries.len());
    for library in built.libraries {
        match library.validate_with(config.parallel) {
            Ok(validated) => libraries.push(validated),
            Err(errors) => diagnostics.extend(
                errors
                    .iter()
                    .map(|e| Diagnostic::from_validation(e, &index)),
            ),
        }
    }

    if !diagnostics.is_empty() {
        tracing::debug!(problems = diagnostics.len(), "library rejected");
        return Err(Diagnostics::from_vec(diagnostics));
    }

    tracing::debug!(libraries = libraries.len(), "library loaded");
    Ok(libraries)
}

/// Read and load a library file.
#[cfg(feature = "cli")]
pub fn load_file(
    path: impl AsRef<std::path::Path>,
    config: &Config,
) -> crate::Result<Vec<ValidatedLibrary>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| {
        crate::LibertyError::FileReadError {
            path: path.display().to_string(),
            source,
        }
    })?;
    tracing::info!(path = %path.display(), bytes = text.len(), "loading library");
    Ok(load_with(&text, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Stage;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert!(config.error_recovery);
        assert!(!config.parallel);
        let config = config.with_error_recovery(false).with_parallel(true);
        assert!(!config.error_recovery);
        assert!(config.parallel);
    }

    #[test]
    fn test_load_reports_all_stages_together() {
        let text = r#"library(l) {
  cell(A) {
    pin(X) { direction: input; }
    pin(Y) { direction: output; function: "X*W"; }
  }
  cell(B) {
    pin(X) { direction: input; function: "X"; }
    pin(Y) { direction: output; function: "X"; }
  }
}"#;
        let diagnostics = load(text).unwrap_err();
        let found: Vec<_> = diagnostics.iter().map(|d| (d.stage, d.kind, d.line)).collect();
        assert_eq!(
            found,
            vec![
                (Stage::Expr, "UnknownSignal", 4),
                (Stage::Validate, "BadOutputFunctionDirection", 7),
            ]
        );
    }

    #[test]
    fn test_parse_errors_stop_pipeline() {
        let text = "library(l) {\n  cell(A) { pin(X) { direction input; } }\n  cell(B) { pin { } }\n}";
        let diagnostics = load(text).unwrap_err();
        assert!(diagnostics.iter().all(|d| d.stage == Stage::Parse));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.iter().next().map(|d| d.line), Some(2));
    }

    #[test]
    fn test_fail_fast_reports_first_error_only() {
        let text = "library(l) {\n  a: ;\n  b: ;\n}";
        assert_eq!(load(text).unwrap_err().len(), 2);
        let config = Config::new().with_error_recovery(false);
        assert_eq!(load_with(text, &config).unwrap_err().len(), 1);
    }

    #[test]
    fn test_lex_error_is_located() {
        let diagnostics = load("library(l) {\n  a: \"open;\n}").unwrap_err();
        let first = diagnostics.iter().next().unwrap();
        assert_eq!(first.stage, Stage::Lex);
        assert_eq!(first.kind, "UnterminatedString");
        assert_eq!((first.line, first.column), (2, 6));
    }

    #[test]
    fn test_load_several_libraries() {
        let libraries = load("library(a) { }\nlibrary(b) { }").unwrap();
        let names: Vec<_> = libraries.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
