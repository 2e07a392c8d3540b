//! Typed library model: building, validation and queries.
//!
//! [`builder::build`] narrows the parser's generic groups into a [`Library`],
//! [`validate_library`] checks it, and a [`ValidatedLibrary`] answers
//! questions about cells, pins and functions.

pub mod builder;
mod model;
mod query;
mod validate;

pub use model::*;
pub use query::ValidatedLibrary;
pub use validate::{validate_cell, validate_library, validate_library_with};

/// Map `f` over `items`, in parallel when requested and the `parallel`
/// feature is enabled. Results keep the order of `items`.
pub(crate) fn map_in_order<T, R, F>(items: &[T], parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    #[cfg(feature = "parallel")]
    if parallel {
        use rayon::prelude::*;
        return items.par_iter().map(f).collect();
    }

    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    items.iter().map(f).collect()
}
