//! Runtime model of the reactive contract the emitted code relies on.
//!
//! The compiler never executes this module; it pins down what the wrapper
//! kinds chosen by the classifier mean at run time, and is exercised by the
//! test suite.

pub mod binding;
pub mod graph;
pub mod pool;
pub mod property;
pub mod value;

pub use binding::Binding;
pub use graph::{ElementId, ReactiveGraph, SourceId};
pub use pool::{PoolStats, Recyclable, RecyclePool};
pub use property::{Property, SyncMode};
pub use value::Value;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    #[error("@{kind} field '{field}' needs a source from its parent")]
    MissingParent { field: String, kind: &'static str },

    #[error("@{kind} field '{field}' is not backed by a reactive source")]
    NotReactive { field: String, kind: &'static str },

    #[error("@Param field '{field}' can only be changed by its parent")]
    ReadOnly { field: String },
}
