//! Library error taxonomy.
//!
//! Match failure is not an error: matching operations return `Option`.
//! The variants here cover shape violations, misuse of an operation outside
//! its documented domain, and internal invariant violations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KastError {
    #[error("expected exactly one configuration cell, found {cells}")]
    MalformedConfig { cells: usize },

    #[error("configuration is not a cell application: {0}")]
    NotACell(String),

    #[error("malformed term encoding: {0}")]
    Decode(String),

    #[error("cannot lower matching-logic predicate to Bool: {0}")]
    PredicateConversion(String),

    #[error("cannot extract substitution: {0}")]
    SubstExtraction(String),

    #[error("anti-unification failed to generalize its inputs: {0}")]
    AntiUnification(String),
}
