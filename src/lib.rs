//! Term representation, matching, and symbolic rewriting for cell-structured
//! configurations.
//!
//! The crate models program states as first-order terms with a constraint
//! set, computes the substitutions that witness one state being an instance
//! of another, generalizes pairs of states through anti-unification, and
//! synthesizes rewrite rules and claims from pairs of symbolic states.

pub mod error;
pub mod language;
pub mod rewriting;

pub use error::KastError;
pub use language::Definition;
pub use language::label::Label;
pub use language::sort::Sort;
pub use language::term::Term;
pub use rewriting::cterm::{CSubst, CTerm};
pub use rewriting::rule::{Claim, RewriteRule};
pub use rewriting::subst::Subst;
