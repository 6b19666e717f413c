//! The rewriting layer: substitutions, matching, constraint normalization,
//! symbolic configurations, anti-unification, and rule synthesis.

pub mod anti_unify;
pub mod boolean;
pub mod cterm;
pub mod matching;
pub mod rule;
pub mod subst;
