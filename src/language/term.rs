//! The term representation.
//!
//! Every non-leaf variant exposes its immediate children as an ordered list
//! and can be rebuilt from a replacement list, which is what lets the
//! traversals in [`super::traverse`] work without per-variant dispatch at
//! every call site.

use std::collections::HashMap;

use super::label::Label;
use super::sort::Sort;
use super::traverse::collect;

/// Prefix marking a variable that occurs linearly and whose value is unused.
pub const UNUSED_PREFIX: char = '_';

/// Prefix marking a variable that is free only on the consequent side of a
/// rule.
pub const EXISTENTIAL_PREFIX: char = '?';

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// A literal value tagged with its sort.
    Token { token: String, sort: Sort },
    /// A named variable, optionally sorted.
    Variable { name: String, sort: Option<Sort> },
    /// A label applied to an ordered list of arguments.
    Apply { label: Label, args: Vec<Term> },
    /// A pattern bound to an alias; kept only for round-tripping.
    As { pattern: Box<Term>, alias: Box<Term> },
    /// A one-step transition pattern.
    Rewrite { lhs: Box<Term>, rhs: Box<Term> },
    /// An ordered list of terms; nested sequences flatten into their parent.
    Sequence { items: Vec<Term> },
}

impl Term {
    pub fn token(token: impl Into<String>, sort: Sort) -> Self {
        Term::Token {
            token: token.into(),
            sort,
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable {
            name: name.into(),
            sort: None,
        }
    }

    pub fn sorted_var(name: impl Into<String>, sort: Sort) -> Self {
        Term::Variable {
            name: name.into(),
            sort: Some(sort),
        }
    }

    pub fn apply(label: Label, args: Vec<Term>) -> Self {
        Term::Apply { label, args }
    }

    pub fn alias(pattern: Term, alias: Term) -> Self {
        Term::As {
            pattern: Box::new(pattern),
            alias: Box::new(alias),
        }
    }

    pub fn rewrite(lhs: Term, rhs: Term) -> Self {
        Term::Rewrite {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Builds a sequence, splicing any sequence item into its parent.
    pub fn sequence(items: Vec<Term>) -> Self {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Term::Sequence { items } => flat.extend(items),
                other => flat.push(other),
            }
        }
        Term::Sequence { items: flat }
    }

    /// The immediate children, in order. Leaves have none.
    pub fn children(&self) -> Vec<&Term> {
        match self {
            Term::Token { .. } | Term::Variable { .. } => Vec::new(),
            Term::Apply { args, .. } => args.iter().collect(),
            Term::As { pattern, alias } => vec![pattern, alias],
            Term::Rewrite { lhs, rhs } => vec![lhs, rhs],
            Term::Sequence { items } => items.iter().collect(),
        }
    }

    /// Rebuilds this node with a replacement child list.
    ///
    /// Panics if the replacement list does not fit the variant's arity; the
    /// traversals always hand back exactly as many children as they took.
    pub fn with_children(&self, children: Vec<Term>) -> Term {
        match self {
            Term::Token { .. } | Term::Variable { .. } => {
                assert!(children.is_empty(), "leaf term given replacement children");
                self.clone()
            }
            Term::Apply { label, .. } => Term::Apply {
                label: label.clone(),
                args: children,
            },
            Term::As { .. } => {
                let (pattern, alias) = two_children(children, "alias");
                Term::alias(pattern, alias)
            }
            Term::Rewrite { .. } => {
                let (lhs, rhs) = two_children(children, "rewrite");
                Term::rewrite(lhs, rhs)
            }
            Term::Sequence { .. } => Term::sequence(children),
        }
    }

    /// Whether this term is a single configuration cell.
    pub fn is_cell(&self) -> bool {
        matches!(self, Term::Apply { label, .. } if label.is_cell())
    }

    /// Free variable names in first-occurrence order, deduplicated.
    pub fn free_vars(&self) -> Vec<String> {
        let mut vars = Vec::new();
        collect(
            &mut |term| {
                if let Term::Variable { name, .. } = term
                    && !vars.contains(name)
                {
                    vars.push(name.clone());
                }
            },
            self,
        );
        vars
    }

    /// Occurrence counts of every variable.
    pub fn count_vars(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        collect(
            &mut |term| {
                if let Term::Variable { name, .. } = term {
                    *counts.entry(name.clone()).or_insert(0) += 1;
                }
            },
            self,
        );
        counts
    }
}

fn two_children(children: Vec<Term>, what: &str) -> (Term, Term) {
    let mut children = children.into_iter();
    match (children.next(), children.next(), children.next()) {
        (Some(first), Some(second), None) => (first, second),
        _ => panic!("{what} term takes exactly two children"),
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Token { token, .. } => write!(f, "{token}"),
            Term::Variable { name, sort: None } => write!(f, "{name}"),
            Term::Variable {
                name,
                sort: Some(sort),
            } => write!(f, "{name}:{sort}"),
            Term::Apply { label, args } => {
                write!(f, "({label}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            Term::As { pattern, alias } => write!(f, "({pattern} #as {alias})"),
            Term::Rewrite { lhs, rhs } => write!(f, "({lhs} => {rhs})"),
            Term::Sequence { items } => {
                if items.is_empty() {
                    return write!(f, ".K");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ~> ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}
