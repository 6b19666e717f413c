//! Variable-to-term substitutions.
//!
//! A substitution is an immutable mapping from variable name to term. Keys
//! are unique; insertion order is irrelevant for semantics but preserved,
//! because [`Subst::unapply`] applies bindings in insertion order and
//! display is nicer when it is stable.

use std::fmt;

use crate::error::KastError;
use crate::language::prelude::{self, EQ_INT, EQ_K, ML_AND, ML_EQUALS, ML_OR};
use crate::language::term::Term;
use crate::language::traverse::{bottom_up, flatten_label, top_down};

/// Backed by an ordered list with linear lookup; substitutions stay small.
#[derive(Clone, Debug, Default)]
pub struct Subst {
    bindings: Vec<(String, Term)>,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(name: impl Into<String>, term: Term) -> Self {
        let mut subst = Subst::new();
        subst.insert(name, term);
        subst
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        self.bindings
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, term)| term)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Binds `name`, overwriting in place if it is already bound.
    pub fn insert(&mut self, name: impl Into<String>, term: Term) {
        let name = name.into();
        match self.bindings.iter_mut().find(|(key, _)| *key == name) {
            Some((_, value)) => *value = term,
            None => self.bindings.push((name, term)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(key, term)| (key.as_str(), term))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Replaces every bound variable in `term` by its value, bottom-up.
    pub fn apply(&self, term: Term) -> Term {
        bottom_up(
            &mut |term| {
                if let Term::Variable { name, .. } = &term
                    && let Some(value) = self.get(name)
                {
                    return value.clone();
                }
                term
            },
            term,
        )
    }

    /// Merges two substitutions; a key bound on both sides must map to
    /// structurally equal values or the merge fails.
    pub fn union(&self, other: &Subst) -> Option<Subst> {
        let mut merged = self.clone();
        for (name, term) in other.iter() {
            match merged.get(name) {
                Some(existing) if existing != term => return None,
                Some(_) => {}
                None => merged.insert(name, term.clone()),
            }
        }
        Some(merged)
    }

    /// Sequential composition: `other`'s values get `self` applied first;
    /// entries unique to `self` are carried through unchanged.
    pub fn compose(&self, other: &Subst) -> Subst {
        let mut composed = Subst::new();
        for (name, term) in other.iter() {
            composed.insert(name, self.apply(term.clone()));
        }
        for (name, term) in self.iter() {
            if !composed.contains(name) {
                composed.insert(name, term.clone());
            }
        }
        composed
    }

    /// Drops identity bindings.
    pub fn minimize(&self) -> Subst {
        let mut minimized = Subst::new();
        for (name, term) in self.iter() {
            if let Term::Variable { name: value, .. } = term
                && value == name
            {
                continue;
            }
            minimized.insert(name, term.clone());
        }
        minimized
    }

    /// Rewrites every syntactic occurrence of a bound value back to its
    /// variable, applying bindings in insertion order.
    pub fn unapply(&self, term: Term) -> Term {
        let mut unapplied = term;
        for (name, value) in self.iter() {
            unapplied = top_down(
                &mut |term| {
                    if term == *value {
                        Term::var(name)
                    } else {
                        term
                    }
                },
                unapplied,
            );
        }
        unapplied
    }

    /// Extracts a substitution from a conjunction in which every conjunct is
    /// an equality with a variable operand. Strictly for
    /// consistent-and-exhaustive extraction; anything else is an error.
    pub fn from_pred(pred: &Term) -> Result<Subst, KastError> {
        let mut subst = Subst::new();
        for conjunct in flatten_label(ML_AND, pred.clone()) {
            if let Term::Apply { label, .. } = &conjunct
                && label.name == ML_OR
            {
                return Err(KastError::SubstExtraction(format!(
                    "disjunction in predicate: {conjunct}"
                )));
            }
            match &conjunct {
                Term::Apply { label, args } if label.name == ML_EQUALS && args.len() == 2 => {
                    match (&args[0], &args[1]) {
                        (Term::Variable { name, .. }, term)
                        | (term, Term::Variable { name, .. }) => {
                            subst.insert(name.clone(), term.clone());
                        }
                        _ => {
                            return Err(KastError::SubstExtraction(format!(
                                "equality without a variable operand: {conjunct}"
                            )));
                        }
                    }
                }
                _ => {
                    return Err(KastError::SubstExtraction(format!(
                        "not an equality conjunct: {conjunct}"
                    )));
                }
            }
        }
        Ok(subst)
    }

    /// Greedy single-pass extraction of variable bindings from a
    /// conjunction, returning the residual predicate of the conjuncts that
    /// did not qualify. A candidate `v = t` qualifies only while `v` is
    /// unbound, `v` does not occur free in `t`, and no free variable of `t`
    /// is already bound, which makes extraction order-dependent: this is
    /// not a solver.
    pub fn extract(term: &Term) -> (Subst, Term) {
        let mut subst = Subst::new();
        let mut residuals = Vec::new();
        for conjunct in flatten_label(ML_AND, term.clone()) {
            match extract_binding(&subst, &conjunct) {
                Some((name, value)) => subst.insert(name, value),
                None => residuals.push(conjunct),
            }
        }
        (subst, prelude::ml_and(residuals))
    }

    /// The bindings as a matching-logic conjunction of equalities.
    pub fn ml_pred(&self) -> Term {
        prelude::ml_and(
            self.iter()
                .map(|(name, term)| {
                    prelude::ml_equals(Term::var(name), term.clone(), prelude::k_sort())
                })
                .collect(),
        )
    }

    /// The bindings as a boolean conjunction of `_==K_` equalities.
    pub fn bool_pred(&self) -> Term {
        prelude::and_bool(
            self.iter()
                .map(|(name, term)| prelude::eq_k(Term::var(name), term.clone()))
                .collect(),
        )
    }
}

fn extract_binding(subst: &Subst, conjunct: &Term) -> Option<(String, Term)> {
    let Term::Apply { label, args } = conjunct else {
        return None;
    };
    if label.name != ML_EQUALS || args.len() != 2 {
        return None;
    }
    // An equality stated through the boolean layer, `#Equals(true, a ==K b)`,
    // unwraps to the underlying operand pair.
    if args[0] == prelude::bool_token(true)
        && let Term::Apply { label, args } = &args[1]
        && (label.name == EQ_K || label.name == EQ_INT)
        && args.len() == 2
    {
        return candidate(subst, &args[0], &args[1])
            .or_else(|| candidate(subst, &args[1], &args[0]));
    }
    candidate(subst, &args[0], &args[1]).or_else(|| candidate(subst, &args[1], &args[0]))
}

fn candidate(subst: &Subst, var: &Term, value: &Term) -> Option<(String, Term)> {
    let Term::Variable { name, .. } = var else {
        return None;
    };
    if subst.contains(name) {
        return None;
    }
    let value_vars = value.free_vars();
    if value_vars.iter().any(|v| v == name || subst.contains(v)) {
        return None;
    }
    Some((name.clone(), value.clone()))
}

// Insertion order is display-only; two substitutions are equal when they
// bind the same keys to structurally equal values.
impl PartialEq for Subst {
    fn eq(&self, other: &Self) -> bool {
        self.bindings.len() == other.bindings.len()
            && self.iter().all(|(name, term)| other.get(name) == Some(term))
    }
}

impl Eq for Subst {}

impl FromIterator<(String, Term)> for Subst {
    fn from_iter<I: IntoIterator<Item = (String, Term)>>(iter: I) -> Self {
        let mut subst = Subst::new();
        for (name, term) in iter {
            subst.insert(name, term);
        }
        subst
    }
}

impl fmt::Display for Subst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, term)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} |-> {term}")?;
        }
        write!(f, "}}")
    }
}
