//! Symbolic configurations: a cell-structured term paired with a
//! normalized, canonically ordered constraint set.
//!
//! Canonical ordering is by (serialized length, lexicographic) over the
//! constraints' JSON text, so equality and hashing are deterministic
//! regardless of insertion order.

use itertools::Itertools;

use crate::error::KastError;
use crate::language::dict::TermHash;
use crate::language::prelude::{self, ML_AND, ML_EQUALS};
use crate::language::term::Term;
use crate::language::traverse::flatten_label;

use super::subst::Subst;

/// A symbolic program state: configuration plus constraints. Constructing
/// one normalizes the constraint set; two states reachable from the same
/// facts in any order compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CTerm {
    config: Term,
    constraints: Vec<Term>,
    hash: TermHash,
}

impl CTerm {
    /// Builds a symbolic state. The configuration must be a cell
    /// application or a (weak) top/bottom sentinel; weak sentinels
    /// normalize to [`CTerm::top`] and [`CTerm::bottom`].
    pub fn new(config: Term, constraints: Vec<Term>) -> Result<CTerm, KastError> {
        if prelude::is_top(&config, true) {
            return Ok(CTerm::top());
        }
        if prelude::is_bottom(&config, true) {
            return Ok(CTerm::bottom());
        }
        if !config.is_cell() {
            return Err(KastError::NotACell(config.to_string()));
        }
        Ok(CTerm::build(config, constraints))
    }

    /// All states.
    pub fn top() -> CTerm {
        CTerm::build(prelude::ml_top(), Vec::new())
    }

    /// No states.
    pub fn bottom() -> CTerm {
        CTerm::build(prelude::ml_bottom(), Vec::new())
    }

    pub(super) fn build(config: Term, constraints: Vec<Term>) -> CTerm {
        let constraints = normalize_constraints(constraints);
        let hash = kast_of(&config, &constraints).hash();
        CTerm {
            config,
            constraints,
            hash,
        }
    }

    pub fn config(&self) -> &Term {
        &self.config
    }

    pub fn constraints(&self) -> &[Term] {
        &self.constraints
    }

    /// Content-addressed identity of this state, computed at construction.
    pub fn hash(&self) -> TermHash {
        self.hash
    }

    pub fn is_bottom(&self) -> bool {
        prelude::is_bottom(&self.config, true)
            || self
                .constraints
                .iter()
                .any(|constraint| prelude::is_bottom(constraint, true))
    }

    /// The whole state as one matching-logic term.
    pub fn to_kast(&self) -> Term {
        kast_of(&self.config, &self.constraints)
    }

    /// Splits a raw matching-logic term into its single cell-application
    /// component and the remaining conjuncts.
    pub fn from_kast(term: &Term) -> Result<CTerm, KastError> {
        let (config, constraints) = split_config_and_constraints(term)?;
        CTerm::new(config, constraints)
    }

    pub fn free_vars(&self) -> Vec<String> {
        self.to_kast().free_vars()
    }

    pub fn add_constraint(&self, constraint: Term) -> CTerm {
        let constraints = std::iter::once(constraint)
            .chain(self.constraints.iter().cloned())
            .collect();
        CTerm::build(self.config.clone(), constraints)
    }

    /// Matches configurations only; succeeds when the residual constraint
    /// of [`CTerm::match_with_constraint`] is trivially true.
    pub fn try_match(&self, other: &CTerm) -> Option<Subst> {
        let csubst = self.match_with_constraint(other)?;
        csubst
            .constraints
            .is_empty()
            .then(|| csubst.subst.clone())
    }

    /// Matches the configurations, pushes this state's constraints through
    /// the match substitution, and packages the substitution with the
    /// target constraints not structurally implied by them.
    pub fn match_with_constraint(&self, other: &CTerm) -> Option<CSubst> {
        let subst = self.config.try_match(&other.config)?;
        let source_constraints: Vec<Term> = self
            .constraints
            .iter()
            .map(|constraint| subst.apply(constraint.clone()))
            .collect();
        let constraints = other
            .constraints
            .iter()
            .filter(|constraint| !source_constraints.contains(constraint))
            .cloned()
            .collect();
        Some(CSubst::new(subst, constraints))
    }

    /// Drops constraints not connected to the configuration: starting from
    /// the configuration's free variables plus `keep_vars`, any constraint
    /// sharing a variable with the reachable set joins it, to a fixpoint.
    pub fn remove_useless_constraints(&self, keep_vars: &[String]) -> CTerm {
        let mut used_vars = self.config.free_vars();
        for var in keep_vars {
            if !used_vars.contains(var) {
                used_vars.push(var.clone());
            }
        }
        let constraint_vars: Vec<Vec<String>> =
            self.constraints.iter().map(Term::free_vars).collect();
        let mut prev_len = 0;
        while used_vars.len() > prev_len {
            prev_len = used_vars.len();
            for vars in &constraint_vars {
                if vars.iter().any(|var| used_vars.contains(var)) {
                    for var in vars {
                        if !used_vars.contains(var) {
                            used_vars.push(var.clone());
                        }
                    }
                }
            }
        }
        let constraints = self
            .constraints
            .iter()
            .zip_eq(&constraint_vars)
            .filter(|(_, vars)| vars.iter().any(|var| used_vars.contains(var)))
            .map(|(constraint, _)| constraint.clone())
            .collect();
        CTerm::build(self.config.clone(), constraints)
    }
}

/// A substitution paired with the constraints that must additionally hold:
/// "apply this instantiation and require these predicates."
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CSubst {
    subst: Subst,
    constraints: Vec<Term>,
}

impl CSubst {
    pub fn new(subst: Subst, constraints: Vec<Term>) -> CSubst {
        CSubst {
            subst,
            constraints: normalize_constraints(constraints),
        }
    }

    pub fn subst(&self) -> &Subst {
        &self.subst
    }

    pub fn constraints(&self) -> &[Term] {
        &self.constraints
    }

    /// The carried constraints as one conjunction.
    pub fn constraint(&self) -> Term {
        prelude::ml_and(self.constraints.clone())
    }

    pub fn add_constraint(&self, constraint: Term) -> CSubst {
        let constraints = std::iter::once(constraint)
            .chain(self.constraints.iter().cloned())
            .collect();
        CSubst::new(self.subst.clone(), constraints)
    }

    /// Extracts the substitution part of a raw predicate; the residual
    /// conjuncts become carried constraints.
    pub fn from_pred(pred: &Term) -> CSubst {
        let (subst, residual) = Subst::extract(pred);
        CSubst::new(subst, vec![residual])
    }

    /// The substitution's equalities conjoined with the carried constraints.
    pub fn pred(&self) -> Term {
        prelude::ml_and(
            std::iter::once(self.subst.ml_pred())
                .chain(self.constraints.iter().cloned())
                .collect(),
        )
    }

    /// Specializes a symbolic state by this instantiation.
    pub fn apply(&self, cterm: &CTerm) -> CTerm {
        let config = self.subst.apply(cterm.config().clone());
        let constraints = cterm
            .constraints()
            .iter()
            .map(|constraint| self.subst.apply(constraint.clone()))
            .chain(self.constraints.iter().cloned())
            .collect();
        CTerm::build(config, constraints)
    }
}

/// Splits a matching-logic conjunction into its unique cell-application
/// component and everything else.
pub fn split_config_and_constraints(term: &Term) -> Result<(Term, Vec<Term>), KastError> {
    let mut config = None;
    let mut constraints = Vec::new();
    let mut cells = 0;
    for conjunct in flatten_label(ML_AND, term.clone()) {
        if conjunct.is_cell() {
            cells += 1;
            config = Some(conjunct);
        } else {
            constraints.push(conjunct);
        }
    }
    match (cells, config) {
        (1, Some(config)) => Ok((config, constraints)),
        (cells, _) => Err(KastError::MalformedConfig { cells }),
    }
}

fn kast_of(config: &Term, constraints: &[Term]) -> Term {
    prelude::ml_and(
        std::iter::once(config.clone())
            .chain(constraints.iter().cloned())
            .collect(),
    )
}

fn normalize_constraints(constraints: Vec<Term>) -> Vec<Term> {
    let mut keyed: Vec<(String, Term)> = constraints
        .into_iter()
        .flat_map(|constraint| flatten_label(ML_AND, constraint))
        .unique()
        .filter(|constraint| !is_spurious_constraint(constraint))
        .map(|constraint| (constraint.to_json(), constraint))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| (a.len(), a).cmp(&(b.len(), b)));
    keyed.into_iter().map(|(_, constraint)| constraint).collect()
}

fn is_spurious_constraint(constraint: &Term) -> bool {
    if prelude::is_top(constraint, true) {
        return true;
    }
    matches!(constraint, Term::Apply { label, args }
        if label.name == ML_EQUALS && args.len() == 2 && args[0] == args[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::label::Label;
    use crate::language::prelude::{
        bool_token, eq_k, int_sort, int_token, k_sort, ml_and, ml_bottom, ml_equals,
        ml_equals_true, ml_top,
    };

    fn cell(args: Vec<Term>) -> Term {
        Term::apply(Label::new("<k>"), args)
    }

    fn eq(lhs: Term, rhs: Term) -> Term {
        ml_equals(lhs, rhs, k_sort())
    }

    #[test]
    fn construction_normalizes_constraints() {
        let constraints = vec![
            ml_and(vec![
                eq(Term::var("X"), int_token(1)),
                eq(Term::var("Y"), int_token(2)),
            ]),
            eq(Term::var("X"), int_token(1)),
            ml_top(),
            eq(int_token(3), int_token(3)),
        ];
        let cterm = CTerm::new(cell(vec![Term::var("X")]), constraints).unwrap();
        assert_eq!(cterm.constraints().len(), 2);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let constraints = vec![
            eq(Term::var("Y"), int_token(2)),
            eq(Term::var("X"), int_token(1)),
        ];
        let cterm = CTerm::new(cell(vec![Term::var("X")]), constraints).unwrap();
        let again = CTerm::new(cell(vec![Term::var("X")]), cterm.constraints().to_vec()).unwrap();
        assert_eq!(again.constraints(), cterm.constraints());
        assert_eq!(again, cterm);
    }

    #[test]
    fn ordering_ignores_insertion_order() {
        let a = eq(Term::var("X"), int_token(1));
        let b = eq(Term::var("Y"), Term::apply(Label::new("f"), vec![Term::var("X")]));
        let left = CTerm::new(cell(vec![Term::var("X")]), vec![a.clone(), b.clone()]).unwrap();
        let right = CTerm::new(cell(vec![Term::var("X")]), vec![b, a]).unwrap();
        assert_eq!(left, right);
        assert_eq!(left.hash(), right.hash());
    }

    #[test]
    fn sentinels() {
        assert!(CTerm::bottom().is_bottom());
        assert!(!CTerm::top().is_bottom());

        // Weak sentinels normalize away their constraints.
        let weak_top = Term::apply(Label::parametric("#Top", vec![k_sort()]), vec![]);
        let cterm = CTerm::new(weak_top, vec![eq(Term::var("X"), int_token(1))]).unwrap();
        assert_eq!(cterm, CTerm::top());

        let poisoned = CTerm::new(cell(vec![Term::var("X")]), vec![ml_bottom()]).unwrap();
        assert!(poisoned.is_bottom());
    }

    #[test]
    fn non_cell_configurations_are_rejected() {
        assert!(matches!(
            CTerm::new(Term::var("X"), vec![]),
            Err(KastError::NotACell(_))
        ));
        assert!(matches!(
            CTerm::new(Term::apply(Label::new("f"), vec![]), vec![]),
            Err(KastError::NotACell(_))
        ));
    }

    #[test]
    fn from_kast_requires_exactly_one_cell() {
        let config = cell(vec![Term::var("X")]);
        let constraint = eq(Term::var("X"), int_token(1));
        let cterm = CTerm::from_kast(&ml_and(vec![config.clone(), constraint.clone()])).unwrap();
        assert_eq!(cterm.config(), &config);
        assert_eq!(cterm.constraints(), &[constraint.clone()]);

        assert_eq!(
            CTerm::from_kast(&constraint),
            Err(KastError::MalformedConfig { cells: 0 })
        );
        let two_cells = ml_and(vec![config.clone(), cell(vec![Term::var("Y")])]);
        assert_eq!(
            CTerm::from_kast(&two_cells),
            Err(KastError::MalformedConfig { cells: 2 })
        );
    }

    #[test]
    fn to_kast_round_trips() {
        let cterm = CTerm::new(
            cell(vec![Term::var("X")]),
            vec![eq(Term::var("X"), int_token(1))],
        )
        .unwrap();
        assert_eq!(CTerm::from_kast(&cterm.to_kast()).unwrap(), cterm);
    }

    #[test]
    fn match_with_constraint_returns_the_leftovers() {
        let target_constraint = ml_equals_true(eq_k(Term::var("N"), int_token(3)));
        let pattern = CTerm::new(cell(vec![Term::var("X")]), vec![]).unwrap();
        let target = CTerm::new(
            cell(vec![Term::sorted_var("N", int_sort())]),
            vec![target_constraint.clone()],
        )
        .unwrap();

        let csubst = pattern.match_with_constraint(&target).unwrap();
        assert_eq!(
            csubst.subst().get("X"),
            Some(&Term::sorted_var("N", int_sort()))
        );
        assert_eq!(csubst.constraints(), &[target_constraint.clone()]);
        assert_eq!(csubst.constraint(), target_constraint);

        // The plain match refuses a non-trivial residual constraint.
        assert!(pattern.try_match(&target).is_none());
        let unconstrained = CTerm::new(cell(vec![int_token(7)]), vec![]).unwrap();
        assert!(pattern.try_match(&unconstrained).is_some());
    }

    #[test]
    fn matched_source_constraints_are_not_returned() {
        let pattern = CTerm::new(
            cell(vec![Term::var("X")]),
            vec![ml_equals_true(eq_k(Term::var("X"), int_token(1)))],
        )
        .unwrap();
        let target = CTerm::new(
            cell(vec![Term::var("Y")]),
            vec![ml_equals_true(eq_k(Term::var("Y"), int_token(1)))],
        )
        .unwrap();
        let csubst = pattern.match_with_constraint(&target).unwrap();
        assert!(csubst.constraints().is_empty());
        assert!(pattern.try_match(&target).is_some());
    }

    #[test]
    fn remove_useless_constraints_keeps_the_connected_component() {
        let config = cell(vec![Term::var("X")]);
        let connected = eq(Term::var("X"), Term::var("Y"));
        let transitive = eq(Term::var("Y"), int_token(1));
        let isolated = eq(Term::var("Z"), int_token(2));
        let kept = eq(Term::var("W"), int_token(3));
        let cterm = CTerm::new(
            config,
            vec![
                connected.clone(),
                transitive.clone(),
                isolated.clone(),
                kept.clone(),
            ],
        )
        .unwrap();

        let pruned = cterm.remove_useless_constraints(&[]);
        assert!(pruned.constraints().contains(&connected));
        assert!(pruned.constraints().contains(&transitive));
        assert!(!pruned.constraints().contains(&isolated));

        let pruned = cterm.remove_useless_constraints(&["W".to_string()]);
        assert!(pruned.constraints().contains(&kept));
        assert!(!pruned.constraints().contains(&isolated));
    }

    #[test]
    fn csubst_apply_specializes_a_state() {
        let cterm = CTerm::new(
            cell(vec![Term::var("X")]),
            vec![ml_equals_true(eq_k(Term::var("X"), Term::var("Y")))],
        )
        .unwrap();
        let csubst = CSubst::new(
            Subst::singleton("X", int_token(1)),
            vec![ml_equals_true(eq_k(Term::var("Y"), int_token(1)))],
        );
        let applied = csubst.apply(&cterm);
        assert_eq!(applied.config(), &cell(vec![int_token(1)]));
        assert_eq!(applied.constraints().len(), 2);
    }

    #[test]
    fn csubst_from_pred_splits_bindings_and_residual() {
        let pred = ml_and(vec![
            eq(Term::var("X"), int_token(1)),
            ml_equals_true(Term::var("B")),
        ]);
        let csubst = CSubst::from_pred(&pred);
        assert_eq!(csubst.subst().get("X"), Some(&int_token(1)));
        assert_eq!(
            csubst.constraints(),
            &[ml_equals_true(Term::var("B"))]
        );
    }

    #[test]
    fn csubst_pred_combines_bindings_and_constraints() {
        let csubst = CSubst::new(
            Subst::singleton("X", int_token(1)),
            vec![ml_equals_true(Term::var("B"))],
        );
        let pred = csubst.pred();
        let conjuncts = flatten_label(ML_AND, pred);
        assert_eq!(conjuncts.len(), 2);
        assert!(conjuncts.contains(&eq(Term::var("X"), int_token(1))));
        assert!(conjuncts.contains(&ml_equals_true(Term::var("B"))));
    }

    #[test]
    fn bool_literals_are_not_cells() {
        // Guards against bracket-ish tokens sneaking through the splitter.
        let not_cells = ml_and(vec![bool_token(true), Term::var("X")]);
        assert!(CTerm::from_kast(&not_cells).is_err());
    }
}
