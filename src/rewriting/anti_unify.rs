//! Generalization of two configurations into a common symbolic pattern.
//!
//! A rewrite between two states is first pushed down toward the leaves, so
//! that only the genuinely differing subterms remain as rewrite nodes; each
//! survivor is then replaced by a fresh variable named deterministically
//! from its content hash. Deterministic naming keeps symbolic-execution
//! branches mergeable and reproducible across runs.

use itertools::Itertools;
use tracing::debug;

use crate::error::KastError;
use crate::language::Definition;
use crate::language::prelude::{and_bool, bool_token, ml_equals_true, or_bool};
use crate::language::sort::Sort;
use crate::language::term::Term;
use crate::language::traverse::{bottom_up, top_down};

use super::boolean::ml_pred_to_bool;
use super::cterm::{CSubst, CTerm};
use super::subst::Subst;

/// Distributes every rewrite node toward the leaves: equal sides collapse,
/// equal-label applications distribute argumentwise, and sequences split on
/// a shared head or tail item.
pub fn push_down_rewrites(term: Term) -> Term {
    top_down(
        &mut |term| match term {
            Term::Rewrite { lhs, rhs } => distribute(*lhs, *rhs),
            other => other,
        },
        term,
    )
}

fn distribute(lhs: Term, rhs: Term) -> Term {
    if lhs == rhs {
        return lhs;
    }
    match (lhs, rhs) {
        (
            Term::Apply {
                label: lhs_label,
                args: lhs_args,
            },
            Term::Apply {
                label: rhs_label,
                args: rhs_args,
            },
        ) if lhs_label == rhs_label && lhs_args.len() == rhs_args.len() => {
            let args = lhs_args
                .into_iter()
                .zip_eq(rhs_args)
                .map(|(lhs, rhs)| distribute(lhs, rhs))
                .collect();
            Term::Apply {
                label: lhs_label,
                args,
            }
        }
        (Term::Sequence { items: lhs_items }, Term::Sequence { items: rhs_items })
            if !lhs_items.is_empty() && !rhs_items.is_empty() =>
        {
            distribute_sequence(lhs_items, rhs_items)
        }
        (lhs, rhs) => Term::rewrite(lhs, rhs),
    }
}

fn distribute_sequence(mut lhs: Vec<Term>, mut rhs: Vec<Term>) -> Term {
    if lhs.len() == 1 && rhs.len() == 1 {
        return distribute(lhs.remove(0), rhs.remove(0));
    }
    if lhs.first() == rhs.first() {
        let head = lhs.remove(0);
        rhs.remove(0);
        return Term::sequence(vec![
            head,
            distribute(Term::sequence(lhs), Term::sequence(rhs)),
        ]);
    }
    if lhs.last() == rhs.last() {
        let tail = lhs.pop().expect("sequence sides are non-empty");
        rhs.pop();
        return Term::sequence(vec![
            distribute(Term::sequence(lhs), Term::sequence(rhs)),
            tail,
        ]);
    }
    Term::rewrite(Term::sequence(lhs), Term::sequence(rhs))
}

/// A fresh variable named deterministically from the hash of the term it
/// abstracts.
pub fn abstract_term_safely(term: &Term, base_name: &str, sort: Option<Sort>) -> Term {
    let name = format!("{base_name}_{}", term.hash().short());
    Term::Variable { name, sort }
}

/// Generalizes two terms into a common pattern plus the substitutions that
/// recover each original. Sorts for the abstraction variables are looked up
/// from `defn` when one is supplied.
pub fn anti_unify(
    term1: &Term,
    term2: &Term,
    defn: Option<&Definition>,
) -> Result<(Term, Subst, Subst), KastError> {
    let pushed = push_down_rewrites(Term::rewrite(term1.clone(), term2.clone()));
    let generalized = bottom_up(
        &mut |term| {
            if matches!(term, Term::Rewrite { .. }) {
                let sort = defn.and_then(|defn| defn.sort_of(&term));
                abstract_term_safely(&term, "V", sort)
            } else {
                term
            }
        },
        pushed,
    );
    let subst1 = generalized.try_match(term1);
    let subst2 = generalized.try_match(term2);
    match (subst1, subst2) {
        (Some(subst1), Some(subst2)) => Ok((generalized, subst1, subst2)),
        _ => Err(KastError::AntiUnification(format!(
            "generalization does not cover both sides: {term1} vs {term2}"
        ))),
    }
}

impl CTerm {
    /// Generalizes two symbolic states. Constraints common to both sides
    /// survive, pruned of anything disconnected from the generalized
    /// configuration; with `keep_values`, the branch-distinguishing
    /// constraints of each side are folded into a single disjunctive guard
    /// so no branch information is silently lost.
    pub fn anti_unify(
        &self,
        other: &CTerm,
        keep_values: bool,
        defn: Option<&Definition>,
    ) -> Result<(CTerm, CSubst, CSubst), KastError> {
        let (config, subst1, subst2) = anti_unify(self.config(), other.config(), defn)?;
        debug!(
            "generalized configurations {} and {}",
            self.hash().short(),
            other.hash().short()
        );
        let common: Vec<Term> = self
            .constraints()
            .iter()
            .filter(|constraint| other.constraints().contains(constraint))
            .cloned()
            .collect();

        let mut generalized = CTerm::new(config, Vec::new())?;
        if keep_values {
            let lhs_branch = branch_pred(&subst1, self, &common)?;
            let rhs_branch = branch_pred(&subst2, other, &common)?;
            // A side with no distinguishing information makes the guard
            // vacuous; skip it.
            if lhs_branch != bool_token(true) && rhs_branch != bool_token(true) {
                generalized = generalized
                    .add_constraint(ml_equals_true(or_bool(vec![lhs_branch, rhs_branch])));
            }
        }

        let seed = generalized.free_vars();
        let mut with_common = generalized;
        for constraint in common {
            with_common = with_common.add_constraint(constraint);
        }
        let generalized = with_common.remove_useless_constraints(&seed);

        let self_csubst = generalized.match_with_constraint(self);
        let other_csubst = generalized.match_with_constraint(other);
        match (self_csubst, other_csubst) {
            (Some(self_csubst), Some(other_csubst)) => {
                Ok((generalized, self_csubst, other_csubst))
            }
            _ => Err(KastError::AntiUnification(format!(
                "generalized state does not match both sides: {} vs {}",
                self.config(),
                other.config()
            ))),
        }
    }
}

fn branch_pred(subst: &Subst, side: &CTerm, common: &[Term]) -> Result<Term, KastError> {
    let mut conjuncts = vec![subst.bool_pred()];
    for constraint in side.constraints() {
        if !common.contains(constraint) {
            conjuncts.push(ml_pred_to_bool(constraint, false)?);
        }
    }
    Ok(and_bool(conjuncts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::label::Label;
    use crate::language::prelude::{eq_k, int_sort, int_token};

    fn app(label: &str, args: Vec<Term>) -> Term {
        Term::apply(Label::new(label), args)
    }

    fn cell(args: Vec<Term>) -> Term {
        Term::apply(Label::new("<k>"), args)
    }

    #[test]
    fn rewrites_distribute_through_equal_labels() {
        let rewrite = Term::rewrite(
            app("f", vec![int_token(1), int_token(2)]),
            app("f", vec![int_token(1), int_token(3)]),
        );
        assert_eq!(
            push_down_rewrites(rewrite),
            app(
                "f",
                vec![int_token(1), Term::rewrite(int_token(2), int_token(3))]
            )
        );
    }

    #[test]
    fn equal_sides_collapse() {
        let term = app("f", vec![int_token(1)]);
        let rewrite = Term::rewrite(term.clone(), term.clone());
        assert_eq!(push_down_rewrites(rewrite), term);
    }

    #[test]
    fn different_labels_stay_at_the_root() {
        let rewrite = Term::rewrite(app("f", vec![]), app("g", vec![]));
        assert_eq!(push_down_rewrites(rewrite.clone()), rewrite);
    }

    #[test]
    fn sequences_split_on_a_shared_head() {
        let rewrite = Term::rewrite(
            Term::sequence(vec![int_token(1), int_token(2)]),
            Term::sequence(vec![int_token(1), int_token(3)]),
        );
        assert_eq!(
            push_down_rewrites(rewrite),
            Term::sequence(vec![int_token(1), Term::rewrite(int_token(2), int_token(3))])
        );
    }

    #[test]
    fn sequences_split_on_a_shared_tail() {
        let rewrite = Term::rewrite(
            Term::sequence(vec![int_token(2), int_token(9)]),
            Term::sequence(vec![int_token(3), int_token(9)]),
        );
        assert_eq!(
            push_down_rewrites(rewrite),
            Term::sequence(vec![Term::rewrite(int_token(2), int_token(3)), int_token(9)])
        );
    }

    #[test]
    fn singleton_sequences_keep_distributing() {
        let rewrite = Term::rewrite(
            Term::sequence(vec![app("f", vec![int_token(1)])]),
            Term::sequence(vec![app("f", vec![int_token(2)])]),
        );
        assert_eq!(
            push_down_rewrites(rewrite),
            app("f", vec![Term::rewrite(int_token(1), int_token(2))])
        );
    }

    #[test]
    fn abstraction_names_are_stable() {
        let term = Term::rewrite(int_token(1), int_token(2));
        let var1 = abstract_term_safely(&term, "V", None);
        let var2 = abstract_term_safely(&term, "V", None);
        assert_eq!(var1, var2);
        let Term::Variable { name, sort } = &var1 else {
            panic!("expected a variable");
        };
        assert!(name.starts_with("V_"));
        assert_eq!(name.len(), "V_".len() + 8);
        assert!(sort.is_none());

        let other = abstract_term_safely(&Term::rewrite(int_token(1), int_token(3)), "V", None);
        assert_ne!(var1, other);
    }

    #[test]
    fn anti_unify_is_general() {
        let term1 = app("f", vec![int_token(1), int_token(5)]);
        let term2 = app("f", vec![int_token(2), int_token(5)]);
        let (generalized, subst1, subst2) = anti_unify(&term1, &term2, None).unwrap();

        assert_eq!(subst1.apply(generalized.clone()), term1);
        assert_eq!(subst2.apply(generalized.clone()), term2);

        // The shared argument survives concrete; only the difference is
        // abstracted.
        let Term::Apply { args, .. } = &generalized else {
            panic!("expected an application");
        };
        assert!(matches!(args[0], Term::Variable { .. }));
        assert_eq!(args[1], int_token(5));
    }

    #[test]
    fn anti_unify_identical_terms_needs_no_abstraction() {
        let term = app("f", vec![int_token(1)]);
        let (generalized, subst1, subst2) = anti_unify(&term, &term, None).unwrap();
        assert_eq!(generalized, term);
        assert!(subst1.is_empty());
        assert!(subst2.is_empty());
    }

    #[test]
    fn anti_unify_sorts_abstractions_from_the_definition() {
        let defn = Definition::default()
            .declare("val", int_sort())
            .declare("inc", int_sort());
        let term1 = app("f", vec![app("val", vec![int_token(1)])]);
        let term2 = app("f", vec![app("inc", vec![int_token(1)])]);
        let (generalized, _, _) = anti_unify(&term1, &term2, Some(&defn)).unwrap();
        let Term::Apply { args, .. } = &generalized else {
            panic!("expected an application");
        };
        // Both sides are declared at sort Int, so the abstraction variable
        // picks that sort up.
        let Term::Variable { sort, .. } = &args[0] else {
            panic!("expected a variable, got {}", args[0]);
        };
        assert_eq!(sort.as_ref(), Some(&int_sort()));
    }

    #[test]
    fn cterm_anti_unify_keeps_common_constraints() {
        let shared = ml_equals_true(eq_k(Term::var("X"), int_token(0)));
        let only_left = ml_equals_true(eq_k(Term::var("Y"), int_token(1)));
        let left = CTerm::new(
            cell(vec![Term::var("X"), int_token(1)]),
            vec![shared.clone(), only_left],
        )
        .unwrap();
        let right = CTerm::new(
            cell(vec![Term::var("X"), int_token(2)]),
            vec![shared.clone()],
        )
        .unwrap();

        let (generalized, left_csubst, right_csubst) =
            left.anti_unify(&right, false, None).unwrap();
        assert_eq!(generalized.constraints(), &[shared]);
        assert_eq!(left_csubst.apply(&generalized).config(), left.config());
        assert_eq!(right_csubst.apply(&generalized).config(), right.config());
    }

    #[test]
    fn cterm_anti_unify_prunes_disconnected_common_constraints() {
        let disconnected = ml_equals_true(eq_k(Term::var("Q"), int_token(9)));
        let left = CTerm::new(cell(vec![int_token(1)]), vec![disconnected.clone()]).unwrap();
        let right = CTerm::new(cell(vec![int_token(2)]), vec![disconnected]).unwrap();
        let (generalized, _, _) = left.anti_unify(&right, false, None).unwrap();
        assert!(generalized.constraints().is_empty());
    }

    #[test]
    fn keep_values_attaches_a_disjunctive_guard() {
        let left = CTerm::new(cell(vec![int_token(1)]), vec![]).unwrap();
        let right = CTerm::new(cell(vec![int_token(2)]), vec![]).unwrap();
        let (generalized, left_csubst, right_csubst) =
            left.anti_unify(&right, true, None).unwrap();

        assert_eq!(generalized.constraints().len(), 1);
        let guard = &generalized.constraints()[0];
        // The differing cell contents collapse into one abstraction variable.
        let expected_var =
            abstract_term_safely(&Term::rewrite(int_token(1), int_token(2)), "V", None);
        let Term::Variable { name, .. } = &expected_var else {
            panic!("expected a variable");
        };
        assert_eq!(
            guard,
            &ml_equals_true(or_bool(vec![
                eq_k(Term::var(name.clone()), int_token(1)),
                eq_k(Term::var(name.clone()), int_token(2)),
            ]))
        );

        assert_eq!(left_csubst.subst().get(name), Some(&int_token(1)));
        assert_eq!(right_csubst.subst().get(name), Some(&int_token(2)));
    }

    #[test]
    fn cterm_anti_unify_reports_its_substitutions() {
        let left = CTerm::new(
            cell(vec![app("g", vec![int_token(1)]), int_token(7)]),
            vec![],
        )
        .unwrap();
        let right = CTerm::new(
            cell(vec![app("g", vec![int_token(2)]), int_token(7)]),
            vec![],
        )
        .unwrap();
        let (generalized, left_csubst, right_csubst) =
            left.anti_unify(&right, false, None).unwrap();
        assert_eq!(left_csubst.apply(&generalized), left);
        assert_eq!(right_csubst.apply(&generalized), right);
    }
}
