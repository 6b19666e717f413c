//! Conversion between matching-logic predicates and boolean expressions,
//! plus the algebraic simplifier that keeps constraints in a canonical,
//! prover-friendly form.

use tracing::warn;

use crate::error::KastError;
use crate::language::label::Label;
use crate::language::prelude::{
    BOOL_AND, BOOL_OR, EQ_INT, EQ_K, ML_AND, ML_BOTTOM, ML_CEIL, ML_EQUALS, ML_EXISTS,
    ML_IMPLIES, ML_NOT, ML_OR, ML_TOP, NEQ_INT, NEQ_K, and_bool, bool_token, eq_int, eq_k,
    implies_bool, int_sort, ml_and, ml_bottom, ml_equals_true, ml_top, not_bool, or_bool,
};
use crate::language::sort::Sort;
use crate::language::term::Term;
use crate::language::traverse::{flatten_label, top_down};

use super::anti_unify::abstract_term_safely;

/// Lowers a matching-logic predicate to a boolean-sort expression.
///
/// In `unsafe_mode`, `#Ceil` and `#Exists` do not fail but collapse into a
/// deterministically named abstraction variable, losing precision.
pub fn ml_pred_to_bool(pred: &Term, unsafe_mode: bool) -> Result<Term, KastError> {
    if let Term::Apply { label, args } = pred {
        match label.name.as_str() {
            ML_TOP if args.is_empty() => return Ok(bool_token(true)),
            ML_BOTTOM if args.is_empty() => return Ok(bool_token(false)),
            ML_NOT if args.len() == 1 => {
                return Ok(not_bool(ml_pred_to_bool(&args[0], unsafe_mode)?));
            }
            ML_AND => {
                let conjuncts = args
                    .iter()
                    .map(|arg| ml_pred_to_bool(arg, unsafe_mode))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(and_bool(conjuncts));
            }
            ML_OR => {
                let disjuncts = args
                    .iter()
                    .map(|arg| ml_pred_to_bool(arg, unsafe_mode))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(or_bool(disjuncts));
            }
            ML_IMPLIES if args.len() == 2 => {
                return Ok(implies_bool(
                    ml_pred_to_bool(&args[0], unsafe_mode)?,
                    ml_pred_to_bool(&args[1], unsafe_mode)?,
                ));
            }
            ML_EQUALS if args.len() == 2 => return equals_to_bool(&args[0], &args[1]),
            ML_CEIL | ML_EXISTS if unsafe_mode => {
                let base = if label.name == ML_CEIL { "Ceil" } else { "Exists" };
                warn!("abstracting {base} predicate into a fresh variable: {pred}");
                return Ok(abstract_term_safely(pred, base, None));
            }
            _ => {}
        }
    }
    Err(KastError::PredicateConversion(pred.to_string()))
}

fn equals_to_bool(lhs: &Term, rhs: &Term) -> Result<Term, KastError> {
    // An equality against a boolean literal collapses to (negated) identity.
    if *lhs == bool_token(true) {
        return Ok(rhs.clone());
    }
    if *lhs == bool_token(false) {
        return Ok(not_bool(rhs.clone()));
    }
    if *rhs == bool_token(true) {
        return Ok(lhs.clone());
    }
    if *rhs == bool_token(false) {
        return Ok(not_bool(lhs.clone()));
    }
    // Otherwise a structural equality, sort-dispatched when the sort of a
    // term-like operand is known.
    if term_like(lhs) || term_like(rhs) {
        let int = operand_sort(lhs)
            .or_else(|| operand_sort(rhs))
            .is_some_and(|sort| sort == int_sort());
        return Ok(if int {
            eq_int(lhs.clone(), rhs.clone())
        } else {
            eq_k(lhs.clone(), rhs.clone())
        });
    }
    Err(KastError::PredicateConversion(format!(
        "equality between non-term-like operands: {lhs} = {rhs}"
    )))
}

fn term_like(term: &Term) -> bool {
    matches!(term, Term::Variable { .. } | Term::Token { .. })
}

fn operand_sort(term: &Term) -> Option<Sort> {
    match term {
        Term::Token { sort, .. } => Some(sort.clone()),
        Term::Variable { sort, .. } => sort.clone(),
        _ => None,
    }
}

/// Raises a boolean expression back into a matching-logic predicate,
/// flattening `_andBool_` and wrapping literals as top/bottom.
pub fn bool_to_ml_pred(term: &Term) -> Term {
    let conjuncts = flatten_label(BOOL_AND, term.clone())
        .into_iter()
        .map(|conjunct| {
            if conjunct == bool_token(true) {
                ml_top()
            } else if conjunct == bool_token(false) {
                ml_bottom()
            } else {
                ml_equals_true(conjunct)
            }
        })
        .collect();
    ml_and(conjuncts)
}

/// Applies the local simplification table everywhere, repeating the pass
/// until a fixpoint.
pub fn simplify_bool(term: &Term) -> Term {
    let rules = simplification_rules();
    let mut simplified = term.clone();
    loop {
        let mut next = simplified.clone();
        for (pattern, replacement) in &rules {
            next = rewrite_anywhere(pattern, replacement, next);
        }
        if next == simplified {
            return simplified;
        }
        simplified = next;
    }
}

/// The canonical constraint-normalization entry point, used before
/// constraints are stored or compared.
pub fn normalize_ml_pred(pred: &Term) -> Result<Term, KastError> {
    Ok(bool_to_ml_pred(&simplify_bool(&ml_pred_to_bool(
        pred, false,
    )?)))
}

fn rewrite_anywhere(pattern: &Term, replacement: &Term, term: Term) -> Term {
    top_down(
        &mut |term| match pattern.try_match(&term) {
            Some(subst) => subst.apply(replacement.clone()),
            None => term,
        },
        term,
    )
}

fn binop(label: &str, lhs: Term, rhs: Term) -> Term {
    Term::apply(Label::new(label), vec![lhs, rhs])
}

fn simplification_rules() -> Vec<(Term, Term)> {
    let t = bool_token(true);
    let f = bool_token(false);
    let lhs = Term::var("#LHS");
    let rhs = Term::var("#RHS");
    vec![
        (binop(EQ_K, lhs.clone(), t.clone()), lhs.clone()),
        (binop(EQ_K, lhs.clone(), f.clone()), not_bool(lhs.clone())),
        (binop(EQ_K, t.clone(), rhs.clone()), rhs.clone()),
        (binop(EQ_K, f.clone(), rhs.clone()), not_bool(rhs.clone())),
        (not_bool(f.clone()), t.clone()),
        (not_bool(t.clone()), f.clone()),
        (not_bool(not_bool(lhs.clone())), lhs.clone()),
        (
            not_bool(binop(EQ_K, lhs.clone(), rhs.clone())),
            binop(NEQ_K, lhs.clone(), rhs.clone()),
        ),
        (
            not_bool(binop(NEQ_K, lhs.clone(), rhs.clone())),
            binop(EQ_K, lhs.clone(), rhs.clone()),
        ),
        (
            not_bool(binop(EQ_INT, lhs.clone(), rhs.clone())),
            binop(NEQ_INT, lhs.clone(), rhs.clone()),
        ),
        (
            not_bool(binop(NEQ_INT, lhs.clone(), rhs.clone())),
            binop(EQ_INT, lhs.clone(), rhs.clone()),
        ),
        (binop(BOOL_AND, t.clone(), rhs.clone()), rhs.clone()),
        (binop(BOOL_AND, lhs.clone(), t.clone()), lhs.clone()),
        (binop(BOOL_AND, f.clone(), rhs.clone()), f.clone()),
        (binop(BOOL_AND, lhs.clone(), f.clone()), f.clone()),
        (binop(BOOL_OR, f.clone(), rhs.clone()), rhs.clone()),
        (binop(BOOL_OR, lhs.clone(), f.clone()), lhs.clone()),
        (binop(BOOL_OR, t.clone(), rhs.clone()), t.clone()),
        (binop(BOOL_OR, lhs.clone(), t.clone()), t.clone()),
    ]
}
