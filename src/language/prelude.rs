//! Built-in sorts and labels: the matching-logic connectives and the
//! boolean-sort operations the constraint normalizer targets.
//!
//! Connective labels carry their sort parameters, but flattening and
//! connective dispatch go by label name alone.

use super::label::Label;
use super::sort::Sort;
use super::term::Term;
use super::traverse::build_assoc;

pub const ML_TOP: &str = "#Top";
pub const ML_BOTTOM: &str = "#Bottom";
pub const ML_NOT: &str = "#Not";
pub const ML_AND: &str = "#And";
pub const ML_OR: &str = "#Or";
pub const ML_IMPLIES: &str = "#Implies";
pub const ML_EQUALS: &str = "#Equals";
pub const ML_CEIL: &str = "#Ceil";
pub const ML_EXISTS: &str = "#Exists";

pub const BOOL_AND: &str = "_andBool_";
pub const BOOL_OR: &str = "_orBool_";
pub const BOOL_NOT: &str = "notBool_";
pub const BOOL_IMPLIES: &str = "_impliesBool_";
pub const EQ_K: &str = "_==K_";
pub const NEQ_K: &str = "_=/=K_";
pub const EQ_INT: &str = "_==Int_";
pub const NEQ_INT: &str = "_=/=Int_";

pub fn k_sort() -> Sort {
    Sort::new("K")
}

pub fn bool_sort() -> Sort {
    Sort::new("Bool")
}

pub fn int_sort() -> Sort {
    Sort::new("Int")
}

pub fn top_cell_sort() -> Sort {
    Sort::new("GeneratedTopCell")
}

fn connective(name: &str) -> Label {
    Label::parametric(name, vec![top_cell_sort()])
}

pub fn ml_top() -> Term {
    Term::apply(connective(ML_TOP), vec![])
}

pub fn ml_bottom() -> Term {
    Term::apply(connective(ML_BOTTOM), vec![])
}

pub fn ml_not(term: Term) -> Term {
    Term::apply(connective(ML_NOT), vec![term])
}

/// Right-associated conjunction with `#Top` as the unit.
pub fn ml_and(terms: Vec<Term>) -> Term {
    build_assoc(&ml_top(), &connective(ML_AND), terms)
}

/// Right-associated disjunction with `#Bottom` as the unit.
pub fn ml_or(terms: Vec<Term>) -> Term {
    build_assoc(&ml_bottom(), &connective(ML_OR), terms)
}

pub fn ml_implies(lhs: Term, rhs: Term) -> Term {
    Term::apply(connective(ML_IMPLIES), vec![lhs, rhs])
}

pub fn ml_equals(lhs: Term, rhs: Term, arg_sort: Sort) -> Term {
    Term::apply(
        Label::parametric(ML_EQUALS, vec![arg_sort, top_cell_sort()]),
        vec![lhs, rhs],
    )
}

pub fn ml_equals_true(term: Term) -> Term {
    ml_equals(bool_token(true), term, bool_sort())
}

pub fn ml_ceil(term: Term) -> Term {
    Term::apply(
        Label::parametric(ML_CEIL, vec![k_sort(), top_cell_sort()]),
        vec![term],
    )
}

pub fn ml_exists(var: Term, body: Term) -> Term {
    Term::apply(connective(ML_EXISTS), vec![var, body])
}

pub fn bool_token(value: bool) -> Term {
    Term::token(if value { "true" } else { "false" }, bool_sort())
}

pub fn int_token(value: i64) -> Term {
    Term::token(value.to_string(), int_sort())
}

/// Right-associated boolean conjunction with `true` as the unit.
pub fn and_bool(terms: Vec<Term>) -> Term {
    build_assoc(&bool_token(true), &Label::new(BOOL_AND), terms)
}

/// Right-associated boolean disjunction with `false` as the unit.
pub fn or_bool(terms: Vec<Term>) -> Term {
    build_assoc(&bool_token(false), &Label::new(BOOL_OR), terms)
}

pub fn not_bool(term: Term) -> Term {
    Term::apply(Label::new(BOOL_NOT), vec![term])
}

pub fn implies_bool(lhs: Term, rhs: Term) -> Term {
    Term::apply(Label::new(BOOL_IMPLIES), vec![lhs, rhs])
}

pub fn eq_k(lhs: Term, rhs: Term) -> Term {
    Term::apply(Label::new(EQ_K), vec![lhs, rhs])
}

pub fn neq_k(lhs: Term, rhs: Term) -> Term {
    Term::apply(Label::new(NEQ_K), vec![lhs, rhs])
}

pub fn eq_int(lhs: Term, rhs: Term) -> Term {
    Term::apply(Label::new(EQ_INT), vec![lhs, rhs])
}

pub fn neq_int(lhs: Term, rhs: Term) -> Term {
    Term::apply(Label::new(NEQ_INT), vec![lhs, rhs])
}

/// Whether `term` is the top sentinel; weakly, any `#Top` application
/// regardless of its sort parameters.
pub fn is_top(term: &Term, weak: bool) -> bool {
    if *term == ml_top() {
        return true;
    }
    weak && matches!(term, Term::Apply { label, .. } if label.name == ML_TOP)
}

/// Whether `term` is the bottom sentinel; weakly, any `#Bottom` application.
pub fn is_bottom(term: &Term, weak: bool) -> bool {
    if *term == ml_bottom() {
        return true;
    }
    weak && matches!(term, Term::Apply { label, .. } if label.name == ML_BOTTOM)
}
