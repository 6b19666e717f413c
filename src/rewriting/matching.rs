//! Structural pattern matching producing substitutions.
//!
//! Matching never raises: a failed match is an expected outcome and comes
//! back as `None`. Repeated bindings of the same variable are reconciled
//! through [`Subst::union`], so `(f X X)` refuses to match `(f a b)`.

use itertools::Itertools;

use crate::language::term::Term;

use super::subst::Subst;

impl Term {
    /// `self` is treated as a pattern which may match `term`.
    pub fn try_match(&self, term: &Term) -> Option<Subst> {
        match (self, term) {
            (Term::Variable { name, .. }, _) => {
                Some(Subst::singleton(name.clone(), term.clone()))
            }
            (
                Term::Token {
                    token: pattern,
                    sort: pattern_sort,
                },
                Term::Token { token, sort },
            ) => (pattern == token && pattern_sort == sort).then(Subst::new),
            (
                Term::Apply {
                    label: pattern_label,
                    args: pattern_args,
                },
                Term::Apply { label, args },
            ) => {
                if pattern_label != label || pattern_args.len() != args.len() {
                    return None;
                }
                combine_matches(
                    pattern_args
                        .iter()
                        .zip_eq(args)
                        .map(|(pattern, term)| pattern.try_match(term)),
                )
            }
            (
                Term::Rewrite {
                    lhs: pattern_lhs,
                    rhs: pattern_rhs,
                },
                Term::Rewrite { lhs, rhs },
            ) => pattern_lhs.try_match(lhs)?.union(&pattern_rhs.try_match(rhs)?),
            (Term::Sequence { items: pattern }, Term::Sequence { items }) => {
                match_sequence(pattern, items)
            }
            _ => None,
        }
    }
}

/// Folds per-child match results into one substitution, failing if any
/// child failed or any union conflicts.
pub fn combine_matches(matches: impl IntoIterator<Item = Option<Subst>>) -> Option<Subst> {
    matches
        .into_iter()
        .try_fold(Subst::new(), |combined, m| combined.union(&m?))
}

fn match_sequence(pattern: &[Term], items: &[Term]) -> Option<Subst> {
    if pattern.len() == items.len() {
        return combine_matches(
            pattern
                .iter()
                .zip_eq(items)
                .map(|(pattern, term)| pattern.try_match(term)),
        );
    }
    // A shorter pattern whose last item is a variable captures the remaining
    // tail as a sub-sequence. The tail variable must not occur elsewhere in
    // the pattern; a reused name would make the binding ambiguous.
    if pattern.is_empty() || pattern.len() > items.len() {
        return None;
    }
    let (tail, head) = pattern.split_last()?;
    let Term::Variable { name, .. } = tail else {
        return None;
    };
    if head.iter().any(|item| item.free_vars().contains(name)) {
        return None;
    }
    let (prefix, rest) = items.split_at(head.len());
    let head_match = combine_matches(
        head.iter()
            .zip_eq(prefix)
            .map(|(pattern, term)| pattern.try_match(term)),
    )?;
    head_match.union(&Subst::singleton(
        name.clone(),
        Term::sequence(rest.to_vec()),
    ))
}
