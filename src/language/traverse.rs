//! Iterative term traversals.
//!
//! Both rebuilding traversals run on an explicit work stack rather than the
//! call stack, so arbitrarily deep configurations cannot overflow it. The
//! same frame machinery serves [`bottom_up`] and [`top_down`]; the only
//! difference is whether the transformer runs before or after a node's
//! children have been rebuilt.

use super::label::Label;
use super::term::Term;

enum Frame {
    Visit(Term),
    Apply { label: Label, arity: usize },
    Alias,
    Rewrite,
    Sequence { arity: usize },
}

/// Rebuilds `term` by transforming every subterm first and then the node
/// built from the transformed children.
pub fn bottom_up<F: FnMut(Term) -> Term>(f: &mut F, term: Term) -> Term {
    transform(f, term, true)
}

/// Transforms a node first, then recurses into the children of whatever the
/// transformer returned.
pub fn top_down<F: FnMut(Term) -> Term>(f: &mut F, term: Term) -> Term {
    transform(f, term, false)
}

fn transform<F: FnMut(Term) -> Term>(f: &mut F, term: Term, after_children: bool) -> Term {
    let mut work = vec![Frame::Visit(term)];
    let mut done: Vec<Term> = Vec::new();
    while let Some(frame) = work.pop() {
        match frame {
            Frame::Visit(term) => {
                let term = if after_children { term } else { f(term) };
                match term {
                    Term::Apply { label, args } => {
                        work.push(Frame::Apply {
                            label,
                            arity: args.len(),
                        });
                        work.extend(args.into_iter().rev().map(Frame::Visit));
                    }
                    Term::As { pattern, alias } => {
                        work.push(Frame::Alias);
                        work.push(Frame::Visit(*alias));
                        work.push(Frame::Visit(*pattern));
                    }
                    Term::Rewrite { lhs, rhs } => {
                        work.push(Frame::Rewrite);
                        work.push(Frame::Visit(*rhs));
                        work.push(Frame::Visit(*lhs));
                    }
                    Term::Sequence { items } => {
                        work.push(Frame::Sequence { arity: items.len() });
                        work.extend(items.into_iter().rev().map(Frame::Visit));
                    }
                    leaf => done.push(if after_children { f(leaf) } else { leaf }),
                }
            }
            frame => {
                let rebuilt = rebuild(frame, &mut done);
                done.push(if after_children { f(rebuilt) } else { rebuilt });
            }
        }
    }
    done.pop().expect("traversal left no result on the stack")
}

fn rebuild(frame: Frame, done: &mut Vec<Term>) -> Term {
    match frame {
        Frame::Visit(_) => unreachable!("visit frames are handled by the traversal loop"),
        Frame::Apply { label, arity } => {
            let args = done.split_off(done.len() - arity);
            Term::Apply { label, args }
        }
        Frame::Alias => {
            let alias = done.pop().expect("alias rebuild needs two children");
            let pattern = done.pop().expect("alias rebuild needs two children");
            Term::alias(pattern, alias)
        }
        Frame::Rewrite => {
            let rhs = done.pop().expect("rewrite rebuild needs two children");
            let lhs = done.pop().expect("rewrite rebuild needs two children");
            Term::rewrite(lhs, rhs)
        }
        Frame::Sequence { arity } => Term::sequence(done.split_off(done.len() - arity)),
    }
}

/// Pre-order visit without rebuilding, for read-only analyses.
pub fn collect<'a, F: FnMut(&'a Term)>(f: &mut F, term: &'a Term) {
    let mut work = vec![term];
    while let Some(term) = work.pop() {
        f(term);
        let mut children = term.children();
        children.reverse();
        work.extend(children);
    }
}

/// Repeatedly un-nests applications of `label` into a flat argument list.
pub fn flatten_label(label: &str, term: Term) -> Vec<Term> {
    let mut todo = vec![term];
    let mut flat = Vec::new();
    while let Some(term) = todo.pop() {
        match term {
            Term::Apply {
                label: found,
                args,
            } if found.name == label => todo.extend(args.into_iter().rev()),
            other => flat.push(other),
        }
    }
    flat
}

/// Re-nests `terms` into a right-associated chain of `label`, skipping any
/// element structurally equal to `unit`. An empty (post-filter) list yields
/// the unit itself.
pub fn build_assoc(unit: &Term, label: &Label, terms: impl IntoIterator<Item = Term>) -> Term {
    let terms: Vec<Term> = terms.into_iter().collect();
    let mut result: Option<Term> = None;
    for term in terms.into_iter().rev() {
        if term == *unit {
            continue;
        }
        result = Some(match result {
            None => term,
            Some(rest) => Term::apply(label.clone(), vec![term, rest]),
        });
    }
    result.unwrap_or_else(|| unit.clone())
}
