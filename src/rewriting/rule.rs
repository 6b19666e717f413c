//! Synthesis of rewrite rules and claims from pairs of symbolic states.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::KastError;
use crate::language::Definition;
use crate::language::prelude;
use crate::language::term::{EXISTENTIAL_PREFIX, Term, UNUSED_PREFIX};
use crate::language::traverse::bottom_up;

use super::anti_unify::{abstract_term_safely, push_down_rewrites};
use super::boolean::{ml_pred_to_bool, normalize_ml_pred};
use super::subst::Subst;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub id: String,
    pub body: Term,
    pub requires: Term,
    pub ensures: Term,
    pub priority: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub body: Term,
    pub requires: Term,
    pub ensures: Term,
}

/// Replaces every function-symbol application with a fresh sorted variable
/// plus a defining equality; function applications are not legal
/// rule-pattern positions.
pub fn defunctionalize(defn: &Definition, term: Term) -> (Term, Vec<Term>) {
    let mut constraints = Vec::new();
    let defunctionalized = bottom_up(
        &mut |term| {
            if let Term::Apply { label, .. } = &term
                && defn.is_function(label)
            {
                let sort = defn.sort_of(&term);
                let var = abstract_term_safely(&term, "F", sort.clone());
                constraints.push(prelude::ml_equals(
                    var.clone(),
                    term,
                    sort.unwrap_or_else(prelude::k_sort),
                ));
                return var;
            }
            term
        },
        term,
    );
    (defunctionalized, constraints)
}

/// Synthesizes a rewrite rule from initial and final symbolic states,
/// returning it together with the substitution that translates the rule's
/// canonical variable names back to the caller's.
#[allow(clippy::too_many_arguments)]
pub fn build_rule(
    rule_id: &str,
    init_config: Term,
    final_config: Term,
    init_constraints: &[Term],
    final_constraints: &[Term],
    priority: Option<u32>,
    keep_vars: &[String],
    defn: Option<&Definition>,
) -> Result<(RewriteRule, Subst), KastError> {
    let (body, requires, ensures, unrename) = synthesize(
        init_config,
        final_config,
        init_constraints,
        final_constraints,
        keep_vars,
        defn,
    )?;
    debug!("built rule {rule_id}");
    let rule = RewriteRule {
        id: String::from(rule_id),
        body,
        requires,
        ensures,
        priority,
    };
    Ok((rule, unrename))
}

/// The same pipeline as [`build_rule`], producing a claim.
pub fn build_claim(
    claim_id: &str,
    init_config: Term,
    final_config: Term,
    init_constraints: &[Term],
    final_constraints: &[Term],
    keep_vars: &[String],
    defn: Option<&Definition>,
) -> Result<(Claim, Subst), KastError> {
    let (body, requires, ensures, unrename) = synthesize(
        init_config,
        final_config,
        init_constraints,
        final_constraints,
        keep_vars,
        defn,
    )?;
    debug!("built claim {claim_id}");
    let claim = Claim {
        id: String::from(claim_id),
        body,
        requires,
        ensures,
    };
    Ok((claim, unrename))
}

fn synthesize(
    init_config: Term,
    final_config: Term,
    init_constraints: &[Term],
    final_constraints: &[Term],
    keep_vars: &[String],
    defn: Option<&Definition>,
) -> Result<(Term, Term, Term, Subst), KastError> {
    let mut init_constraints = init_constraints
        .iter()
        .map(normalize_ml_pred)
        .collect::<Result<Vec<_>, _>>()?;
    let final_constraints: Vec<Term> = final_constraints
        .iter()
        .map(normalize_ml_pred)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|constraint| !init_constraints.contains(constraint))
        .collect();

    let init_config = match defn {
        Some(defn) => {
            let (config, defining) = defunctionalize(defn, init_config);
            init_constraints.extend(defining);
            config
        }
        None => init_config,
    };

    let init_vars = side_vars(&init_config, &init_constraints);
    let final_vars = side_vars(&final_config, &final_constraints);
    let occurrences = prelude::ml_and(
        std::iter::once(push_down_rewrites(Term::rewrite(
            init_config.clone(),
            final_config.clone(),
        )))
        .chain(init_constraints.iter().cloned())
        .chain(final_constraints.iter().cloned())
        .collect(),
    )
    .count_vars();

    let mut rename = Subst::new();
    let mut unrename = Subst::new();
    for (var, count) in &occurrences {
        let mut new_name = var.clone();
        if *count == 1 && !keep_vars.contains(var) {
            new_name = format!("{UNUSED_PREFIX}{new_name}");
        }
        if final_vars.contains(var) && !init_vars.contains(var) {
            new_name = format!("{EXISTENTIAL_PREFIX}{new_name}");
        }
        if new_name != *var {
            rename.insert(var.clone(), Term::var(new_name.clone()));
            unrename.insert(new_name, Term::var(var.clone()));
        }
    }

    let init_config = rename.apply(init_config);
    let init_constraints: Vec<Term> = init_constraints
        .into_iter()
        .map(|constraint| rename.apply(constraint))
        .collect();
    let (final_config, final_constraints) = apply_existential_substitutions(
        rename.apply(final_config),
        final_constraints
            .into_iter()
            .map(|constraint| rename.apply(constraint))
            .collect(),
    );

    let body = push_down_rewrites(Term::rewrite(init_config, final_config));
    let requires = ml_pred_to_bool(&prelude::ml_and(init_constraints), false)?;
    let ensures = ml_pred_to_bool(&prelude::ml_and(final_constraints), false)?;
    Ok((body, requires, ensures, unrename))
}

fn side_vars(config: &Term, constraints: &[Term]) -> Vec<String> {
    let mut vars = config.free_vars();
    for constraint in constraints {
        for var in constraint.free_vars() {
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
    }
    vars
}

/// Inlines final-side equalities that define an existential variable into
/// the final state, instead of leaving them behind as `ensures` clauses.
fn apply_existential_substitutions(state: Term, constraints: Vec<Term>) -> (Term, Vec<Term>) {
    let pattern = prelude::ml_equals_true(prelude::eq_k(Term::var("#VAR"), Term::var("#VAL")));
    let mut subst = Subst::new();
    let mut rest = Vec::new();
    for constraint in constraints {
        if let Some(matched) = pattern.try_match(&constraint)
            && let Some(Term::Variable { name, .. }) = matched.get("#VAR")
            && name.starts_with(EXISTENTIAL_PREFIX)
        {
            let value = matched
                .get("#VAL")
                .expect("pattern binds both operands")
                .clone();
            subst.insert(name.clone(), value);
        } else {
            rest.push(constraint);
        }
    }
    (
        subst.apply(state),
        rest.into_iter()
            .map(|constraint| subst.apply(constraint))
            .collect(),
    )
}
