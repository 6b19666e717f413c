//! The language layer: sorts, labels, terms, traversals, and the
//! definition-level symbol table the rewriting layer consults for sort and
//! function-ness information.

pub mod dict;
pub mod label;
pub mod prelude;
pub mod sort;
pub mod term;
pub mod traverse;

use label::Label;
use sort::Sort;
use term::Term;

/// One declared symbol of a definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolDecl {
    pub label: String,
    pub sort: Sort,
    pub function: bool,
}

/// A declaration-level view of a definition's symbols.
///
/// Built once and passed by reference into the components that need it
/// (anti-unification, rule synthesis); never mutated afterwards.
#[derive(Clone, Debug, Default)]
pub struct Definition {
    symbols: Vec<SymbolDecl>,
}

impl Definition {
    pub fn declare(mut self, label: &str, sort: Sort) -> Self {
        self.symbols.push(SymbolDecl {
            label: String::from(label),
            sort,
            function: false,
        });
        self
    }

    pub fn declare_function(mut self, label: &str, sort: Sort) -> Self {
        self.symbols.push(SymbolDecl {
            label: String::from(label),
            sort,
            function: true,
        });
        self
    }

    pub fn lookup(&self, label: &str) -> Option<&SymbolDecl> {
        self.symbols.iter().find(|decl| decl.label == label)
    }

    pub fn is_function(&self, label: &Label) -> bool {
        self.lookup(&label.name).is_some_and(|decl| decl.function)
    }

    /// The sort of a term, where one is known.
    pub fn sort_of(&self, term: &Term) -> Option<Sort> {
        match term {
            Term::Token { sort, .. } => Some(sort.clone()),
            Term::Variable { sort, .. } => sort.clone(),
            Term::Apply { label, .. } => self.lookup(&label.name).map(|decl| decl.sort.clone()),
            Term::As { pattern, .. } => self.sort_of(pattern),
            Term::Rewrite { lhs, rhs } => {
                let lhs = self.sort_of(lhs)?;
                let rhs = self.sort_of(rhs)?;
                (lhs == rhs).then_some(lhs)
            }
            Term::Sequence { .. } => Some(prelude::k_sort()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defn() -> Definition {
        Definition::default()
            .declare("<k>", Sort::new("KCell"))
            .declare_function("size", Sort::new("Int"))
    }

    #[test]
    fn lookup_and_function_test() {
        let defn = defn();
        assert_eq!(defn.lookup("<k>").unwrap().sort, Sort::new("KCell"));
        assert!(defn.lookup("missing").is_none());
        assert!(defn.is_function(&Label::new("size")));
        assert!(!defn.is_function(&Label::new("<k>")));
        assert!(!defn.is_function(&Label::new("missing")));
    }

    #[test]
    fn sort_of_terms() {
        let defn = defn();
        assert_eq!(
            defn.sort_of(&Term::token("1", Sort::new("Int"))),
            Some(Sort::new("Int"))
        );
        assert_eq!(defn.sort_of(&Term::var("X")), None);
        assert_eq!(
            defn.sort_of(&Term::sorted_var("X", Sort::new("Bool"))),
            Some(Sort::new("Bool"))
        );
        let size = Term::apply(Label::new("size"), vec![Term::var("X")]);
        assert_eq!(defn.sort_of(&size), Some(Sort::new("Int")));
        let rewrite = Term::rewrite(size.clone(), Term::token("0", Sort::new("Int")));
        assert_eq!(defn.sort_of(&rewrite), Some(Sort::new("Int")));
    }
}
