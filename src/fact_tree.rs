// FactTree: a discrimination trie over fact spines.
//
// A fact `rel a b` is stored along the path rel -> a, with a leaf for `b` at the end.
// Queries walk the same path with a pattern spine, but a pattern element can be a
// reference or wildcard, so every branch key at a position gets tried, not just one.

use std::iter;
use std::rc::Rc;

use im::{OrdMap, Vector};
use tracing::trace;

use crate::environment::Environment;
use crate::expression::Expression;

/// A stored fact, along with the final element of its spine.
#[derive(Clone, Debug)]
pub struct Fact {
    pub expression: Expression,
    last: Expression,
}

/// A fact whose spine unifies with a query pattern, with the bindings found on the way.
#[derive(Clone, Debug)]
pub struct Match {
    pub fact: Expression,
    pub bindings: Environment,
}

/// A lazy sequence of matches.
pub type Matches = Box<dyn Iterator<Item = Match>>;

#[derive(Clone, Debug, Default)]
pub struct FactTree {
    /// Maps the spine element at this position to the subtree for the next position.
    branches: OrdMap<Expression, FactTree>,

    /// Facts whose spine ends at this node.
    leaves: Vector<Fact>,
}

impl FactTree {
    pub fn new() -> FactTree {
        FactTree::default()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.branches.is_empty()
    }

    /// The number of facts stored.
    pub fn len(&self) -> usize {
        self.leaves.len() + self.branches.values().map(|t| t.len()).sum::<usize>()
    }

    pub fn insert(&mut self, expression: Expression) {
        let spine = expression.spine();
        let Some((last, prefix)) = spine.split_last() else {
            return;
        };
        let mut node = self;
        for key in prefix {
            node = node
                .branches
                .entry(key.clone())
                .or_insert_with(FactTree::new);
        }
        trace!(fact = %expression, depth = prefix.len(), "inserting fact");
        node.leaves.push_back(Fact {
            last: last.clone(),
            expression,
        });
    }

    /// Finds every fact whose spine matches the pattern's spine position by position.
    /// Branches are tried in key order, and the leaves of a node in insertion order.
    pub fn query(&self, pattern: &Expression) -> Matches {
        let spine = Rc::new(pattern.spine());
        matches_at(self.clone(), spine, 0, Environment::new())
    }

    /// Every stored fact, leaves before branches at each node.
    pub fn facts(&self) -> Box<dyn Iterator<Item = Expression>> {
        let leaves = self.leaves.clone().into_iter().map(|fact| fact.expression);
        let branches = self
            .branches
            .clone()
            .into_iter()
            .flat_map(|(_, subtree)| subtree.facts());
        Box::new(leaves.chain(branches))
    }
}

fn matches_at(
    tree: FactTree,
    spine: Rc<Vec<Expression>>,
    position: usize,
    bindings: Environment,
) -> Matches {
    let key = spine[position].clone();
    if position + 1 == spine.len() {
        return Box::new(tree.leaves.into_iter().filter_map(move |fact| {
            let mut bindings = bindings.clone();
            if key.matches(&fact.last, &mut bindings) {
                Some(Match {
                    fact: fact.expression,
                    bindings,
                })
            } else {
                None
            }
        }));
    }

    Box::new(
        tree.branches
            .into_iter()
            .flat_map(move |(branch_key, subtree)| -> Matches {
                let mut bindings = bindings.clone();
                if key.matches(&branch_key, &mut bindings) {
                    matches_at(subtree, spine.clone(), position + 1, bindings)
                } else {
                    Box::new(iter::empty())
                }
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Expression {
        Expression::symbol(name)
    }

    fn rel(args: &[Expression]) -> Expression {
        Expression::apply_all(sym("rel"), args.iter().cloned())
    }

    fn facts_of(matches: Matches) -> Vec<String> {
        matches.map(|m| m.fact.to_string()).collect()
    }

    #[test]
    fn test_query_with_wildcard() {
        let mut tree = FactTree::new();
        tree.insert(rel(&[sym("A"), sym("B")]));
        let found = facts_of(tree.query(&rel(&[sym("A"), Expression::Wildcard])));
        assert_eq!(found, vec!["rel A B"]);
    }

    #[test]
    fn test_query_binds_reference() {
        let mut tree = FactTree::new();
        tree.insert(rel(&[sym("A"), sym("B")]));
        let matches: Vec<Match> = tree
            .query(&rel(&[Expression::reference("X"), sym("B")]))
            .collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].fact, rel(&[sym("A"), sym("B")]));
        assert_eq!(
            matches[0].bindings.lookup("X"),
            Some(&Expression::candidates(vec![sym("A")]))
        );
    }

    #[test]
    fn test_query_misses() {
        let mut tree = FactTree::new();
        tree.insert(rel(&[sym("A"), sym("B")]));
        assert!(tree.query(&rel(&[sym("A"), sym("C")])).next().is_none());
        assert!(tree.query(&rel(&[sym("A")])).next().is_none());
        assert!(tree
            .query(&rel(&[sym("A"), sym("B"), sym("C")]))
            .next()
            .is_none());
    }

    #[test]
    fn test_query_tries_every_branch() {
        let mut tree = FactTree::new();
        tree.insert(rel(&[sym("A"), sym("B")]));
        tree.insert(rel(&[sym("C"), sym("B")]));
        tree.insert(rel(&[sym("C"), sym("D")]));
        tree.insert(Expression::apply_all(sym("other"), vec![sym("A"), sym("B")]));
        let found = facts_of(tree.query(&rel(&[Expression::reference("x"), sym("B")])));
        assert_eq!(found, vec!["rel A B", "rel C B"]);

        // A variable head position reaches every relation.
        let found = facts_of(tree.query(&Expression::apply_all(
            Expression::reference("r"),
            vec![sym("A"), Expression::Wildcard],
        )));
        assert_eq!(found, vec!["other A B", "rel A B"]);
    }

    #[test]
    fn test_repeated_reference_must_agree() {
        let mut tree = FactTree::new();
        tree.insert(rel(&[sym("A"), sym("A")]));
        tree.insert(rel(&[sym("A"), sym("B")]));
        let x = Expression::reference("x");
        let found = facts_of(tree.query(&rel(&[x.clone(), x])));
        assert_eq!(found, vec!["rel A A"]);
    }

    #[test]
    fn test_single_element_spine() {
        let mut tree = FactTree::new();
        tree.insert(sym("sunny"));
        tree.insert(Expression::apply(sym("sunny"), sym("today")));
        assert_eq!(facts_of(tree.query(&sym("sunny"))), vec!["sunny"]);
        assert_eq!(
            facts_of(tree.query(&Expression::reference("anything"))),
            vec!["sunny"]
        );
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_duplicate_facts_are_kept() {
        let mut tree = FactTree::new();
        tree.insert(rel(&[sym("A")]));
        tree.insert(rel(&[sym("A")]));
        assert_eq!(facts_of(tree.query(&rel(&[sym("A")]))).len(), 2);
    }

    #[test]
    fn test_query_is_a_snapshot() {
        let mut tree = FactTree::new();
        tree.insert(rel(&[sym("A")]));
        let before = tree.query(&rel(&[Expression::Wildcard]));
        tree.insert(rel(&[sym("B")]));
        assert_eq!(facts_of(before), vec!["rel A"]);
        assert_eq!(facts_of(tree.query(&rel(&[Expression::Wildcard]))).len(), 2);
    }
}
