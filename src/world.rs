use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::expression::Expression;
use crate::fact_tree::{FactTree, Matches};

#[derive(Clone, Debug)]
struct Layer {
    facts: FactTree,

    // None for the root world.
    parent: Option<World>,
}

/// The world is the store of asserted facts.
///
/// A world is either a root, or a scoped layer over an enclosing world. A scoped layer holds
/// only the facts asserted into it, and the enclosing worlds never see them.
/// Worlds are cheap to clone. Asserting into a clone leaves the original unchanged, and a
/// query that is already running keeps seeing the facts that existed when it started.
#[derive(Clone, Debug)]
pub struct World {
    layer: Rc<Layer>,
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}

impl World {
    pub fn new() -> World {
        World {
            layer: Rc::new(Layer {
                facts: FactTree::new(),
                parent: None,
            }),
        }
    }

    /// A new, empty layer on top of this world.
    pub fn scoped(&self) -> World {
        World {
            layer: Rc::new(Layer {
                facts: FactTree::new(),
                parent: Some(self.clone()),
            }),
        }
    }

    /// How many scoped layers sit above the root.
    pub fn depth(&self) -> usize {
        match &self.layer.parent {
            Some(parent) => 1 + parent.depth(),
            None => 0,
        }
    }

    /// Adds a fact to this layer.
    pub fn assert(&mut self, fact: Expression) {
        debug!(fact = %fact, depth = self.depth(), "asserting");
        Rc::make_mut(&mut self.layer).facts.insert(fact);
    }

    /// Matches from this layer first, then from each enclosing layer outward.
    /// A fact asserted in several layers is found once per layer.
    pub fn query(&self, pattern: &Expression) -> Matches {
        debug!(pattern = %pattern, depth = self.depth(), "querying");
        let own = self.layer.facts.query(pattern);
        match &self.layer.parent {
            Some(parent) => Box::new(own.chain(parent.query(pattern))),
            None => own,
        }
    }

    /// The number of facts across every layer.
    pub fn len(&self) -> usize {
        let own = self.layer.facts.len();
        match &self.layer.parent {
            Some(parent) => own + parent.len(),
            None => own,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every fact, innermost layer first.
    pub fn facts(&self) -> Box<dyn Iterator<Item = Expression>> {
        let own = self.layer.facts.facts();
        match &self.layer.parent {
            Some(parent) => Box::new(own.chain(parent.facts())),
            None => own,
        }
    }
}

impl fmt::Display for World {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for fact in self.facts() {
            writeln!(f, "{}", fact)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Expression {
        Expression::symbol(name)
    }

    fn rel(a: &str, b: &str) -> Expression {
        Expression::apply_all(sym("rel"), vec![sym(a), sym(b)])
    }

    fn found(world: &World, pattern: &Expression) -> Vec<String> {
        world.query(pattern).map(|m| m.fact.to_string()).collect()
    }

    #[test]
    fn test_scoped_world_does_not_leak() {
        let mut root = World::new();
        root.assert(rel("A", "B"));
        let mut scoped = root.scoped();
        scoped.assert(rel("A", "D"));

        assert_eq!(found(&scoped, &rel("A", "D")), vec!["rel A D"]);
        assert!(found(&root, &rel("A", "D")).is_empty());
        assert_eq!(root.len(), 1);
        assert_eq!(scoped.len(), 2);
    }

    #[test]
    fn test_inner_layers_come_first() {
        let mut root = World::new();
        root.assert(rel("A", "root"));
        let mut middle = root.scoped();
        middle.assert(rel("A", "middle"));
        let mut inner = middle.scoped();
        inner.assert(rel("A", "inner"));

        let pattern = Expression::apply_all(sym("rel"), vec![sym("A"), Expression::Wildcard]);
        assert_eq!(
            found(&inner, &pattern),
            vec!["rel A inner", "rel A middle", "rel A root"]
        );
        assert_eq!(inner.depth(), 2);
    }

    #[test]
    fn test_duplicates_across_layers() {
        let mut root = World::new();
        root.assert(rel("A", "B"));
        let mut scoped = root.scoped();
        scoped.assert(rel("A", "B"));
        assert_eq!(found(&scoped, &rel("A", "B")).len(), 2);
    }

    #[test]
    fn test_assert_on_clone_is_independent() {
        let root = World::new();
        let mut copy = root.clone();
        copy.assert(rel("A", "B"));
        assert!(root.is_empty());
        assert_eq!(copy.len(), 1);
    }
}
