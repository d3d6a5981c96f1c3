// Evaluation: every expression reduces to a lazy sequence of alternatives.
//
// Nondeterminism is carried by the sequence itself rather than by backtracking.
// Nothing is evaluated until the consumer pulls, and a consumer that stops pulling
// simply drops the iterator.

use std::collections::{BTreeMap, BTreeSet};
use std::iter;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::environment::{Candidates, Environment};
use crate::error::{Error, Result};
use crate::expression::{Abstraction, Comprehension, Expression, Name, ScopedAssertion};
use crate::world::World;

/// A lazy sequence of evaluation results.
pub type Alternatives = Box<dyn Iterator<Item = Result<Expression>>>;

fn single(value: Expression) -> Alternatives {
    Box::new(iter::once(Ok(value)))
}

fn failure(error: Error) -> Alternatives {
    Box::new(iter::once(Err(error)))
}

// Runs `f` on the first pull, then yields whatever sequence it produced.
fn deferred<F>(f: F) -> Alternatives
where
    F: FnOnce() -> Result<Alternatives> + 'static,
{
    Box::new(
        iter::once_with(f).flat_map(|result| -> Alternatives {
            match result {
                Ok(alternatives) => alternatives,
                Err(e) => failure(e),
            }
        }),
    )
}

impl Expression {
    /// Evaluates this expression against an environment and a world.
    pub fn evaluate(&self, env: &Environment, world: &World) -> Alternatives {
        match self {
            Expression::Symbol(_) | Expression::Wildcard | Expression::FreshValue(_) => {
                single(self.clone())
            }
            Expression::FreshValueGenerator => {
                Box::new(iter::once_with(|| Ok(Expression::fresh_value())))
            }
            Expression::Reference(name) => match env.lookup(name) {
                Some(candidates) => Box::new(candidates.clone().into_iter().map(Ok)),
                None => single(self.clone()),
            },
            Expression::Abstraction(_) => {
                if self.captures(env) {
                    // Close over the captured values.
                    Box::new(self.substitute(env).map(Ok))
                } else {
                    single(self.clone())
                }
            }
            Expression::Application(function, argument) => evaluate_application(
                function.clone(),
                argument.clone(),
                env.clone(),
                world.clone(),
            ),
            Expression::Comprehension(comprehension) => {
                evaluate_comprehension(comprehension.clone(), env.clone(), world.clone())
            }
            Expression::ScopedAssertion(scoped) => {
                evaluate_scoped_assertion(scoped.clone(), env.clone(), world.clone())
            }
        }
    }
}

/// The argument is evaluated first, and all of its alternatives are gathered before the
/// function position is evaluated.
fn evaluate_application(
    function: Rc<Expression>,
    argument: Rc<Expression>,
    env: Environment,
    world: World,
) -> Alternatives {
    deferred(move || {
        let arguments: Candidates = argument.evaluate(&env, &world).collect::<Result<_>>()?;
        trace!(arguments = arguments.len(), function = %function, "applying");
        let functions = function.evaluate(&env, &world);
        Ok(Box::new(functions.flat_map(move |value| -> Alternatives {
            match value {
                Err(e) => failure(e),
                Ok(Expression::Abstraction(abstraction)) => {
                    apply_abstraction(&abstraction, &arguments, &env, &world)
                }
                // A stuck application, like the head of a fact.
                Ok(value) => Box::new(
                    arguments
                        .clone()
                        .into_iter()
                        .map(move |a| Ok(Expression::apply(value.clone(), a))),
                ),
            }
        })))
    })
}

/// The parameter is bound to the whole argument set at once, so the body sees every
/// alternative as one disjunctive binding.
fn apply_abstraction(
    abstraction: &Abstraction,
    arguments: &Candidates,
    env: &Environment,
    world: &World,
) -> Alternatives {
    let mut scope = env.scope();
    let accepted = match &abstraction.pattern {
        None => arguments.clone(),
        Some(pattern) => {
            let mut accepted = Candidates::new();
            let mut pattern_bindings: BTreeMap<Name, Candidates> = BTreeMap::new();
            for argument in arguments {
                let mut bindings = Environment::new();
                if !pattern.matches(argument, &mut bindings) {
                    continue;
                }
                accepted.insert(argument.clone());
                for (name, values) in bindings.flatten() {
                    let entry = pattern_bindings.entry(name).or_default();
                    *entry = std::mem::take(entry).union(values);
                }
            }
            if accepted.is_empty() {
                return failure(Error::PatternFailure {
                    pattern: pattern.clone(),
                    arguments: arguments.clone(),
                });
            }
            for (name, values) in pattern_bindings {
                scope.bind(name, values);
            }
            accepted
        }
    };
    scope.bind(abstraction.param.clone(), accepted);
    abstraction.body.evaluate(&scope, world)
}

/// Gathers, for every free name of the constraint, all the values it takes across every
/// constraint alternative and every matching fact. Only then is the body evaluated.
fn evaluate_comprehension(
    comprehension: Rc<Comprehension>,
    env: Environment,
    world: World,
) -> Alternatives {
    deferred(move || {
        // Names the environment already binds are substituted by the constraint's own evaluation.
        let interest: BTreeSet<Name> = comprehension
            .constraint
            .free_names()
            .into_iter()
            .filter(|name| !env.contains(name))
            .collect();
        let mut harvested: BTreeMap<Name, Candidates> = interest
            .iter()
            .map(|name| (name.clone(), Candidates::new()))
            .collect();

        let mut num_matches = 0;
        for constraint in comprehension.constraint.evaluate(&env, &world) {
            let constraint = constraint?;
            for found in world.query(&constraint) {
                num_matches += 1;
                trace!(constraint = %constraint, fact = %found.fact, "matched");
                for (name, values) in found.bindings.flatten() {
                    if let Some(candidates) = harvested.get_mut(&name) {
                        *candidates = std::mem::take(candidates).union(values);
                    }
                }
            }
        }

        if num_matches == 0 {
            return Err(Error::NoCandidates {
                constraint: comprehension.constraint.clone(),
            });
        }
        if let Some((name, _)) = harvested.iter().find(|(_, values)| values.is_empty()) {
            return Err(Error::ArgumentMismatch {
                name: name.clone(),
                constraint: comprehension.constraint.clone(),
            });
        }
        debug!(
            constraint = %comprehension.constraint,
            matches = num_matches,
            names = interest.len(),
            "comprehension harvested"
        );

        let mut scope = env.scope();
        for (name, values) in harvested {
            scope.bind(name, values);
        }
        Ok(comprehension.body.evaluate(&scope, &world))
    })
}

/// Every alternative of the assertion goes into a single new layer over the world.
fn evaluate_scoped_assertion(
    scoped: Rc<ScopedAssertion>,
    env: Environment,
    world: World,
) -> Alternatives {
    deferred(move || {
        let mut hypothetical = world.scoped();
        for fact in scoped.assertion.evaluate(&env, &world) {
            hypothetical.assert(fact?);
        }
        Ok(scoped.body.evaluate(&env, &hypothetical))
    })
}
