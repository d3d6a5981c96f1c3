use crate::environment::Environment;
use crate::error::Error;
use crate::expression::Expression;
use crate::session::{Session, SessionConfig};
use crate::syntax::parse;
use crate::world::World;

pub fn expr(text: &str) -> Expression {
    match parse(text) {
        Ok(e) => e,
        Err(e) => panic!("could not parse '{}': {}", text, e),
    }
}

/// A root world holding one fact per line of the text.
pub fn world_of(text: &str) -> World {
    let mut world = World::new();
    for line in text.lines() {
        let line = line.trim();
        if !line.is_empty() {
            world.assert(expr(line));
        }
    }
    world
}

/// Evaluates the text against an empty environment, expecting no errors.
pub fn evaluate(world: &World, text: &str) -> Vec<String> {
    let mut answer = vec![];
    for result in expr(text).evaluate(&Environment::new(), world) {
        match result {
            Ok(value) => answer.push(value.to_string()),
            Err(e) => panic!("evaluating '{}' failed: {}", text, e),
        }
    }
    answer
}

/// Evaluates the text, expecting it to fail somewhere along the sequence.
pub fn evaluate_error(world: &World, text: &str) -> Error {
    for result in expr(text).evaluate(&Environment::new(), world) {
        if let Err(e) = result {
            return e;
        }
    }
    panic!("expected '{}' to fail", text);
}

/// Runs a session script from a fresh session, returning everything it printed.
pub fn run_script(script: &str) -> Vec<String> {
    Session::new(SessionConfig::default()).run_script(script)
}
