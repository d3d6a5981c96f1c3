use std::fs;
use std::path::Path;
use std::{fmt, io};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::environment::{Candidates, Environment};
use crate::evaluator::Alternatives;
use crate::expression::{Expression, Name};
use crate::syntax::{self, Parser};
use crate::world::World;
use crate::error;

/// Configuration options for a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    // How many alternatives we pull from any one evaluation.
    // Evaluations may produce unbounded sequences, so this is the only thing stopping them.
    pub max_results: usize,

    // Printed before each line in the interactive loop.
    pub prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_results: 32,
            prompt: "> ".to_string(),
        }
    }
}

impl SessionConfig {
    /// Loads a configuration from a JSON file. Missing fields take their default values.
    pub fn load(path: &Path) -> Result<SessionConfig, Error> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Errors reported by a session. None of them changes the session's state.
#[derive(Debug)]
pub enum Error {
    Syntax(syntax::Error),
    Evaluation(error::Error),

    // An evaluation that had to produce something, but produced nothing.
    NoResults(String),

    // A malformed session command.
    Command(String),

    Config(String),
    Io(io::Error),
}

impl From<syntax::Error> for Error {
    fn from(error: syntax::Error) -> Self {
        Error::Syntax(error)
    }
}

impl From<error::Error> for Error {
    fn from(error: error::Error) -> Self {
        Error::Evaluation(error)
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Syntax(e) => write!(f, "{}", e),
            Error::Evaluation(e) => write!(f, "evaluation failed: {}", e),
            Error::NoResults(s) => write!(f, "{} produced no results", s),
            Error::Command(s) => write!(f, "{}", s),
            Error::Config(s) => write!(f, "invalid config: {}", s),
            Error::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

/// What the caller should do after a line.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Lines(Vec<String>),
    Quit,
}

const HELP: &str = "\
commands:
  expr         evaluate and print every alternative
  #name expr   define name as the alternatives of expr
  !expr        assert every alternative of expr as a fact
  :facts       list the facts in the world
  :env         list the definitions
  :q           quit";

/// A session keeps an environment and a world alive across evaluations.
pub struct Session {
    pub config: SessionConfig,
    environment: Environment,
    world: World,
}

impl Session {
    pub fn new(config: SessionConfig) -> Session {
        Session {
            config,
            environment: Environment::new(),
            world: World::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// The names defined so far.
    pub fn defined_names(&self) -> Vec<Name> {
        self.environment.flatten().keys().cloned().collect()
    }

    /// Parses with the defined names treated as variables.
    pub fn parse(&self, input: &str) -> Result<Expression, Error> {
        let parser = Parser::new(input)?.with_globals(self.defined_names());
        Ok(parser.parse()?)
    }

    pub fn evaluate(&self, expression: &Expression) -> Alternatives {
        expression.evaluate(&self.environment, &self.world)
    }

    // Pulls at most `limit` alternatives, failing on the first error.
    fn collect(&self, expression: &Expression, limit: usize) -> Result<Vec<Expression>, Error> {
        let values = self
            .evaluate(expression)
            .take(limit)
            .collect::<error::Result<Vec<_>>>()?;
        Ok(values)
    }

    /// Binds the alternatives of the expression under a name, for later expressions to use.
    pub fn define(&mut self, name: &str, expression: &Expression) -> Result<Candidates, Error> {
        let values: Candidates = self.collect(expression, self.config.max_results)?.into_iter().collect();
        if values.is_empty() {
            return Err(Error::NoResults(format!("definition of {}", name)));
        }
        debug!(definition = name, alternatives = values.len(), "defining");
        self.environment.bind(name.into(), values.clone());
        Ok(values)
    }

    /// Asserts every alternative of the expression into the world.
    /// Returns how many facts were asserted.
    pub fn declare(&mut self, expression: &Expression) -> Result<usize, Error> {
        let facts = self.collect(expression, self.config.max_results)?;
        if facts.is_empty() {
            return Err(Error::NoResults(format!("declaration of {}", expression)));
        }
        let count = facts.len();
        for fact in facts {
            self.world.assert(fact);
        }
        Ok(count)
    }

    /// Renders the alternatives of an expression, up to the configured limit.
    /// One alternative past the limit is pulled, to tell whether anything was cut off.
    pub fn show(&self, expression: &Expression) -> Result<Vec<String>, Error> {
        let limit = self.config.max_results;
        let mut values = self.collect(expression, limit.saturating_add(1))?;
        let truncated = values.len() > limit;
        values.truncate(limit);
        let mut lines: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        if truncated {
            lines.push(format!("(stopped after {} alternatives)", limit));
        } else if lines.is_empty() {
            lines.push("(no results)".to_string());
        }
        Ok(lines)
    }

    /// Handles one line of session input.
    pub fn run_line(&mut self, line: &str) -> Result<Outcome, Error> {
        let line = line.trim();
        debug!(line, "session line");
        if line.is_empty() {
            return Ok(Outcome::Lines(vec![]));
        }

        if let Some(command) = line.strip_prefix(':') {
            return match command.trim() {
                "q" | "quit" => Ok(Outcome::Quit),
                "facts" => Ok(Outcome::Lines(self.world.facts().map(|f| f.to_string()).collect())),
                "env" => Ok(Outcome::Lines(
                    self.environment
                        .flatten()
                        .iter()
                        .map(|(name, values)| {
                            let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                            format!("{} = {}", name, values.join(" | "))
                        })
                        .collect(),
                )),
                "help" => Ok(Outcome::Lines(HELP.lines().map(String::from).collect())),
                other => Err(Error::Command(format!("unknown command ':{}'", other))),
            };
        }

        if let Some(definition) = line.strip_prefix('#') {
            let (name, rest) = match definition.split_once(char::is_whitespace) {
                Some((name, rest)) => (name, rest.trim()),
                None => (definition, ""),
            };
            if name.is_empty() || rest.is_empty() {
                return Err(Error::Command("usage: #name expr".to_string()));
            }
            validate_name(name)?;
            let expression = self.parse(rest)?;
            let values = self.define(name, &expression)?;
            return Ok(Outcome::Lines(vec![format!(
                "defined {} with {} alternative{}",
                name,
                values.len(),
                if values.len() == 1 { "" } else { "s" }
            )]));
        }

        if let Some(declaration) = line.strip_prefix('!') {
            let expression = self.parse(declaration)?;
            let count = self.declare(&expression)?;
            return Ok(Outcome::Lines(vec![format!(
                "asserted {} fact{}",
                count,
                if count == 1 { "" } else { "s" }
            )]));
        }

        let expression = self.parse(line)?;
        Ok(Outcome::Lines(self.show(&expression)?))
    }

    /// Runs every line of a script, reporting errors inline, until the end or a quit.
    pub fn run_script(&mut self, script: &str) -> Vec<String> {
        let mut output = vec![];
        for line in script.lines() {
            match self.run_line(line) {
                Ok(Outcome::Lines(lines)) => output.extend(lines),
                Ok(Outcome::Quit) => break,
                Err(e) => output.push(e.to_string()),
            }
        }
        output
    }
}

// A defined name has to be something the parser reads back as one name.
fn validate_name(name: &str) -> Result<(), Error> {
    match syntax::token::scan(name) {
        Ok(tokens) if tokens.len() == 1 && tokens[0].token_type == syntax::token::TokenType::Name => {
            Ok(())
        }
        _ => Err(Error::Command(format!("'{}' is not a valid name", name))),
    }
}
