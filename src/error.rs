use std::fmt;

use crate::environment::Candidates;
use crate::expression::{Expression, Name};

pub type Result<T> = std::result::Result<T, Error>;

/// The errors an evaluation can raise.
/// They travel as items of the lazy result sequence, so whoever pulls the sequence sees them.
/// None of them leaves an environment or a world partially modified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A comprehension found matching facts, but none of them provided a value
    /// for one of the names the constraint was supposed to bind.
    ArgumentMismatch { name: Name, constraint: Expression },

    /// A comprehension whose constraint matched no fact in the world.
    NoCandidates { constraint: Expression },

    /// No argument alternative satisfied an abstraction's parameter pattern.
    PatternFailure {
        pattern: Expression,
        arguments: Candidates,
    },
}

impl Error {
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::ArgumentMismatch { .. } => "ArgumentMismatch",
            Error::NoCandidates { .. } => "NoCandidates",
            Error::PatternFailure { .. } => "PatternFailure",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ArgumentMismatch { name, constraint } => write!(
                f,
                "no candidates survive for ${} in constraint [{}]",
                name, constraint
            ),
            Error::NoCandidates { constraint } => {
                write!(f, "no fact in the world matches [{}]", constraint)
            }
            Error::PatternFailure { pattern, arguments } => {
                write!(f, "argument pattern {} doesn't match supplied value {{", pattern)?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for String {
    fn from(error: Error) -> Self {
        error.to_string()
    }
}
