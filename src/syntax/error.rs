use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// A syntax error, positioned by byte offset into the input line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    pub offset: usize,
    pub message: String,
}

impl Error {
    pub fn new(offset: usize, message: impl Into<String>) -> Error {
        Error {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "syntax error at offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for Error {}
