//! The surface syntax: text in, expression trees out.

pub mod error;
pub mod parser;
pub mod token;

pub use error::Error;
pub use parser::{parse, Parser};
