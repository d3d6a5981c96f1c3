pub mod environment;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod fact_tree;
pub mod session;
pub mod syntax;
pub mod world;

#[cfg(test)]
mod tests;
