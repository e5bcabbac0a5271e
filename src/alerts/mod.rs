pub mod evaluator;
pub mod types;
pub mod webhook;
