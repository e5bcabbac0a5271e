pub mod numeric;
pub mod pipeline;
pub mod types;
