pub mod errors;
pub mod sink;
