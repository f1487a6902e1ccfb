pub mod outcome;
pub mod probe;
