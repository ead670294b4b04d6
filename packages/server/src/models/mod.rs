pub mod iteration;
pub mod submission;
