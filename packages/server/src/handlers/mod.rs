pub mod iterations;
pub mod submissions;
