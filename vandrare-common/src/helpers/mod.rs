pub mod fs;
pub mod rng;
