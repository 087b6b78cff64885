pub mod synthetic;

pub use synthetic::{generate_synthetic_pool, generate_synthetic_targets};
