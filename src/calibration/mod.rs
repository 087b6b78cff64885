pub mod runner;
pub mod tuning;

pub use runner::{CalibrationMetrics, CalibrationRunner, CalibrationSample};
pub use tuning::ReachModelFitter;
