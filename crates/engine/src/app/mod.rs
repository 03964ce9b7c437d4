mod loop_runner;
mod metrics;

pub use loop_runner::{run_headless, run_ticks, LoopConfig, RunSummary, Simulation};
pub use metrics::LoopMetricsSnapshot;
