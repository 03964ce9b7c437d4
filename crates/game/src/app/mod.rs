mod bootstrap;
pub mod gameplay;
mod loop_runner;

pub use bootstrap::{build_app, AppError, AppWiring};
pub use loop_runner::run;
