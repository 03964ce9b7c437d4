use std::process::ExitCode;

use gem_engine::run_headless;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut session,
        save_path,
    } = app;

    let summary = run_headless(&config, &mut session);
    info!(
        ticks = summary.ticks,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        dropped_backlog_ms = summary.dropped_backlog.as_millis() as u64,
        "run_finished"
    );

    if let Err(err) = session.save_to(&save_path) {
        error!(error = %err, path = %save_path.display(), "final_save_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
