use std::process::ExitCode;

fn main() -> ExitCode {
    match gem_game::app::build_app() {
        Ok(app) => gem_game::app::run(app),
        Err(error) => {
            tracing::error!(error = %error, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
