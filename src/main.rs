use std::process::ExitCode;

fn main() -> ExitCode {
    match modfleet::cli::run() {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            modfleet::ui::output::error(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
