use std::process::ExitCode;

fn main() -> ExitCode {
    rtmbot_cli::run()
}
