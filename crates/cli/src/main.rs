use std::process::ExitCode;

fn main() -> ExitCode {
    shelfdesk_cli::run()
}
