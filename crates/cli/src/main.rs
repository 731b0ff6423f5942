use std::process::ExitCode;

fn main() -> ExitCode {
    phonebook_cli::run()
}
