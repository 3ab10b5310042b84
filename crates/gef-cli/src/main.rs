#![forbid(unsafe_code)]

mod cli;

fn main() -> anyhow::Result<std::process::ExitCode> {
    cli::run()
}
