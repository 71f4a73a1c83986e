use clap::Parser;
use fasttrade::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
