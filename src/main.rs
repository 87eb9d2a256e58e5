use clap::Parser;
use edgebook::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
