//! Binary entrypoint for the tasktree tool

use colored::Colorize;

fn main() {
    tracing_subscriber::fmt::init();

    if let Err(err) = tasktree::cli::run() {
        eprintln!("{}", format!("error: {}", err).red());
        std::process::exit(1);
    }
}
