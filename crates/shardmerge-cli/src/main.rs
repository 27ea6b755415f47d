#![forbid(unsafe_code)]

use clap::Parser;
use shardmerge_cli::Cli;

fn main() {
    let cli = Cli::parse();
    shardmerge_cli::init_tracing(cli.verbose);
    std::process::exit(shardmerge_cli::run_cli(cli));
}
