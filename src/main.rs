mod cli;
mod criteria;
mod error;
mod fetcher;
mod filter;
mod fmt;
mod loader;
mod logging;
mod models;
mod normalizer;
mod pipeline;
mod settings;
#[cfg(test)]
mod test_support;
mod writer;

use clap::Parser;

use cli::{Cli, Commands, ConfigCommands, RunArgs};

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    let config = cli.config.as_deref();

    let result = match cli.command {
        None => cli::run::run(config, RunArgs::default()),
        Some(Commands::Run(args)) => cli::run::run(config, args),
        Some(Commands::Vocab) => cli::vocab::run(config),
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Init { force } => cli::config::init(config, force),
            ConfigCommands::Show => cli::config::show(config),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
