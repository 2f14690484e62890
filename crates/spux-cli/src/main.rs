use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use spux_core::config::Config;
use std::process;
use tracing::{error, info, Level};

mod cmd;
mod model;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with executor and filter settings; explicit flags win.
    #[arg(global = true, long)]
    config: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Route one resampling round and print the tables.
    Balance(cmd::balance::BalanceArgs),
    /// Run a particle filter on a synthetic random walk.
    Simulate(cmd::simulate::SimulateArgs),
    /// Time the balancer over many redraw rounds.
    Benchmark(cmd::benchmark::BenchmarkArgs),
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Balance(args) => cmd::balance::run(args),
        Commands::Simulate(mut args) => {
            if let Some(path) = &cli.config {
                info!("Loading config: {}", path);
                match Config::load_from_file(path) {
                    Ok(mut file_config) => {
                        if let Some(sub_matches) = matches.subcommand_matches("simulate") {
                            file_config.merge_from_cli(&args.config, sub_matches);
                        }
                        args.config = file_config;
                    }
                    Err(e) => {
                        error!("Cannot load config '{}': {}", path, e);
                        process::exit(1);
                    }
                }
            }
            cmd::simulate::run(args)
        }
        Commands::Benchmark(args) => cmd::benchmark::run(args),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
