use clap::Parser;
use std::path::PathBuf;

use balancebridge_lib::io::ProtocolVariant;
use balancebridge_lib::RunOptions;

/// Stream motion sensor readings to a balancing robot controller over USB serial
#[derive(Parser, Debug)]
#[command(name = "balancebridge", version, about)]
struct Cli {
    /// Settings file (default: <config dir>/balancebridge/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wire protocol: pitch_binary, per_axis_binary, combined_binary,
    /// human_readable or derived_angle
    #[arg(short, long)]
    protocol: Option<ProtocolVariant>,

    /// Replay sensor readings from a JSON Lines file instead of simulating
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// List attached USB serial devices and exit
    #[arg(short, long)]
    list: bool,

    /// Log every frame sent and chunk received
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let options = RunOptions {
        config: cli.config,
        protocol: cli.protocol,
        replay: cli.replay,
        list: cli.list,
        verbose: cli.verbose,
    };

    if let Err(e) = balancebridge_lib::run(options) {
        eprintln!("balancebridge: {}", e);
        std::process::exit(1);
    }
}
