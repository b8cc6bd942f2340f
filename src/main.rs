use clap::Parser as _;
use hm_prowee_tools::commands;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Manage weekly temperature programs on HomeMatic radiator thermostats.
#[derive(clap::Parser)]
#[clap(version, about, author)]
enum Commands {
    List(commands::list::Args),
    PrintConfig(commands::print_config::Args),
    PrintTemp(commands::print_temp::Args),
    SetTemp(commands::set_temp::Args),
}

fn end<E: std::error::Error>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            1
        }
    });
}

fn main() {
    let filter_description = std::env::var("HM_PROWEE_TOOLS_LOG").unwrap_or_default();
    let filter = filter_description
        .parse::<tracing_subscriber::filter::targets::Targets>()
        .unwrap_or_else(|e| {
            eprintln!("error: HM_PROWEE_TOOLS_LOG is not a valid filter: {e}");
            std::process::exit(2);
        });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    match Commands::parse() {
        Commands::List(args) => end(commands::list::run(args)),
        Commands::PrintConfig(args) => end(commands::print_config::run(args)),
        Commands::PrintTemp(args) => end(commands::print_temp::run(args)),
        Commands::SetTemp(args) => end(commands::set_temp::run(args)),
    }
}
