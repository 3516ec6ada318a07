use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{autounlock, install, plan, status};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "privnode")]
#[command(version = VERSION)]
#[command(about = "Provision a Tor-routed pruned Bitcoin and Lightning node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the node (must run as root on a fresh Debian server)
    Install(install::InstallArgs),
    /// Show the step list an install would execute, without executing it
    Plan(plan::PlanArgs),
    /// Show service, onion and storage status of a provisioned node
    Status,
    /// Configure LND wallet auto-unlock (reads the password from stdin)
    Autounlock,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Install(args) => output::response::print_result(install::run(&args)),
        Commands::Plan(args) => output::response::print_result(plan::run(&args)),
        Commands::Status => output::response::print_result(status::run()),
        Commands::Autounlock => output::response::print_result(autounlock::run()),
    };

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
