mod license;
mod new;
mod progress;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use console::style;

use gravity_pm::{ConfigStore, GravityError};

#[derive(Parser, Debug)]
#[command(name = "gravity")]
#[command(about = "Gravity application installer")]
#[command(version)]
struct Args {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Creates a new Gravity application inside the given folder with the given name
    New(new::NewArgs),
}

fn show_help() {
    println!(
        "{} {}",
        style("Gravity Installer Version:").green(),
        style(env!("CARGO_PKG_VERSION")).yellow()
    );
    println!();
    println!("{}", style("Usage:").yellow());
    println!("    {} <application name>", style("new").green());
    println!("        Creates a new Gravity application inside the given folder with the given name.");
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // RUST_LOG wins over -v when both are given
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run() -> Result<i32> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            show_help();
            return Ok(0);
        }
        Err(e) if e.kind() == ErrorKind::DisplayVersion => {
            e.print()?;
            return Ok(0);
        }
        Err(e) => {
            log::debug!("Argument error: {}", e);
            show_help();
            return Ok(1);
        }
    };

    init_logger(args.verbose);

    let Some(Commands::New(new_args)) = args.command else {
        show_help();
        return Ok(1);
    };

    let store = ConfigStore::locate()?;
    let config = match store.load_or_init() {
        Ok(config) => config,
        Err(GravityError::ConfigParse { path, source }) => {
            eprintln!(
                "{} {}",
                style("Could not parse config file at").red(),
                path.display()
            );
            log::debug!("{}", source);
            return Ok(1);
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    let config = license::ensure_license_key(&store, config)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| anyhow::anyhow!("Failed to create async runtime: {}", e))?;
    rt.block_on(new::execute(new_args, config))
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
