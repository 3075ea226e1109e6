use std::io;

use clap::{error::ErrorKind, CommandFactory, Parser};
use fv::{specimen, FontCatalog, SystemEnvironment};
use simple_logger::SimpleLogger;

mod cli;

use cli::Cli;

fn main() {
    let cli = Cli::parse();
    let mode = match cli.mode() {
        Ok(mode) => mode,
        Err(e) => Cli::command().error(ErrorKind::ArgumentConflict, e).exit(),
    };

    if let Err(e) = run(mode, &cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(mode: specimen::Mode, cli: &Cli) -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()?;

    let catalog = FontCatalog::discover();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    specimen::run(&mode, &catalog, &cli.params(), &SystemEnvironment, &mut out)?;
    Ok(())
}
