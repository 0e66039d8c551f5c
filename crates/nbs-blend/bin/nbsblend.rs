use std::{fs::OpenOptions, io, process, sync::Mutex};

use clap::Parser;
use nbs_blend::{Blender, Cli};
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

fn init_logging(cli: &Cli) -> io::Result<()> {
    let level = if cli.debug {
        LevelFilter::DEBUG
    } else if cli.verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };

    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);
    if cli.log_dest == "-" {
        builder.with_writer(io::stderr).init();
    } else {
        let file = OpenOptions::new().create(true).append(true).open(&cli.log_dest)?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli) {
        eprintln!("nbsblend: couldn't open log destination {}: {err}", cli.log_dest);
        process::exit(1);
    }

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            process::exit(1);
        }
    };

    if let Err(err) = Blender::new(config).run() {
        error!(%err, "fatal");
        process::exit(2);
    }
}
