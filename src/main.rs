mod args;
mod etl;

use std::path::Path;

use clap::Parser;
use env_logger::Env;
use log::{info, LevelFilter};
use snafu::ErrorCompat;

use crate::args::{Args, Command};
use crate::etl::config_reader::{read_config, PipelineConfig, PipelineSettings};
use crate::etl::*;

fn settings(args: &Args) -> BEtlResult<PipelineSettings> {
    let (config, root) = match &args.config {
        Some(p) => {
            let path = Path::new(p);
            (read_config(path)?, path.parent())
        }
        None => (PipelineConfig::default(), None),
    };
    Ok(PipelineSettings::resolve(args.command.paths(), &config, root))
}

fn run(args: &Args) -> BEtlResult<()> {
    let s = settings(args)?;
    match &args.command {
        Command::Extract { reference, .. } => run_extract(&s, reference.as_deref()),
        Command::RefreshCodes { .. } => run_refresh_codes(&s),
        Command::Combine { .. } => run_combine(&s),
        Command::Gaps { .. } => run_gaps(&s),
        Command::All { reference, .. } => run_all(&s, reference.as_deref()),
    }
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    }

    info!("args: {:?}", args);

    if let Err(e) = run(&args) {
        eprintln!("An error occured: {}", e);
        let mut source = std::error::Error::source(e.as_ref());
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        if let Some(bt) = ErrorCompat::backtrace(e.as_ref()) {
            eprintln!("trace: {}", bt);
        } else {
            eprintln!("No trace found");
        }
        std::process::exit(1);
    }
}
