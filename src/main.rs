use anyhow::{Context, Result};
use clap::Parser;
use jacoco_lcov::cli::Cli;
use jacoco_lcov::{Converter, ConverterConfig};
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

const EXIT_USAGE: u8 = 1;
const EXIT_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    init_logging(cli.verbosity, config.verbose);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn load_config(cli: &Cli) -> Result<ConverterConfig> {
    let config = match &cli.config {
        Some(path) => ConverterConfig::load(path)?,
        None => ConverterConfig::default(),
    };
    Ok(config.with_overrides(cli.strict, cli.verbosity > 0))
}

// RUST_LOG wins over -v and the config file.
fn init_logging(verbosity: u8, verbose: bool) {
    let level = match verbosity {
        0 if !verbose => "info",
        0 | 1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, config: &ConverterConfig) -> Result<()> {
    let mut converter = Converter::new(config);
    for root in &cli.sourcepath {
        converter
            .add_source_path(root)
            .with_context(|| format!("Failed to index source path {}", root.display()))?;
    }
    for execfile in &cli.execfiles {
        converter.load_exec_file(execfile)?;
    }

    let mut converter = converter.begin_class_analysis();
    for classfile in &cli.classfiles {
        converter.load_class_file(classfile)?;
    }

    converter
        .write(&cli.output)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    println!("Coverage data written to {}", cli.output.display());
    Ok(())
}
