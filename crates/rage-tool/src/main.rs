//! Command-line driver for the GTA V resource XML codec.
//!
//! Reads CodeWalker XML resources, refreshes their derived fields and writes
//! them back, prints summaries and looks up shader definitions.

mod cli;
mod summary;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command, DEFAULT_LOG_FILTER, VERBOSE_LOG_FILTER};
use rage_resource::{Codec, Error, Result, ShaderCatalogue};
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn load_codec(catalogue: Option<&Path>) -> Result<Codec> {
    let Some(path) = catalogue else {
        return Codec::new();
    };
    let bytes = std::fs::read(path).map_err(|e| Error::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let catalogue = ShaderCatalogue::parse(&bytes)?;
    info!(path = %path.display(), shaders = catalogue.len(), "loaded shader catalogue");
    Ok(Codec::with_catalogue(Arc::new(catalogue)))
}

fn run(cli: Cli) -> Result<()> {
    let codec = load_codec(cli.catalogue.as_deref())?;
    match cli.command {
        Command::Roundtrip {
            input,
            output,
            raw,
            refresh,
        } => {
            let codec = codec.with_options(refresh.options());
            let mut resource = codec.read_file(&input)?;
            if !raw {
                codec.refresh(&mut resource)?;
            }
            match output {
                Some(output) => {
                    codec.write_file(&output, &resource)?;
                    info!(input = %input.display(), output = %output.display(), "wrote resource");
                }
                None => {
                    let bytes = codec.emit(&resource)?;
                    std::io::stdout().write_all(&bytes).map_err(|e| Error::Io {
                        path: "<stdout>".to_string(),
                        message: e.to_string(),
                    })?;
                }
            }
        }
        Command::Info { input } => {
            let resource = codec.read_file(&input)?;
            print!("{}", summary::resource(&resource));
        }
        Command::Shader { name } => {
            let def = codec.catalogue().resolve(&name)?;
            print!("{}", summary::shader(def));
        }
        Command::Check { inputs, refresh } => {
            let codec = codec.with_options(refresh.options());
            let mut failed = 0;
            for input in &inputs {
                let result = codec
                    .read_file(input)
                    .and_then(|mut resource| codec.refresh(&mut resource));
                match result {
                    Ok(()) => info!(path = %input.display(), "ok"),
                    Err(e) => {
                        error!(path = %input.display(), "{e}");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                return Err(Error::configuration(format!(
                    "{failed} of {} files failed validation",
                    inputs.len()
                )));
            }
        }
    }
    Ok(())
}
