use clap::Parser;
use log::{error, info};
use glove_capture::{init_logging, run, Args};
use glove_capture::error::{AppRunError, ConfigError};

fn main() -> Result<(), AppRunError> {
    let args = Args::parse();
    init_logging(args.log_level.into());
    info!(concat!("Glove Capture ", env!("CARGO_PKG_VERSION")));

    match run(args) {
        Err(AppRunError::ConfigError { source: source @ ConfigError::InvalidValue { .. } }) => {
            eprintln!("{}", source);
            Err(AppRunError::ConfigError { source })
        },
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(()),
    }
}
