use std::env;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use clap::{Parser, ValueEnum};
use crate::config::io::read_config;
use crate::console::application::run_application;
use crate::error::AppRunError;

pub mod capture;
pub mod config;
pub mod console;
pub mod device;
pub mod error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Capture sign language letters from the glove over Bluetooth LE.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Path to a JSON config file; defaults to glove-capture.json next to the executable or in the user config directory
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Phrase to capture, overrides the config file
    #[arg(long)]
    pub target_phrase: Option<String>,

    /// Advertised name of the glove, overrides the config file
    #[arg(long)]
    pub device_name: Option<String>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

pub fn init_logging(level: log::LevelFilter) {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

fn jitter_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

pub fn run(args: Args) -> Result<(), AppRunError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut config = read_config(args.config.as_deref()).await?;

        if let Some(target_phrase) = args.target_phrase {
            config.target_phrase = target_phrase;
        }
        if let Some(device_name) = args.device_name {
            config.device_name = device_name;
        }
        config.validate()?;

        run_application(config, jitter_seed()).await
    })
}
