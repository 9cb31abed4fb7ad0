use clap::Parser;
use err_derive::Error;
use validator::Validate;

use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use log::*;

mod config;
mod enti;
mod extract;
mod fetch;
mod normalize;
mod page;
mod reconcile;
mod status;

use self::config::Config;
use self::extract::{extract, ConsoleProgress, Outcome};
use self::status::ModelHolder;

#[derive(Debug, Error)]
pub enum Error {
    #[error(display = "Model unavailable: {}", _0)]
    ModelUnavailable(String),
    #[error(display = "No text submitted")]
    EmptyInput,
    #[error(display = "Inference failed: {}", _0)]
    InferenceFailure(String),
    #[error(display = "Config file invalid")]
    ValidationError(#[error(source)] validator::ValidationErrors),
    #[error(display = "Config syntax invalid")]
    ConfigError(#[error(source)] toml::de::Error),
    #[error(display = "Cannot read or write file")]
    IoError(#[error(source)] std::io::Error),
    #[error(display = "Model hub request failed")]
    HubError(#[error(source)] hf_hub::api::sync::ApiError),
}

const DEFAULT_CONFIG: &str = "laporgub.toml";
const QUIT: &str = "/quit";

/// Detect location entities in LaporGub Jateng reports.
#[derive(Debug, Parser)]
#[command(name = "laporgub-ner", version)]
struct Args {
    /// TOML config file; defaults are used when it does not exist
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Process this text once instead of reading reports from stdin
    #[arg(short, long)]
    text: Option<String>,

    /// Write an HTML report page after every submission
    #[arg(long)]
    html: Option<PathBuf>,

    /// Log at debug level, same as `debug = true` in the config file
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    if config.debug || args.debug {
        std::env::set_var("RUST_LOG", "laporgub_ner=debug");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "laporgub_ner=info");
    }
    pretty_env_logger::init();

    if !args.config.exists() {
        info!("{} not found, using default settings", args.config.display());
    }

    let holder = ModelHolder::new(|| enti::load(&config));
    eprintln!("Preparing the model... (the first run downloads it and can take a few minutes)");
    if holder.load().is_err() {
        warn!("Starting with the model offline; it is retried on every submission");
    }
    eprintln!("{}", page::status_line(holder.is_online()));

    let html_path = args
        .html
        .clone()
        .or_else(|| config.html_report.as_ref().map(PathBuf::from));

    match args.text {
        Some(text) => submit(&holder, &text, html_path.as_deref()),
        None => console_input(&holder, html_path.as_deref()),
    }
}

fn load_config(path: &Path) -> Result<Config, Error> {
    let config: Config = if path.exists() {
        toml::from_str(&std::fs::read_to_string(path)?)?
    } else {
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

fn submit(holder: &ModelHolder, input: &str, html_path: Option<&Path>) -> Result<(), Error> {
    let outcome = extract(holder, input, &mut ConsoleProgress);
    print!("{}", page::console_report(&outcome));
    io::stdout().flush()?;
    if let Some(html_path) = html_path {
        page::write_html_report(html_path, holder.is_online(), input, &outcome)?;
    }
    match &outcome {
        Outcome::Found(found) => debug!("{:?} -> {:?}", found.cleaned, found.spans),
        Outcome::NoEntities { cleaned } => debug!("{:?} -> []", cleaned),
        _ => {}
    }
    Ok(())
}

fn console_input(holder: &ModelHolder, html_path: Option<&Path>) -> Result<(), Error> {
    eprintln!("Enter one report per line. {} or end of input stops.", QUIT);
    let stdin = io::stdin();
    let mut lines = stdin.lock();
    loop {
        print!("Report: ");
        io::stdout().flush()?;
        let mut input = String::new();
        if lines.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim_end_matches(&['\r', '\n'][..]);
        if input.trim() == QUIT {
            break;
        }
        submit(holder, input, html_path)?;
    }
    debug!("Console closed");
    Ok(())
}
