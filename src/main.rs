use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use feedsheet::config::{self, Config, Overrides};
use feedsheet::{app, logging};

#[derive(Parser, Debug)]
#[command(
    name = "feedsheet",
    version,
    about = "Export the articles of a WordPress RSS feed to an ODS spreadsheet"
)]
struct Args {
    /// Feed URL [default: https://www.uneiaparjour.fr/feed/]
    #[arg(short, long)]
    url: Option<String>,

    /// Output spreadsheet [default: uneiaparjour.ods]
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Maximum number of articles to export
    #[arg(long, value_name = "N", value_parser = parse_positive)]
    max: Option<usize>,

    /// Fetch only the first feed page
    #[arg(long)]
    no_paginate: bool,

    /// Seconds to wait between page fetches [default: 1]
    #[arg(long, value_name = "SECONDS", value_parser = parse_delay)]
    delay: Option<f64>,

    /// Keep articles published on or after this date (DD/MM/YYYY or YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    from: Option<String>,

    /// Keep articles published on or before this date (DD/MM/YYYY or YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    to: Option<String>,

    /// Stop after this many pages, 0 for no limit [default: 500]
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Config file [default: ~/.config/feedsheet/config.toml]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            feed_url: self.url.clone(),
            output: self.output.clone(),
            max_articles: self.max,
            no_paginate: self.no_paginate,
            delay_seconds: self.delay,
            from: self.from.clone(),
            to: self.to.clone(),
            max_pages: self.max_pages,
        }
    }
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_delay(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
    if !value.is_finite() || value < 0.0 {
        return Err("must be a non-negative number of seconds".to_string());
    }
    Ok(value)
}

async fn run(args: Args) -> Result<()> {
    let log = logging::init();

    let config_path = args.config.clone().or_else(config::default_path);
    let config = match &config_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from '{}'", path.display()))?,
        None => Config::default(),
    };

    log.set_level(&config.log_level);

    let run_config = config
        .resolve(&args.overrides())
        .context("Invalid settings")?;

    let summary = app::run(&run_config).await?;
    println!("{}", summary);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
