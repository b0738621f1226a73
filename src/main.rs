use std::{
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
};

use anyhow::Context;
use clap::Parser;
use harvester::{
    browser_controller::BrowserController,
    config::{HarvesterOptions, DEFAULT_CONFIG_FILE},
    harvester::Harvester,
};
use log::{debug, error};
use signal_hook::consts::{SIGINT, SIGTERM};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Confluence search, PDF and attachment harvester", long_about = None)]
struct Args {
    /// TOML file with the harvester settings
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
    /// Base url of the wiki, e.g. http://wiki:8090
    #[arg(short = 'b', long)]
    base_url: Option<String>,
    /// File with one search term per line
    #[arg(short = 'w', long)]
    wordlist: Option<PathBuf>,
    /// Directory where PDFs and attachments are written
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,
    /// Number of search results requested per page
    #[arg(short = 'l', long)]
    limit: Option<u32>,
    /// Pause between two search pages in milliseconds
    #[arg(long)]
    page_delay_ms: Option<u64>,
    /// Verify TLS certificates (verification is off by default)
    #[arg(long)]
    verify_tls: bool,
}

impl Args {
    fn into_options(self) -> anyhow::Result<HarvesterOptions> {
        let (path, explicit) = match self.config {
            Some(p) => (p, true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let mut options = HarvesterOptions::load(&path, explicit)?;
        options.apply_env();

        if let Some(base_url) = self.base_url {
            options.base_url = base_url;
        }
        if let Some(wordlist) = self.wordlist {
            options.wordlist_path = wordlist;
        }
        if let Some(output_dir) = self.output_dir {
            options.output_dir = output_dir;
        }
        if let Some(limit) = self.limit {
            options.limit = limit;
        }
        if let Some(delay) = self.page_delay_ms {
            options.page_delay_ms = delay;
        }
        if self.verify_tls {
            options.accept_invalid_certs = false;
        }
        options.validate()?;
        Ok(options)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let options = args.into_options()?;

    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))
        .context("could not register SIGTERM handler")?;
    signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))
        .context("could not register SIGINT handler")?;

    debug!(
        "starting harvester against {} with wordlist {:?}",
        options.base_url, options.wordlist_path
    );

    let renderer = BrowserController::new(&options);
    let mut harvester = Harvester::new(options, renderer, should_terminate)?;

    // fatal errors are reported but do not change the exit code
    if let Err(e) = harvester.run() {
        error!("run aborted: {}", e);
    }

    Ok(())
}
