use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use apify_client::ApifyClient;
use clap::Parser;
use github_client::GithubClient;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use devsignal_archive::{
    BrowserlessPageFetcher, CacheStore, DirectPageFetcher, FsStorage, PageFetcher,
    ProfessionalNetworkApi, SystemClock,
};
use devsignal_common::{Config, Credentials};
use devsignal_engine::{Pipeline, PipelineError, RunOptions, Sources};

#[derive(Parser, Debug)]
#[command(
    name = "devsignal",
    about = "Build a merged developer profile with activity scoring from GitHub and optional enrichment sources"
)]
struct Cli {
    /// GitHub login to profile
    username: String,

    /// GitHub token (falls back to GITHUB_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Fetch GraphQL contribution signals (needs a token)
    #[arg(long)]
    deep_signals: bool,

    /// Crawl personal websites discovered on the profile
    #[arg(long)]
    enrich_websites: bool,

    /// Fetch the professional-network profile
    #[arg(long)]
    enrich_professional: bool,

    /// Shorthand for every enrichment source
    #[arg(long)]
    full_profile: bool,

    /// Ignore fresh cache entries and fetch everything again
    #[arg(long)]
    refresh: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Professional profile URL or handle, overriding discovery
    #[arg(long)]
    linkedin_url: Option<String>,

    /// Extra website to crawl ahead of discovered ones (repeatable)
    #[arg(long = "website")]
    websites: Vec<String>,

    /// Single-line JSON output
    #[arg(long)]
    compact: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        let mut options = if self.full_profile {
            RunOptions::full_profile()
        } else {
            RunOptions {
                deep_signals: self.deep_signals,
                enrich_websites: self.enrich_websites,
                enrich_professional: self.enrich_professional,
                ..Default::default()
            }
        };
        options.manual_websites = self.websites.clone();
        options.professional_reference = self.linkedin_url.clone();
        options
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let code = e
                .downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .unwrap_or(1);
            error!(error = %e, "Run failed");
            eprintln!("error: {e:#}");
            ExitCode::from(code)
        }
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let directive = if cli.verbose {
        "devsignal=debug"
    } else {
        "devsignal=info"
    };
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref());
    let credentials = Credentials::from_env();
    credentials.log_redacted();

    let api_timeout = Duration::from_secs(config.scraping.api_timeout_secs);
    let crawl_timeout = Duration::from_secs(config.scraping.crawl_timeout_secs);

    let token = cli.token.clone().or_else(|| credentials.github_token.clone());
    let github = GithubClient::new(token, api_timeout).context("building GitHub client")?;

    let pages: Arc<dyn PageFetcher> = match &credentials.browserless_url {
        Some(url) => Arc::new(BrowserlessPageFetcher::new(
            url,
            credentials.browserless_token.as_deref(),
            crawl_timeout,
        )?),
        None => Arc::new(DirectPageFetcher::new(crawl_timeout)?),
    };
    let professional = credentials
        .apify_api_key
        .clone()
        .map(|key| Arc::new(ApifyClient::new(key)) as Arc<dyn ProfessionalNetworkApi>);

    let cache_dir = config.cache_dir(cli.cache_dir.as_deref(), &credentials);
    info!(cache_dir = %cache_dir.display(), refresh = cli.refresh, "Cache ready");
    let cache = Arc::new(CacheStore::new(
        Arc::new(FsStorage::new(cache_dir)),
        Arc::new(SystemClock),
        cli.refresh,
    ));

    let options = cli.run_options();
    let pipeline = Pipeline::new(
        config,
        Sources {
            github: Arc::new(github),
            pages,
            professional,
        },
        cache,
    );

    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("run", %run_id, identity = %cli.username);

    let report = tokio::select! {
        result = pipeline.run(&cli.username, &options).instrument(span) => result?,
        _ = tokio::signal::ctrl_c() => {
            // Cache writes are atomic renames, so abandoning here leaves no partial entries.
            warn!(%run_id, "Interrupted, abandoning in-flight fetches");
            return Ok(ExitCode::from(130));
        }
    };

    let json = if cli.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}
