//! CLI entry point for soundgrab.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use soundgrab_core::download::ensure_target_dir;
use soundgrab_core::{
    AuthToken, BatchReport, ClientCredentials, EngineConfig, FilterFacets, Harvester, OAuthClient,
    Query, compile_filter,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod terminal;

use app_config::{ENV_ACCESS_TOKEN, ENV_CLIENT_ID, ENV_CLIENT_SECRET, FileConfig};
use cli::Args;
use terminal::{StdinCodeSource, TerminalReporter};

/// Process outcome mapped onto the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// Batch completed (per-asset failures included) or was declined.
    Success,
    /// Fatal error before or during the run.
    Failure,
    /// Run stopped early; a rerun resumes it.
    Halted,
}

impl From<ProcessExit> for ExitCode {
    fn from(outcome: ProcessExit) -> Self {
        match outcome {
            ProcessExit::Success => Self::SUCCESS,
            ProcessExit::Failure => Self::from(1),
            ProcessExit::Halted => Self::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(
        text = ?args.text,
        file_types = ?args.file_types,
        tags = ?args.tags,
        sort = %args.sort,
        "CLI arguments parsed"
    );

    match run(args).await {
        Ok(outcome) => outcome.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    let loaded = app_config::load_default_file_config()?;
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), found = loaded.config.is_some(), "config file");
    }
    let file = loaded.config.unwrap_or_default();

    let config = build_engine_config(&args, &file, app_config::env_non_empty);
    config.validate().context("Invalid configuration")?;

    let output_dir = resolve_output_dir(
        args.output_dir.clone(),
        file.output_dir.clone(),
        app_config::env_non_empty("HOME"),
    )?;
    let query = build_query(&args)?;

    // Fail on a bad directory before the OAuth exchange prompts for a code.
    ensure_target_dir(&output_dir).await?;

    let token = obtain_token(&args, &config).await?;

    let harvester =
        Harvester::from_config(&config, token).context("Failed to set up the harvester")?;

    let cancel = harvester.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after in-flight downloads");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    info!(
        output_dir = %output_dir.display(),
        concurrency = harvester.concurrency(),
        "soundgrab starting"
    );

    let show_bar = io::stderr().is_terminal() && !args.quiet;
    let mut reporter = TerminalReporter::new(args.yes, show_bar);

    let report = match harvester.run(query, &output_dir, &mut reporter).await {
        Ok(report) => report,
        Err(error) if error.is_auth_rejection() => {
            return Err(anyhow::Error::new(error).context(
                "The access token was rejected; obtain a new one and run again",
            ));
        }
        Err(error) => return Err(error.into()),
    };

    Ok(determine_exit_outcome(&report))
}

/// Maps a finished batch to the process outcome.
fn determine_exit_outcome(report: &BatchReport) -> ProcessExit {
    if report.halted.is_some() {
        ProcessExit::Halted
    } else {
        ProcessExit::Success
    }
}

/// Layers defaults, file values, environment and flags, in that order.
fn build_engine_config(
    args: &Args,
    file: &FileConfig,
    env: impl Fn(&str) -> Option<String>,
) -> EngineConfig {
    let mut config = EngineConfig::default();

    let client_id = env(ENV_CLIENT_ID).or_else(|| file.client_id.clone());
    let client_secret = env(ENV_CLIENT_SECRET).or_else(|| file.client_secret.clone());
    if let (Some(client_id), Some(client_secret)) = (client_id, client_secret) {
        config.credentials = Some(ClientCredentials {
            client_id,
            client_secret,
        });
    }

    if let Some(daily) = file.daily_limit {
        config.limits.daily = daily;
    }
    if let Some(hourly) = file.hourly_limit {
        config.limits.hourly = hourly;
    }
    if let Some(minute) = file.minute_limit {
        config.limits.minute = minute;
    }
    if let Some(buffer) = file.rate_buffer {
        config.limits.buffer = buffer;
    }
    if let Some(secs) = file.max_throttle_wait_secs {
        config.max_throttle_wait = Duration::from_secs(secs);
    }

    config.concurrency = args
        .concurrency
        .map(usize::from)
        .or(file.concurrency)
        .unwrap_or(config.concurrency);
    config.max_retries = args
        .max_retries
        .map(u32::from)
        .or(file.max_retries)
        .unwrap_or(config.max_retries);

    config
}

/// Picks the output directory. The directory must already exist; the run
/// checks it before any request.
fn resolve_output_dir(
    flag: Option<PathBuf>,
    file: Option<PathBuf>,
    home: Option<String>,
) -> Result<PathBuf> {
    if let Some(dir) = flag.or(file) {
        return Ok(dir);
    }
    let Some(home) = home else {
        bail!("HOME is not set; pass --output-dir");
    };
    Ok(PathBuf::from(home).join("Downloads").join("freesound"))
}

fn build_query(args: &Args) -> Result<Query> {
    let mut facets = FilterFacets::new()
        .with_file_types(&args.file_types)
        .with_tags(&args.tags);
    if let Some(range) = args.duration_pair() {
        facets = facets.with_duration_range(range);
    }
    if let Some(range) = args.rating_pair() {
        facets = facets.with_rating_range(range);
    }

    let filter = compile_filter(&facets).context("Invalid search filter")?;
    debug!(filter = filter.as_deref().unwrap_or(""), "compiled filter");

    let mut query = Query::new(args.text.clone(), filter)
        .with_sort(args.sort)
        .with_group_by_pack(args.group_packs);
    if !args.fields.is_empty() {
        query = query.with_fields(&args.fields);
    }
    Ok(query)
}

async fn obtain_token(args: &Args, config: &EngineConfig) -> Result<AuthToken> {
    if let Some(token) = args
        .access_token
        .clone()
        .filter(|token| !token.trim().is_empty())
        .or_else(|| app_config::env_non_empty(ENV_ACCESS_TOKEN))
    {
        debug!("using supplied access token");
        return Ok(AuthToken::bearer(token));
    }

    let Some(credentials) = config.credentials.clone() else {
        bail!(
            "No access token and no OAuth2 client credentials.\n  \
             Pass --access-token, set {ENV_ACCESS_TOKEN}, or configure client_id and \
             client_secret ({ENV_CLIENT_ID} / {ENV_CLIENT_SECRET})"
        );
    };

    let oauth = OAuthClient::with_base_url(&config.api_base, credentials)
        .context("Failed to set up OAuth2 client")?;
    oauth
        .authenticate(&StdinCodeSource)
        .await
        .context("OAuth2 authorization failed")
}
