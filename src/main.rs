//! mixscan - identify the tracks played inside a long-form audio mix

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mixscan::config::Config;
use mixscan::output::{OutputFormat, TracklistOutput};
use mixscan::providers::ProviderFactory;
use mixscan::services::{IdentificationCache, MixIdentifier, RequestRateLimiter};
use mixscan::Error;

#[derive(Debug, Parser)]
#[command(
    name = "mixscan",
    version,
    about = "Identify tracks in long-form audio mixes"
)]
struct Cli {
    /// Path to the mix audio file
    input: PathBuf,

    /// Analysis window length in seconds
    #[arg(short = 's', long)]
    segment_length: Option<u64>,

    /// Output format(s) to generate
    #[arg(short = 'f', long, value_enum)]
    formats: Option<FormatArg>,

    /// Directory for generated tracklists
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, env = "MIXSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Markdown,
    M3u,
    All,
}

fn selected_formats(selector: &str) -> Vec<OutputFormat> {
    match selector {
        "all" => vec![OutputFormat::Json, OutputFormat::Markdown, OutputFormat::M3u],
        one => one.parse().map(|f| vec![f]).unwrap_or_default(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("mixscan=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        error!(error = %e, "mixscan failed");
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            error!(cause = %cause, "caused by");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> mixscan::Result<()> {
    info!("mixscan {}", env!("CARGO_PKG_VERSION"));

    // Configuration: defaults -> TOML -> env, CLI flags on top
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(segment_length) = cli.segment_length {
        config.identification.segment_length = segment_length;
    }
    if let Some(formats) = cli.formats {
        config.output.format = match formats {
            FormatArg::Json => "json",
            FormatArg::Markdown => "markdown",
            FormatArg::M3u => "m3u",
            FormatArg::All => "all",
        }
        .to_string();
    }
    if let Some(output_dir) = cli.output_dir {
        config.output.directory = output_dir;
    }
    config.validate()?;

    let source = MixIdentifier::open_source(&cli.input)?;
    let mix_info = source.mix_info().clone();
    info!(
        title = %mix_info.title,
        duration = %mixscan::models::format_position(mix_info.duration_secs),
        "Opened mix"
    );

    let providers = ProviderFactory::from_config(&config.providers)?;
    let cache = if config.cache.enabled {
        Some(IdentificationCache::open(
            &config.cache.directory,
            config.cache.ttl_secs,
        )?)
    } else {
        None
    };
    let rate_limiter = config
        .app
        .rate_limit_enabled
        .then(|| RequestRateLimiter::per_minute(config.app.max_requests_per_minute));

    let formats = selected_formats(&config.output.format);
    let output_dir = config.output.directory.clone();
    let timing = config.timing.clone();

    let identifier = MixIdentifier::new(config, providers, cache, rate_limiter);

    // Ctrl-C stops window processing; accumulated hits are still written out
    let cancel = identifier.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing with partial results");
            cancel.cancel();
        }
    });

    let tracks = identifier.identify(&source).await?;
    if tracks.is_empty() {
        return Err(Error::NoTracksIdentified);
    }

    let count = tracks.len();
    let output = TracklistOutput::new(tracks, mix_info, timing, output_dir);
    for path in output.save_all(&formats)? {
        info!(path = %path.display(), "Wrote tracklist");
    }

    info!(tracks = count, "Found {count} tracks");
    Ok(())
}
