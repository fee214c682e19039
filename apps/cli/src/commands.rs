//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use dailydigest_cache::StoryCache;
use dailydigest_core::{DigestObserver, DigestPipeline};
use dailydigest_fetch::Fetcher;
use dailydigest_shared::{
    AppConfig, DigestError, FetchConfig, Stories, init_config, load_config, resolve_latest,
    snapshot_path,
};
use dailydigest_storage::SnapshotStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// dailydigest — a progressive daily news digest reader.
#[derive(Parser)]
#[command(
    name = "dailydigest",
    version,
    about = "Fetch, enrich, and cache daily news digests.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Load and enrich the digest for a date.
    Load {
        /// Date key in YYYYMMDD form.
        date: String,
    },

    /// Record the latest date seen and save the cache snapshot.
    ///
    /// An invalid latest date, or one not after the current date, falls back
    /// to the current date.
    Sync {
        /// Latest date key in YYYYMMDD form. Defaults to the current date.
        latest: Option<String>,
    },

    /// Cache snapshot inspection.
    Cache {
        /// Cache subcommand.
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Show the resident snapshot.
    Show,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Load { date } => cmd_load(&date).await,
        Command::Sync { latest } => cmd_sync(latest.as_deref()).await,
        Command::Cache { action } => match action {
            CacheAction::Show => cmd_cache_show().await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Restore the cache and snapshot store from config.
async fn open_cache(config: &AppConfig) -> Result<(SnapshotStore, StoryCache)> {
    let store = SnapshotStore::new(snapshot_path(config)?);
    let cache = StoryCache::restore(store.load().await, config.cache.capacity);
    Ok((store, cache))
}

/// Load and enrich one date's digest.
///
/// The snapshot is saved after the run whether or not it succeeded: a failed
/// run may still have updated `current_date` or enriched other resident
/// digests, and saving is best-effort either way.
async fn cmd_load(date: &str) -> Result<()> {
    let config = load_config()?;
    let (store, cache) = open_cache(&config).await?;
    let fetcher = Fetcher::new(&FetchConfig::from(&config))?;
    let pipeline = DigestPipeline::new(fetcher, cache);

    info!(date, "loading digest");

    let reporter = Arc::new(CliProgress::new());
    let result = pipeline.load(date, reporter).await;

    // Persist whatever was cached, success or not. Best-effort.
    store.save(&pipeline.cache().snapshot()).await;

    let stories = result?;
    println!();
    println!("  Digest {date}: {} stories", stories.stories.len());
    for story in &stories.stories {
        let image = if story.has_image() { "image" } else { "-----" };
        let body = story.body.as_deref().map(str::len).unwrap_or(0);
        println!("  [{image}] {:>10}  {} ({body} bytes)", story.id, story.title);
    }
    println!();

    Ok(())
}

async fn cmd_sync(latest: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let (store, cache) = open_cache(&config).await?;

    let current = cache.current_date();
    let latest = resolve_latest(latest, current);

    cache.set_latest_date(latest);
    store.save(&cache.snapshot()).await;

    info!(latest, current, "synced latest date");
    println!("latest date: {latest}");
    Ok(())
}

async fn cmd_cache_show() -> Result<()> {
    let config = load_config()?;
    let (store, cache) = open_cache(&config).await?;
    let snap = cache.snapshot();

    println!("snapshot:     {}", store.path().display());
    println!("current date: {}", snap.current_date);
    println!("latest date:  {}", snap.latest_date);
    println!("digests:      {} (oldest first)", snap.lru.len());
    for date in &snap.lru {
        if let Some(stories) = snap.by_date.get(date) {
            let images = stories.stories.iter().filter(|s| s.has_image()).count();
            let bodies = stories.stories.iter().filter(|s| s.has_body()).count();
            println!(
                "  {date}: {} stories, {images} images, {bodies} bodies",
                stories.stories.len()
            );
        }
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("created {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Prints stories as pipeline events arrive, with an indicatif spinner for
/// the in-between.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner.set_message("resolving digest");
        Self { spinner }
    }
}

impl DigestObserver for CliProgress {
    fn base_ready(&self, date: &str, stories: &Stories) {
        self.spinner.println(format!("{date}:"));
        for story in &stories.stories {
            self.spinner
                .println(format!("  {:>10}  {}", story.id, story.title));
        }
        self.spinner.set_message("fetching images and bodies");
    }

    fn image_updated(&self, story_id: i64, image: &[u8]) {
        self.spinner
            .println(format!("  image for {story_id} ({} bytes)", image.len()));
    }

    fn finished(&self, _date: &str, _stories: &Stories) {
        self.spinner.finish_and_clear();
    }

    fn failed(&self, _date: &str, _error: &DigestError) {
        self.spinner.finish_and_clear();
    }
}
