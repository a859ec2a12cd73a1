use chrono::Local;
use clap::Parser;
use comment_scraper::prelude::*;
use comment_scraper::record::Platform;
use comment_scraper::scrape::fetch_loop::{harvest, HarvestError, HarvestOptions};
use comment_scraper::scrape::normalize::NormalizeOptions;
use comment_scraper::scrape::pacing::{DelayRange, FailurePolicy, PacingPolicy};
use comment_scraper::scrape::scraper::tiktok::TikTokConnector;
use comment_scraper::scrape::util::tiktok_video_id;
use comment_scraper::service::browser_service::{BrowserEngine, BrowserSession, SessionConfig};
use comment_scraper::service::checkpoint_service::Checkpoint;
use comment_scraper::service::var_service::Settings;
use comment_scraper::util::log_service::set_logging;
use comment_scraper::util::path_service::{default_file_name, resolve_output_path, DATA_ROOT};
use comment_scraper::util::signal_service::cancel_on_ctrl_c;
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_VIDEO_URL: &str = "https://www.tiktok.com/@ccarolinapg/video/7485833744784297238";

#[derive(Parser, Debug)]
#[clap(name = "tiktok_comments", about = "Fetch comments from a TikTok video.")]
struct Cli {
    /// TikTok video URL
    #[clap(long, default_value = DEFAULT_VIDEO_URL)]
    url: String,

    /// Number of top-level comments to fetch
    #[clap(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,

    /// Output file name, stored under data/tiktok/
    #[clap(long)]
    output: Option<PathBuf>,

    /// Skip replies
    #[clap(long)]
    no_replies: bool,

    /// Include the author's unique id
    #[clap(long)]
    include_user: bool,

    /// Include the comment creation time
    #[clap(long)]
    include_time: bool,

    /// Verbose logging, including the first raw comment
    #[clap(long)]
    debug: bool,

    /// Show the browser window instead of running headless
    #[clap(long)]
    show_browser: bool,

    /// Browser engine; webkit falls back to the default engine
    #[clap(long, value_enum, default_value_t = BrowserEngine::Chromium)]
    browser: BrowserEngine,

    /// Do not send the msToken cookie
    #[clap(long)]
    no_ms_token: bool,

    /// What to do after saving when the run fails or is interrupted
    #[clap(long, value_enum, default_value_t = FailurePolicy::Propagate)]
    on_error: FailurePolicy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenv().ok();
    set_logging(cli.debug);
    let settings = Settings::from_env();

    match run(cli, &settings).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<HarvestError>() {
            Some(HarvestError::Interrupted { saved }) => {
                tracing::info!("Exited after saving {} comments", saved);
                Ok(())
            }
            _ => {
                tracing::error!("Fetching TikTok comments failed: {:#}", e);
                Err(e)
            }
        },
    }
}

async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    let video_id = tiktok_video_id(&cli.url)?;
    let output = resolve_output_path(
        Path::new(DATA_ROOT),
        Platform::Tiktok,
        cli.output.as_deref(),
        default_file_name(Platform::Tiktok, None, Local::now()),
    );

    let ms_token = match cli.no_ms_token {
        true => None,
        false => {
            if settings.tiktok_ms_token.is_none() {
                tracing::warn!("TIKTOK_MS_TOKEN is not set, continuing without it");
            }
            settings.tiktok_ms_token.clone()
        }
    };

    tracing::info!("Fetching comments for {}", cli.url);
    tracing::info!(
        "Planning to fetch about {} comments{}",
        cli.count,
        if cli.no_replies { "" } else { " (with replies)" }
    );
    tracing::info!(
        "Browser: {}, headless: {}, ms_token: {}",
        cli.browser.as_str(),
        !cli.show_browser,
        ms_token.is_some()
    );
    tracing::info!("Saving incrementally to {}", output.display());

    let checkpoint = Checkpoint::new(&output);
    checkpoint.save(&[], false).await;

    let config = SessionConfig {
        engine: Some(cli.browser),
        headless: Some(!cli.show_browser),
        num_sessions: Some(1),
        ms_token,
        sleep_after: Some(Duration::from_secs(3)),
    };
    let session = BrowserSession::open(&config, &cli.url).await?;

    let warmup = DelayRange::secs(1.0, 3.0).sleep().await;
    tracing::debug!("Waited {:.2}s before fetching", warmup.as_secs_f64());

    let options = HarvestOptions {
        count: cli.count as usize,
        include_replies: !cli.no_replies,
        normalize: NormalizeOptions {
            include_user: cli.include_user,
            include_create_time: cli.include_time,
        },
        pacing: PacingPolicy::tiktok(),
        on_failure: cli.on_error,
        debug: cli.debug,
    };

    tracing::info!("Fetching comments...");
    let mut connector = TikTokConnector::new(session, video_id);
    let result = harvest(&mut connector, &checkpoint, &options, &cancel).await;
    connector.into_transport().close().await;

    let collected = result?;
    tracing::info!(
        "Finished ({:?}): {} top-level comments, {} in total, saved to {}",
        collected.outcome,
        collected.top_level,
        collected.records.len(),
        checkpoint.path().display()
    );

    Ok(())
}
