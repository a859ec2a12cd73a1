use anyhow::anyhow;
use chrono::Local;
use clap::Parser;
use comment_scraper::prelude::*;
use comment_scraper::record::Platform;
use comment_scraper::scrape::fetch_loop::{harvest, HarvestError, HarvestOptions};
use comment_scraper::scrape::normalize::NormalizeOptions;
use comment_scraper::scrape::pacing::{FailurePolicy, PacingPolicy};
use comment_scraper::scrape::scraper::youtube::{SortOrder, YouTubeConnector};
use comment_scraper::scrape::util::youtube_video_id;
use comment_scraper::service::checkpoint_service::Checkpoint;
use comment_scraper::service::var_service::Settings;
use comment_scraper::util::log_service::set_logging;
use comment_scraper::util::path_service::{default_file_name, resolve_output_path, DATA_ROOT};
use comment_scraper::util::signal_service::cancel_on_ctrl_c;
use dotenv::dotenv;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(name = "youtube_comments", about = "Fetch comments from a YouTube video.")]
struct Cli {
    /// YouTube video URL or 11-character id
    #[clap(long)]
    url: String,

    /// Number of top-level comments to fetch
    #[clap(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,

    /// Output file name, stored under data/youtube/
    #[clap(long)]
    output: Option<PathBuf>,

    /// Skip replies
    #[clap(long)]
    no_replies: bool,

    /// Comment order
    #[clap(long, value_enum, default_value_t = SortOrder::Relevance)]
    sort: SortOrder,

    /// Include the author's display name
    #[clap(long)]
    include_user: bool,

    /// Include the comment publish time
    #[clap(long)]
    include_time: bool,

    /// Verbose logging
    #[clap(long)]
    debug: bool,

    /// What to do after saving when the run fails or is interrupted
    #[clap(long, value_enum, default_value_t = FailurePolicy::ReturnPartial)]
    on_error: FailurePolicy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenv().ok();
    set_logging(cli.debug);
    let settings = Settings::from_env();

    let Some(api_key) = settings.youtube_api_key() else {
        tracing::error!("Set your YouTube Data API key before running");
        tracing::info!("Either export YOUTUBE_API_KEY='<your key>' or add it to .env");
        return Ok(());
    };

    match run(cli, api_key).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<HarvestError>() {
            Some(HarvestError::Interrupted { saved }) => {
                tracing::info!("Exited after saving {} comments", saved);
                Ok(())
            }
            _ => {
                tracing::error!("Fetching YouTube comments failed: {:#}", e);
                Err(e)
            }
        },
    }
}

async fn run(cli: Cli, api_key: &str) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    let video_id = youtube_video_id(&cli.url)?;
    let output = resolve_output_path(
        Path::new(DATA_ROOT),
        Platform::Youtube,
        cli.output.as_deref(),
        default_file_name(Platform::Youtube, Some(&video_id), Local::now()),
    );

    let checkpoint = Checkpoint::new(&output);
    checkpoint.save(&[], false).await;

    let mut connector = YouTubeConnector::new(api_key, &video_id, cli.sort);
    if !connector.video_exists().await {
        return Err(anyhow!(
            "Video id is invalid or the video does not exist: {}",
            connector.video_id()
        ));
    }

    tracing::info!("Fetching comments for video {}", connector.video_id());
    tracing::info!(
        "Planning to fetch about {} comments{}",
        cli.count,
        if cli.no_replies { "" } else { " (with replies)" }
    );
    tracing::info!("Saving incrementally to {}", output.display());

    let options = HarvestOptions {
        count: cli.count as usize,
        include_replies: !cli.no_replies,
        normalize: NormalizeOptions {
            include_user: cli.include_user,
            include_create_time: cli.include_time,
        },
        pacing: PacingPolicy::youtube(),
        on_failure: cli.on_error,
        debug: cli.debug,
    };

    let collected = harvest(&mut connector, &checkpoint, &options, &cancel).await?;
    tracing::info!(
        "Finished ({:?}): {} top-level comments, {} in total, saved to {}",
        collected.outcome,
        collected.top_level,
        collected.records.len(),
        checkpoint.path().display()
    );

    Ok(())
}
