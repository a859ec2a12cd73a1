//! The paginate, normalize and checkpoint loop shared by both platforms.

use super::connector::{Connector, FetchError};
use super::normalize::{NormalizeOptions, RecordShape};
use super::pacing::{FailurePolicy, PacingPolicy};
use crate::record::CommentRecord;
use crate::service::checkpoint_service::Checkpoint;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Number of top-level comments wanted. Replies do not count towards it.
    pub count: usize,
    pub include_replies: bool,
    pub normalize: NormalizeOptions,
    pub pacing: PacingPolicy,
    pub on_failure: FailurePolicy,
    /// Dump the first raw comment and reply at DEBUG level.
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reached `count` or the source ran dry.
    Completed,
    /// Cancelled and absorbed under [`FailurePolicy::ReturnPartial`].
    Interrupted,
    /// Source failed and the error was absorbed under [`FailurePolicy::ReturnPartial`].
    Failed,
}

#[derive(Debug)]
pub struct Harvest {
    pub records: Vec<CommentRecord>,
    pub top_level: usize,
    pub outcome: Outcome,
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("interrupted after collecting {saved} comments")]
    Interrupted { saved: usize },
    #[error(transparent)]
    Source(#[from] FetchError),
}

enum Stop {
    Interrupted,
    Failed(FetchError),
}

struct Run<'a> {
    options: &'a HarvestOptions,
    checkpoint: &'a Checkpoint,
    comment_shape: RecordShape,
    reply_shape: RecordShape,
    records: Vec<CommentRecord>,
    top_level: usize,
    last_saved: usize,
}

/// Drive `connector` until `options.count` top-level comments are collected
/// or the source is exhausted, checkpointing into `checkpoint` as it goes.
///
/// Interrupts and unrecoverable source errors always trigger a final save of
/// what was collected; `options.on_failure` then decides whether the caller
/// sees the error or the partial list.
pub async fn harvest<C>(
    connector: &mut C,
    checkpoint: &Checkpoint,
    options: &HarvestOptions,
    cancel: &CancellationToken,
) -> Result<Harvest, HarvestError>
where
    C: Connector + ?Sized,
{
    let mut run = Run {
        options,
        checkpoint,
        comment_shape: *connector.comment_shape(),
        reply_shape: *connector.reply_shape(),
        records: Vec::new(),
        top_level: 0,
        last_saved: 0,
    };

    let stop = run.fetch(connector, cancel).await;
    run.finish(stop).await
}

impl Run<'_> {
    async fn fetch<C>(&mut self, connector: &mut C, cancel: &CancellationToken) -> Option<Stop>
    where
        C: Connector + ?Sized,
    {
        let count = self.options.count;
        let interval = self.options.pacing.checkpoint_interval.max(1);

        'pages: loop {
            if self.top_level >= count {
                break None;
            }
            if cancel.is_cancelled() {
                break Some(Stop::Interrupted);
            }

            let page = match connector.next_page(count - self.top_level).await {
                Ok(Some(page)) if !page.is_empty() => page,
                Ok(_) => {
                    tracing::info!("No more comments available");
                    break None;
                }
                Err(e) if e.ends_stream() => {
                    log_stream_end(&e);
                    break None;
                }
                Err(e) => break Some(Stop::Failed(e)),
            };

            for item in page {
                if self.top_level >= count {
                    break 'pages None;
                }
                if cancel.is_cancelled() {
                    break 'pages Some(Stop::Interrupted);
                }

                if self.options.pacing.roll_micro_delay() {
                    self.options.pacing.micro.sleep().await;
                }

                if self.options.debug && self.top_level == 0 {
                    tracing::debug!("First raw comment: {}", item);
                }

                let record = match self.comment_shape.normalize(&item, self.options.normalize) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!("Skipping comment: {}", e);
                        continue;
                    }
                };
                self.records.push(record);
                self.top_level += 1;

                if self.options.include_replies && self.comment_shape.reply_count(&item) > 0 {
                    self.attach_replies(connector, &item).await;
                }

                if self.top_level % interval == 0 {
                    tracing::info!(
                        "Fetched {} top-level comments ({} including replies)",
                        self.top_level,
                        self.records.len()
                    );
                    self.checkpoint.save(&self.records, false).await;
                    self.last_saved = self.top_level;

                    let rest = self.options.pacing.rest.sleep().await;
                    tracing::debug!("Rested {:.2}s", rest.as_secs_f64());
                }
            }
        }
    }

    async fn attach_replies<C>(&mut self, connector: &mut C, parent: &Value)
    where
        C: Connector + ?Sized,
    {
        self.options.pacing.reply.sleep().await;

        let replies = match connector.replies(parent).await {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!("Failed to fetch replies for comment #{}: {}", self.top_level, e);
                return;
            }
        };

        let mut attached = 0;
        for reply in &replies {
            if self.options.debug && self.top_level == 1 && attached == 0 {
                tracing::debug!("First raw reply: {}", reply);
            }
            match self.reply_shape.normalize(reply, self.options.normalize) {
                Ok(record) => {
                    self.records.push(record);
                    attached += 1;
                }
                Err(e) => tracing::warn!("Skipping reply: {}", e),
            }
        }

        if attached > 0 {
            tracing::info!("Comment #{} has {} replies", self.top_level, attached);
        }
    }

    async fn finish(self, stop: Option<Stop>) -> Result<Harvest, HarvestError> {
        let policy = self.options.on_failure;
        match stop {
            None => {
                if self.top_level > self.last_saved {
                    self.checkpoint.save(&self.records, true).await;
                }
                tracing::info!(
                    "Done: {} top-level comments ({} including replies)",
                    self.top_level,
                    self.records.len()
                );
                Ok(self.into_harvest(Outcome::Completed))
            }
            Some(Stop::Interrupted) => {
                tracing::info!("Interrupted, saving collected comments");
                self.save_partial().await;
                match policy {
                    FailurePolicy::Propagate => Err(HarvestError::Interrupted {
                        saved: self.records.len(),
                    }),
                    FailurePolicy::ReturnPartial => Ok(self.into_harvest(Outcome::Interrupted)),
                }
            }
            Some(Stop::Failed(e)) => {
                tracing::error!("Fetching comments failed: {}", e);
                self.save_partial().await;
                match policy {
                    FailurePolicy::Propagate => Err(HarvestError::Source(e)),
                    FailurePolicy::ReturnPartial => Ok(self.into_harvest(Outcome::Failed)),
                }
            }
        }
    }

    async fn save_partial(&self) {
        if self.records.is_empty() {
            return;
        }
        self.checkpoint.save(&self.records, true).await;
        tracing::info!(
            "Saved {} comments to {}",
            self.records.len(),
            self.checkpoint.path().display()
        );
    }

    fn into_harvest(self, outcome: Outcome) -> Harvest {
        Harvest {
            records: self.records,
            top_level: self.top_level,
            outcome,
        }
    }
}

fn log_stream_end(e: &FetchError) {
    match e {
        FetchError::VideoNotFound(id) => {
            tracing::error!("Video does not exist or is not accessible: {}", id)
        }
        FetchError::CommentsDisabled => tracing::error!("Comments are disabled for this video"),
        other => tracing::error!("Platform API error: {}", other),
    }
}
