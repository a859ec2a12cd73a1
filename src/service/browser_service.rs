//! Chromium session used as the TikTok comment transport.
//!
//! TikTok only answers its web comment API for requests that come from a
//! page it has served and fingerprinted, so the calls are issued with
//! `fetch` from inside a real browser tab sitting on the video page.

use crate::prelude::*;
use crate::scrape::connector::FetchError;
use crate::scrape::scraper::tiktok::CommentTransport;
use anyhow::anyhow;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BrowserEngine {
    Chromium,
    Webkit,
}

impl BrowserEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserEngine::Chromium => "chromium",
            BrowserEngine::Webkit => "webkit",
        }
    }
}

/// Requested session options. Anything left `None` uses the driver default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    pub engine: Option<BrowserEngine>,
    pub headless: Option<bool>,
    pub num_sessions: Option<usize>,
    pub ms_token: Option<String>,
    /// Settle time after the video page has loaded.
    pub sleep_after: Option<Duration>,
}

impl SessionConfig {
    /// Token only. Used when the full configuration is rejected.
    pub fn minimal(&self) -> Self {
        Self {
            ms_token: self.ms_token.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unsupported session option `{0}`")]
    UnsupportedOption(String),
    #[error("could not start browser session: {0}")]
    Launch(String),
}

pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Open a session on `video_url`. If the driver rejects one of the
    /// requested options the session is retried once with
    /// [`SessionConfig::minimal`].
    pub async fn open(config: &SessionConfig, video_url: &str) -> Result<Self> {
        tracing::info!("Creating browser session...");
        tracing::debug!("Session options: {:?}", redacted(config));

        match Self::launch(config, video_url).await {
            Ok(session) => Ok(session),
            Err(SessionError::UnsupportedOption(option)) => {
                tracing::warn!("Session option rejected: {}", option);
                tracing::info!("Retrying with the minimal session options...");
                Self::launch(&config.minimal(), video_url)
                    .await
                    .map_err(|e| anyhow!(e))
            }
            Err(e) => Err(anyhow!(e)),
        }
    }

    async fn launch(config: &SessionConfig, video_url: &str) -> Result<Self, SessionError> {
        check_supported(config)?;

        let mut builder = BrowserConfig::builder();
        if config.headless == Some(false) {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(SessionError::Launch)?;

        let (browser, mut events) = Browser::launch(browser_config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move { while events.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        if let Some(token) = &config.ms_token {
            let cookie = CookieParam::builder()
                .name("msToken")
                .value(token.as_str())
                .domain(".tiktok.com")
                .path("/")
                .build()
                .map_err(SessionError::Launch)?;
            page.set_cookie(cookie)
                .await
                .map_err(|e| SessionError::Launch(e.to_string()))?;
        }

        page.goto(video_url)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        if let Some(settle) = config.sleep_after {
            tokio::time::sleep(settle).await;
        }

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
    }
}

#[async_trait]
impl CommentTransport for BrowserSession {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let expression = format!(
            "fetch({}, {{ credentials: 'include' }}).then(response => response.json())",
            serde_json::to_string(url)?
        );
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(FetchError::Browser)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        result
            .into_value::<Value>()
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Chromium is the only engine this driver can run, and it manages exactly
/// one tab per session.
fn check_supported(config: &SessionConfig) -> Result<(), SessionError> {
    if let Some(engine) = config.engine.filter(|engine| *engine != BrowserEngine::Chromium) {
        return Err(SessionError::UnsupportedOption(format!(
            "browser={}",
            engine.as_str()
        )));
    }
    if let Some(sessions) = config.num_sessions.filter(|n| *n != 1) {
        return Err(SessionError::UnsupportedOption(format!(
            "num_sessions={}",
            sessions
        )));
    }
    Ok(())
}

fn redacted(config: &SessionConfig) -> SessionConfig {
    SessionConfig {
        ms_token: config.ms_token.as_ref().map(|_| "***".to_string()),
        ..config.clone()
    }
}
