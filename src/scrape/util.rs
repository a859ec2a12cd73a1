use crate::prelude::*;
use anyhow::anyhow;
use regex::Regex;
use url::Url;

const YOUTUBE_ID_PATTERN: &str = r"^[A-Za-z0-9_-]{11}$";

/// Pull the 11-character video id out of a bare id, a `youtu.be/` link, a
/// `/shorts/` link or a `watch?v=` link.
pub fn youtube_video_id(input: &str) -> Result<String> {
    let input = input.trim();
    let id_regex = Regex::new(YOUTUBE_ID_PATTERN)?;
    if id_regex.is_match(input) {
        return Ok(input.to_string());
    }

    let candidate = if let Some(rest) = after(input, "youtu.be/") {
        Some(strip_query(rest))
    } else if let Some(rest) = after(input, "youtube.com/shorts/") {
        Some(strip_query(rest))
    } else if input.contains("youtube.com/watch") {
        Regex::new(r"[?&]v=([A-Za-z0-9_-]{11})")?
            .captures(input)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    } else {
        None
    };

    match candidate {
        Some(id) if id_regex.is_match(id) => Ok(id.to_string()),
        _ => {
            let err = format!("Could not extract a video id from {}", input);
            tracing::error!("{}", err);
            Err(anyhow!(err))
        }
    }
}

/// Numeric video id from a `tiktok.com/@user/video/<id>` URL, or a bare id.
pub fn tiktok_video_id(input: &str) -> Result<String> {
    let input = input.trim();
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        return Ok(input.to_string());
    }

    let parsed = Url::parse(input)?;
    let id = Regex::new(r"/video/(\d+)")?
        .captures(parsed.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    match id {
        Some(id) => Ok(id),
        None => {
            let err = format!("Could not extract a video id from {}", input);
            tracing::error!("{}", err);
            Err(anyhow!(err))
        }
    }
}

fn after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.split_once(marker).map(|(_, rest)| rest)
}

fn strip_query(text: &str) -> &str {
    text.split(['?', '&', '/', '#']).next().unwrap_or(text)
}
