use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Youtube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized comment or reply. Replies are stored as siblings of their
/// parent, directly after it, so the output is a flat list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub text: String,
    pub like_count: u64,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Platform-native value: unix seconds on TikTok, RFC 3339 text on YouTube.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<Value>,
}

impl CommentRecord {
    pub fn new(platform: Platform, text: impl Into<String>, like_count: u64) -> Self {
        Self {
            text: text.into(),
            like_count,
            platform,
            user: None,
            create_time: None,
        }
    }
}
