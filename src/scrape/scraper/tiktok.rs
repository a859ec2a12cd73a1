use crate::record::Platform;
use crate::scrape::connector::{Connector, FetchError};
use crate::scrape::normalize::RecordShape;
use async_trait::async_trait;
use serde_json::Value;

const WEB_BASE_URL: &str = "https://www.tiktok.com";
/// Web app id the TikTok frontend sends with every API call.
const APP_ID: u32 = 1988;
const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 50;

/// TikTok has shipped several spellings of these fields; keep the list in
/// priority order.
pub const COMMENT_SHAPE: RecordShape = RecordShape {
    platform: Platform::Tiktok,
    root: None,
    text: &["text"],
    likes: &[
        "digg_count",
        "diggCount",
        "likeCount",
        "likes",
        "like_count",
        "likes_count",
        "statistics.digg_count",
    ],
    user: &[
        "user.unique_id",
        "user.uniqueId",
        "author.uniqueId",
        "author.unique_id",
    ],
    create_time: &["create_time", "createTime"],
    replies: &["reply_comment_total", "reply_count", "replyCount"],
};

/// Something that can GET a TikTok web API URL inside an authenticated
/// browsing context and hand back the decoded JSON.
#[async_trait]
pub trait CommentTransport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// Cursor state over `/api/comment/list/`. The stream cannot be rewound; a
/// new connector (and usually a new session) is needed to start over.
pub struct TikTokConnector<T> {
    transport: T,
    video_id: String,
    page_size: usize,
    cursor: u64,
    has_more: bool,
}

impl<T: CommentTransport> TikTokConnector<T> {
    pub fn new(transport: T, video_id: impl Into<String>) -> Self {
        Self {
            transport,
            video_id: video_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
            cursor: 0,
            has_more: true,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn comment_list_url(&self, count: usize) -> String {
        format!(
            "{}/api/comment/list/?aid={}&aweme_id={}&count={}&cursor={}",
            WEB_BASE_URL, APP_ID, self.video_id, count, self.cursor
        )
    }

    fn reply_list_url(&self, comment_id: &str, cursor: u64) -> String {
        format!(
            "{}/api/comment/list/reply/?aid={}&item_id={}&comment_id={}&count={}&cursor={}",
            WEB_BASE_URL, APP_ID, self.video_id, comment_id, self.page_size, cursor
        )
    }
}

#[async_trait]
impl<T: CommentTransport> Connector for TikTokConnector<T> {
    fn comment_shape(&self) -> &RecordShape {
        &COMMENT_SHAPE
    }

    fn reply_shape(&self) -> &RecordShape {
        &COMMENT_SHAPE
    }

    async fn next_page(&mut self, wanted: usize) -> Result<Option<Vec<Value>>, FetchError> {
        if !self.has_more {
            return Ok(None);
        }

        let url = self.comment_list_url(wanted.clamp(1, self.page_size));
        let page = CommentPage::parse(self.transport.get_json(&url).await?)?;
        tracing::debug!(
            cursor = self.cursor,
            items = page.comments.len(),
            more = page.has_more,
            "Fetched comment page"
        );

        let next = page.cursor.unwrap_or(self.cursor + page.comments.len() as u64);
        self.has_more = page.has_more && next > self.cursor;
        if page.has_more && !self.has_more {
            tracing::warn!(cursor = self.cursor, "Comment cursor did not advance, stopping");
        }
        self.cursor = next;

        Ok(Some(page.comments))
    }

    async fn replies(&mut self, parent: &Value) -> Result<Vec<Value>, FetchError> {
        let Some(comment_id) = parent.get("cid").and_then(id_string) else {
            return Err(FetchError::Decode("comment has no cid".to_string()));
        };

        let mut replies = Vec::new();
        let mut cursor = 0;
        loop {
            let url = self.reply_list_url(&comment_id, cursor);
            let page = CommentPage::parse(self.transport.get_json(&url).await?)?;
            let fetched = page.comments.len() as u64;
            replies.extend(page.comments);

            if !page.has_more || fetched == 0 {
                break;
            }
            let next = page.cursor.unwrap_or(cursor + fetched);
            if next <= cursor {
                tracing::warn!(cursor, comment_id = %comment_id, "Reply cursor did not advance, stopping");
                break;
            }
            cursor = next;
        }

        Ok(replies)
    }
}

/// One page of the TikTok comment or reply list.
#[derive(Debug)]
pub struct CommentPage {
    pub comments: Vec<Value>,
    pub cursor: Option<u64>,
    pub has_more: bool,
}

impl CommentPage {
    pub fn parse(mut body: Value) -> Result<Self, FetchError> {
        let status = body.get("status_code").and_then(Value::as_i64).unwrap_or(0);
        if status != 0 {
            let message = body
                .get("status_msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(FetchError::Api {
                status: u16::try_from(status).unwrap_or(u16::MAX),
                message,
            });
        }

        if !body.is_object() {
            return Err(FetchError::Decode(format!("expected an object, got {}", body)));
        }

        let comments = match body.get_mut("comments").map(Value::take) {
            Some(Value::Array(comments)) => comments,
            _ => Vec::new(),
        };

        let has_more = match body.get("has_more") {
            Some(Value::Bool(more)) => *more,
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
            _ => false,
        };

        Ok(Self {
            comments,
            cursor: body.get("cursor").and_then(Value::as_u64),
            has_more,
        })
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
