use crate::record::Platform;
use crate::scrape::connector::{Connector, FetchError};
use crate::scrape::normalize::RecordShape;
use crate::scrape::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use serde_json::Value;

const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const OEMBED_URL: &str = "https://www.youtube.com/oembed";
/// Hard ceiling the Data API puts on `maxResults`.
const MAX_PAGE_SIZE: usize = 100;

pub const THREAD_SHAPE: RecordShape = RecordShape {
    platform: Platform::Youtube,
    root: Some("snippet.topLevelComment.snippet"),
    text: &["textDisplay", "textOriginal"],
    likes: &["likeCount"],
    user: &["authorDisplayName", "authorChannelId.value"],
    create_time: &["publishedAt"],
    replies: &["snippet.totalReplyCount"],
};

pub const REPLY_SHAPE: RecordShape = RecordShape {
    platform: Platform::Youtube,
    root: Some("snippet"),
    text: &["textDisplay", "textOriginal"],
    likes: &["likeCount"],
    user: &["authorDisplayName", "authorChannelId.value"],
    create_time: &["publishedAt"],
    replies: &[],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortOrder {
    Relevance,
    Time,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::Time => "time",
        }
    }
}

/// Comment threads and replies from the YouTube Data API v3.
pub struct YouTubeConnector {
    client: reqwest::Client,
    api_key: String,
    video_id: String,
    order: SortOrder,
    retry: RetryPolicy,
    api_base_url: String,
    oembed_url: String,
    next_page_token: Option<String>,
    exhausted: bool,
}

impl YouTubeConnector {
    pub fn new(api_key: impl Into<String>, video_id: impl Into<String>, order: SortOrder) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            video_id: video_id.into(),
            order,
            retry: RetryPolicy::default(),
            api_base_url: API_BASE_URL.to_string(),
            oembed_url: OEMBED_URL.to_string(),
            next_page_token: None,
            exhausted: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_endpoints(mut self, api_base_url: &str, oembed_url: &str) -> Self {
        self.api_base_url = api_base_url.trim_end_matches('/').to_string();
        self.oembed_url = oembed_url.to_string();
        self
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Cheap existence check through the public oEmbed endpoint. Network
    /// trouble is not proof the video is gone, so it counts as a pass.
    pub async fn video_exists(&self) -> bool {
        let watch_url = format!("http://www.youtube.com/watch?v={}", self.video_id);
        let response = self
            .client
            .get(&self.oembed_url)
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await;

        match response {
            Ok(response) => {
                let exists = response.status().is_success();
                if !exists {
                    tracing::debug!("oEmbed lookup returned {}", response.status());
                }
                exists
            }
            Err(e) => {
                tracing::warn!("Could not verify video {}, assuming it exists: {}", self.video_id, e);
                true
            }
        }
    }

    async fn get_json(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(format!("{}/{}", self.api_base_url, endpoint))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        // A connection dropped mid-body is a socket failure, not a bad payload.
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(classify_api_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Connector for YouTubeConnector {
    fn comment_shape(&self) -> &RecordShape {
        &THREAD_SHAPE
    }

    fn reply_shape(&self) -> &RecordShape {
        &REPLY_SHAPE
    }

    async fn next_page(&mut self, wanted: usize) -> Result<Option<Vec<Value>>, FetchError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut query = vec![
            ("part", "snippet".to_string()),
            ("videoId", self.video_id.clone()),
            ("maxResults", wanted.clamp(1, MAX_PAGE_SIZE).to_string()),
            ("order", self.order.as_str().to_string()),
            ("textFormat", "plainText".to_string()),
        ];
        if let Some(token) = &self.next_page_token {
            query.push(("pageToken", token.clone()));
        }

        let body = with_retry(&self.retry, "commentThreads.list", || {
            self.get_json("commentThreads", &query)
        })
        .await?;

        let (items, next_page_token) = split_page(body);
        tracing::debug!(
            items = items.len(),
            more = next_page_token.is_some(),
            "Fetched comment thread page"
        );
        self.exhausted = next_page_token.is_none();
        self.next_page_token = next_page_token;

        Ok(Some(items))
    }

    async fn replies(&mut self, parent: &Value) -> Result<Vec<Value>, FetchError> {
        let Some(parent_id) = parent.get("id").and_then(Value::as_str) else {
            return Err(FetchError::Decode("comment thread has no id".to_string()));
        };

        let mut replies = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("part", "snippet".to_string()),
                ("parentId", parent_id.to_string()),
                ("maxResults", MAX_PAGE_SIZE.to_string()),
                ("textFormat", "plainText".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let body = with_retry(&self.retry, "comments.list", || {
                self.get_json("comments", &query)
            })
            .await?;

            let (items, next_page_token) = split_page(body);
            replies.extend(items);
            match next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(replies)
    }
}

/// Items plus the cursor for the following page, if any. A body without
/// `items` is an empty page.
pub fn split_page(mut body: Value) -> (Vec<Value>, Option<String>) {
    let next_page_token = body
        .get("nextPageToken")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    let items = match body.get_mut("items").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    (items, next_page_token)
}

/// Turn a non-2xx Data API response into the matching [`FetchError`].
pub fn classify_api_error(status: u16, body: &str) -> FetchError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = parsed["error"]["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());
    let reason = parsed["error"]["errors"][0]["reason"].as_str().unwrap_or("");

    match reason {
        "videoNotFound" => FetchError::VideoNotFound(message),
        "commentsDisabled" => FetchError::CommentsDisabled,
        _ if status == 404 => FetchError::VideoNotFound(message),
        _ => FetchError::Api { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::normalize::NormalizeOptions;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn thread(id: &str, text: &str, likes: u64, replies: u64) -> Value {
        json!({
            "id": id,
            "snippet": {
                "totalReplyCount": replies,
                "topLevelComment": {
                    "id": id,
                    "snippet": {
                        "textDisplay": text,
                        "likeCount": likes,
                        "authorDisplayName": "@viewer",
                        "publishedAt": "2024-02-01T08:30:00Z"
                    }
                }
            }
        })
    }

    #[test]
    fn thread_shape_reads_top_level_snippet() {
        let item = thread("t1", "great video", 15, 2);
        let record = THREAD_SHAPE
            .normalize(
                &item,
                NormalizeOptions {
                    include_user: true,
                    include_create_time: true,
                },
            )
            .unwrap();

        assert_eq!(record.text, "great video");
        assert_eq!(record.like_count, 15);
        assert_eq!(record.platform, Platform::Youtube);
        assert_eq!(record.user.as_deref(), Some("@viewer"));
        assert_eq!(record.create_time, Some(json!("2024-02-01T08:30:00Z")));
        assert_eq!(THREAD_SHAPE.reply_count(&item), 2);
    }

    #[test]
    fn reply_shape_reads_comment_snippet() {
        let reply = json!({ "id": "r1", "snippet": { "textDisplay": "agreed", "likeCount": 1 } });
        let record = REPLY_SHAPE.normalize(&reply, NormalizeOptions::default()).unwrap();
        assert_eq!(record.text, "agreed");
        assert_eq!(record.like_count, 1);
    }

    #[test]
    fn thread_without_like_count_defaults_to_zero() {
        let item = json!({ "snippet": { "topLevelComment": { "snippet": { "textDisplay": "x" } } } });
        let record = THREAD_SHAPE.normalize(&item, NormalizeOptions::default()).unwrap();
        assert_eq!(record.like_count, 0);
    }

    #[test]
    fn split_page_reads_cursor() {
        let (items, next) = split_page(json!({
            "items": [thread("a", "a", 0, 0), thread("b", "b", 0, 0)],
            "nextPageToken": "CURSOR"
        }));
        assert_eq!(items.len(), 2);
        assert_eq!(next.as_deref(), Some("CURSOR"));

        let (items, next) = split_page(json!({ "items": [] }));
        assert!(items.is_empty());
        assert!(next.is_none());

        let (items, next) = split_page(json!({ "kind": "youtube#commentThreadListResponse" }));
        assert!(items.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn classifies_platform_errors() {
        let disabled = r#"{"error":{"code":403,"message":"The video has disabled comments.","errors":[{"reason":"commentsDisabled"}]}}"#;
        assert!(matches!(
            classify_api_error(403, disabled),
            FetchError::CommentsDisabled
        ));

        let missing = r#"{"error":{"code":404,"message":"Video not found.","errors":[{"reason":"videoNotFound"}]}}"#;
        assert!(matches!(
            classify_api_error(404, missing),
            FetchError::VideoNotFound(message) if message == "Video not found."
        ));

        assert!(matches!(
            classify_api_error(404, "gone"),
            FetchError::VideoNotFound(_)
        ));

        let quota = r#"{"error":{"code":403,"message":"quota","errors":[{"reason":"quotaExceeded"}]}}"#;
        assert!(matches!(
            classify_api_error(403, quota),
            FetchError::Api { status: 403, .. }
        ));
    }

    /// Local HTTP server answering one canned response per connection and
    /// remembering each request line.
    struct Canned {
        base: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl Canned {
        async fn serve(responses: Vec<String>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = requests.clone();

            tokio::spawn(async move {
                for response in responses {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };
                    let mut buf = vec![0u8; 16 * 1024];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    let head = String::from_utf8_lossy(&buf[..read]);
                    let line = head.lines().next().unwrap_or_default().to_string();
                    seen.lock().unwrap().push(line);
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self { base, requests }
        }

        fn connector(&self, order: SortOrder) -> YouTubeConnector {
            YouTubeConnector::new("KEY", "dQw4w9WgXcQ", order)
                .with_endpoints(&self.base, &format!("{}/oembed", self.base))
                .with_retry(RetryPolicy {
                    max_attempts: 3,
                    base_delay: Duration::ZERO,
                })
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn respond(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Headers promise more body than is sent before the socket closes.
    fn truncated() -> String {
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\n\r\n{\"items\": [".to_string()
    }

    fn page(ids: &[&str], next: Option<&str>) -> String {
        let items: Vec<Value> = ids.iter().map(|id| thread(id, id, 1, 0)).collect();
        let mut body = json!({ "items": items });
        if let Some(token) = next {
            body["nextPageToken"] = json!(token);
        }
        respond("200 OK", &body.to_string())
    }

    #[tokio::test]
    async fn thread_pages_follow_the_page_token() {
        let server = Canned::serve(vec![page(&["a", "b"], Some("P2")), page(&["c"], None)]).await;
        let mut connector = server.connector(SortOrder::Time);

        assert_eq!(connector.next_page(250).await.unwrap().unwrap().len(), 2);
        assert_eq!(connector.next_page(5).await.unwrap().unwrap().len(), 1);
        assert!(connector.next_page(5).await.unwrap().is_none());

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET /commentThreads?"));
        assert!(requests[0].contains("videoId=dQw4w9WgXcQ"));
        assert!(requests[0].contains("maxResults=100"));
        assert!(requests[0].contains("order=time"));
        assert!(requests[0].contains("key=KEY"));
        assert!(!requests[0].contains("pageToken"));
        assert!(requests[1].contains("maxResults=5"));
        assert!(requests[1].contains("pageToken=P2"));
    }

    #[tokio::test]
    async fn dropped_body_is_retried() {
        let server = Canned::serve(vec![truncated(), page(&["a"], None)]).await;
        let mut connector = server.connector(SortOrder::Relevance);

        let items = connector.next_page(10).await.unwrap().unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn repeated_drops_exhaust_the_retries() {
        let server = Canned::serve(vec![truncated(), truncated(), truncated()]).await;
        let mut connector = server.connector(SortOrder::Relevance);

        let err = connector.next_page(10).await.unwrap_err();

        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 3, .. }));
        assert!(!err.ends_stream());
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn disabled_comments_end_the_stream_without_retrying() {
        let body = r#"{"error":{"code":403,"message":"The video has disabled comments.","errors":[{"reason":"commentsDisabled"}]}}"#;
        let server = Canned::serve(vec![respond("403 Forbidden", body)]).await;
        let mut connector = server.connector(SortOrder::Relevance);

        let err = connector.next_page(10).await.unwrap_err();

        assert!(matches!(err, FetchError::CommentsDisabled));
        assert!(err.ends_stream());
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn replies_page_by_parent_id() {
        let first = respond(
            "200 OK",
            &json!({ "items": [{ "snippet": { "textDisplay": "r1" } }], "nextPageToken": "R2" })
                .to_string(),
        );
        let second = respond(
            "200 OK",
            &json!({ "items": [{ "snippet": { "textDisplay": "r2" } }] }).to_string(),
        );
        let server = Canned::serve(vec![truncated(), first, second]).await;
        let mut connector = server.connector(SortOrder::Relevance);

        let replies = connector.replies(&thread("thread-1", "x", 0, 2)).await.unwrap();

        assert_eq!(replies.len(), 2);
        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].starts_with("GET /comments?"));
        assert!(requests[1].contains("parentId=thread-1"));
        assert!(!requests[1].contains("pageToken"));
        assert!(requests[2].contains("pageToken=R2"));
    }

    #[tokio::test]
    async fn video_check_follows_oembed_status() {
        let server = Canned::serve(vec![
            respond("200 OK", r#"{"title":"x"}"#),
            respond("404 Not Found", "Not Found"),
        ])
        .await;
        let connector = server.connector(SortOrder::Relevance);

        assert!(connector.video_exists().await);
        assert!(!connector.video_exists().await);
        assert!(server.requests()[0].starts_with("GET /oembed?url="));
        assert!(server.requests()[0].contains(connector.video_id()));
    }

    #[tokio::test]
    async fn video_check_passes_when_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let connector = YouTubeConnector::new("KEY", "dQw4w9WgXcQ", SortOrder::Relevance)
            .with_endpoints(&base, &format!("{base}/oembed"));

        assert!(connector.video_exists().await);
    }
}
