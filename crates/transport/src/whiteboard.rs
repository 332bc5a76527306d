//! Whiteboard mailbox client and poll-cursor bookkeeping.
//!
//! The whiteboard is an HTTP service holding an append-only list of posts
//! per hashtag:
//!
//! - `GET  /latest/<tag>`            → `{"latest": N}`
//! - `GET  /get/<tag>/<cursor>/-1`   → `{"data": [b64, ...], "length": L}`
//! - `POST /post/<tag>` `{"data": b64}`

use std::time::Duration;

use {
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{Result, profile::WhiteboardProfile};

#[derive(Debug, Deserialize)]
struct Latest {
    latest: i64,
}

/// Posts returned by one `get` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posts {
    /// Base64 messages in server order.
    pub data: Vec<String>,
    /// Index one past the newest post on the server. Untrusted.
    pub length: i64,
}

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    data: &'a str,
}

/// HTTP client bound to one mailbox.
#[derive(Debug, Clone)]
pub struct WhiteboardClient {
    http: reqwest::Client,
    base_url: String,
    hashtag: String,
}

impl WhiteboardClient {
    pub fn new(profile: &WhiteboardProfile, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: profile.base_url(),
            hashtag: profile.hashtag.clone(),
        })
    }

    pub fn hashtag(&self) -> &str {
        &self.hashtag
    }

    /// Index of the newest post.
    pub async fn latest(&self) -> Result<i64> {
        let url = format!("{}/latest/{}", self.base_url, self.hashtag);
        let body: Latest = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.latest)
    }

    /// Every post from `cursor` onward.
    pub async fn posts_since(&self, cursor: i64) -> Result<Posts> {
        let url = format!("{}/get/{}/{cursor}/-1", self.base_url, self.hashtag);
        let posts = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(posts)
    }

    /// Append one base64 message. Non-2xx responses are errors.
    pub async fn post(&self, data: &str) -> Result<()> {
        let url = format!("{}/post/{}", self.base_url, self.hashtag);
        self.http
            .post(&url)
            .json(&NewPost { data })
            .send()
            .await?
            .error_for_status()?;
        debug!(hashtag = %self.hashtag, bytes = data.len(), "posted to whiteboard");
        Ok(())
    }
}

/// Result of applying one poll response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollBatch {
    pub messages: Vec<String>,
    /// Posts the server counted but did not return. Never recovered.
    pub lost: u64,
}

/// Read cursor for one mailbox.
///
/// The cursor always jumps to the server-reported length, so a gap is
/// skipped rather than re-requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhiteboardPoller {
    cursor: i64,
}

impl WhiteboardPoller {
    pub fn new(cursor: i64) -> Self {
        Self { cursor }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn apply(&mut self, posts: Posts) -> PollBatch {
        let expected = posts.length.saturating_sub(self.cursor);
        let actual = i64::try_from(posts.data.len()).unwrap_or(i64::MAX);
        let lost = u64::try_from(expected.saturating_sub(actual)).unwrap_or(0);
        self.cursor = posts.length.max(0);
        PollBatch {
            messages: posts.data,
            lost,
        }
    }
}
