//! Harvest targets and crawl kinds
//!
//! A target is a single tweet whose responses are collected. Each target can
//! be crawled in two independent ways, each with its own query, predicate and
//! watermark.

use crate::crawler::{Cursor, Status};
use crate::CursorError;
use serde::Deserialize;
use std::fmt;

/// A tweet whose responses are harvested
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// Author of the target tweet, without the leading `@`
    pub screen_name: String,

    /// Id of the target tweet
    pub status_id: Cursor,
}

impl Target {
    pub fn new(screen_name: impl Into<String>, status_id: &str) -> Result<Self, CursorError> {
        Ok(Self {
            screen_name: screen_name.into(),
            status_id: Cursor::new(status_id)?,
        })
    }

    /// Storage identifier, `screen_name/status_id`
    pub fn id(&self) -> String {
        format!("{}/{}", self.screen_name, self.status_id)
    }

    pub fn status_url(&self) -> String {
        format!(
            "https://twitter.com/{}/status/{}",
            self.screen_name, self.status_id
        )
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.screen_name, self.status_id)
    }
}

/// How responses to a target are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlKind {
    /// Direct replies, found by searching for tweets addressed to the author
    Replies,

    /// Quote tweets, found by searching for the target's URL
    QuotedReplies,
}

impl CrawlKind {
    pub const ALL: [CrawlKind; 2] = [CrawlKind::Replies, CrawlKind::QuotedReplies];

    /// The search query for this kind of crawl
    pub fn query(&self, target: &Target) -> String {
        match self {
            Self::Replies => format!("to:{}", target.screen_name),
            Self::QuotedReplies => target.status_url(),
        }
    }

    /// Returns true if `status` responds to `target` in this way
    pub fn matches(&self, target: &Target, status: &Status) -> bool {
        let wanted = target.status_id.as_str();
        match self {
            Self::Replies => status.in_reply_to_status_id_str.as_deref() == Some(wanted),
            Self::QuotedReplies => status
                .quoted_status
                .as_ref()
                .is_some_and(|quoted| quoted.id_str == wanted),
        }
    }

    /// Watermark key for completed windows
    pub fn checkpoint_key(&self) -> &'static str {
        match self {
            Self::Replies => "latest_max_id",
            Self::QuotedReplies => "quote_latest_max_id",
        }
    }

    /// Key holding the upper bound of a suspended window
    pub fn resume_key(&self) -> String {
        format!("{}:resume", self.checkpoint_key())
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Replies => "replies",
            Self::QuotedReplies => "quoted-replies",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "replies" => Some(Self::Replies),
            "quoted-replies" => Some(Self::QuotedReplies),
            _ => None,
        }
    }
}

impl fmt::Display for CrawlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
