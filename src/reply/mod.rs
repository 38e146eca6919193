//! Reply records
//!
//! Converts matched statuses into the rows kept in the reply table: the text
//! with user mentions removed, the author, and a zero-padded status id so
//! that lexical order in storage equals numeric order.

use crate::crawler::{Status, UserMention};
use crate::target::{CrawlKind, Target};

/// Width status ids are left-padded to in storage
pub const STATUS_ID_WIDTH: usize = 32;

/// A collected reply, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRecord {
    /// Target identifier (`screen_name/status_id`)
    pub target: String,

    /// Zero-padded status id
    pub status_id: String,

    /// Text without user mentions
    pub full_text: String,

    /// Author screen name (empty if the payload had no user)
    pub author: String,

    /// How the reply was found
    pub kind: CrawlKind,
}

impl ReplyRecord {
    /// Builds a record from a matched status
    ///
    /// Returns `None` when nothing but mentions and whitespace remains.
    pub fn from_status(target: &Target, kind: CrawlKind, status: &Status) -> Option<Self> {
        let stripped = strip_mentions(status.body(), &status.entities.user_mentions);
        if stripped.trim().is_empty() {
            return None;
        }

        Some(Self {
            target: target.id(),
            status_id: pad_status_id(&status.id_str),
            full_text: stripped,
            author: status.author().unwrap_or_default().to_string(),
            kind,
        })
    }

    /// The status id without padding
    pub fn display_id(&self) -> &str {
        let trimmed = self.status_id.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

/// Left-pads a status id with zeros to `STATUS_ID_WIDTH`
pub fn pad_status_id(id: &str) -> String {
    format!("{:0>width$}", id, width = STATUS_ID_WIDTH)
}

/// Removes mentions from `text`
///
/// Each mention covers the characters `[start, end)`; the character right
/// after a mention (normally the separating space) is removed with it.
pub fn strip_mentions(text: &str, mentions: &[UserMention]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<[usize; 2]> = mentions.iter().map(|m| m.indices).collect();
    spans.sort_unstable();

    let mut out = String::with_capacity(text.len());
    let mut position = 0;
    for [start, end] in spans {
        let start = start.min(chars.len());
        if start > position {
            out.extend(&chars[position..start]);
        }
        position = position.max(end.saturating_add(1).min(chars.len()));
    }
    if position < chars.len() {
        out.extend(&chars[position..]);
    }

    out
}
