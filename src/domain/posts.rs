//! Post records as the rest of the application sees them.
//!
//! Summaries feed the list page; details feed the post page. Both are
//! snapshots of a CMS document and are never mutated after mapping.

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use super::error::DomainError;
use super::rich_text::RichTextNode;

/// `15 Mar 2021`
pub const DISPLAY_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day] [month repr:short] [year]");

const MAX_UID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub uid: String,
    pub first_publication_date: Option<OffsetDateTime>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetail {
    pub uid: String,
    pub first_publication_date: Option<OffsetDateTime>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub content: Vec<ContentBlock>,
}

/// One titled section of a post body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextNode>,
}

impl ContentBlock {
    pub fn new(heading: impl Into<String>, body: Vec<RichTextNode>) -> Self {
        Self {
            heading: heading.into(),
            body,
        }
    }
}

impl PostDetail {
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            uid: self.uid.clone(),
            first_publication_date: self.first_publication_date,
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            author: self.author.clone(),
        }
    }
}

pub fn format_display_date(date: OffsetDateTime) -> String {
    date.format(DISPLAY_DATE_FORMAT)
        .unwrap_or_else(|_| date.date().to_string())
}

/// Display string for an optional publication date; unpublished documents render blank.
pub fn display_date(date: Option<OffsetDateTime>) -> String {
    date.map(format_display_date).unwrap_or_default()
}

pub fn iso_date(date: Option<OffsetDateTime>) -> String {
    date.and_then(|value| {
        value
            .format(&time::format_description::well_known::Rfc3339)
            .ok()
    })
    .unwrap_or_default()
}

/// Post identifiers end up inside CMS query predicates and URL paths, so only
/// slug characters are accepted.
pub fn validate_uid(uid: &str) -> Result<(), DomainError> {
    if uid.is_empty() {
        return Err(DomainError::validation("post uid must not be empty"));
    }
    if uid.len() > MAX_UID_LEN {
        return Err(DomainError::validation(format!(
            "post uid exceeds {MAX_UID_LEN} characters"
        )));
    }
    let valid = uid
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if !valid {
        return Err(DomainError::validation(format!(
            "post uid `{uid}` contains characters outside [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}
