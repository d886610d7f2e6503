//! Cursor pagination over the CMS result set.
//!
//! The CMS hands back `next_page` as an absolute URL. It is kept opaque: the
//! list state only stores it and replays it. When it travels through a browser
//! it is wrapped in a URL-safe token, and decoding checks that the URL still
//! points at the configured CMS origin.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;
use url::Url;

use crate::application::repos::{ContentRepo, PostsPage, RepoError};
use crate::domain::posts::PostSummary;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("cursor points outside the content service: {0}")]
    ForeignOrigin(String),
}

/// Location of the next result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    url: Url,
}

impl PageCursor {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// Parse the raw `next_page` value returned by the CMS.
    pub fn from_next_page(raw: &str) -> Result<Self, PaginationError> {
        Url::parse(raw)
            .map(Self::new)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.url.as_str())
    }

    pub fn decode(token: &str, origin: &Url) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let raw = String::from_utf8(bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let cursor = Self::from_next_page(&raw)?;

        if cursor.url.origin() != origin.origin() {
            return Err(PaginationError::ForeignOrigin(cursor.url.to_string()));
        }

        Ok(cursor)
    }
}

/// Ordered post list plus the cursor for the page after it.
///
/// Once the cursor is gone the list is complete and `load_more` stops
/// talking to the CMS.
#[derive(Debug, Clone, Default)]
pub struct PostListState {
    posts: Vec<PostSummary>,
    next_page: Option<PageCursor>,
}

impl PostListState {
    pub fn from_page(page: PostsPage<PostSummary>) -> Self {
        Self {
            posts: page.items,
            next_page: page.next_page,
        }
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn next_page(&self) -> Option<&PageCursor> {
        self.next_page.as_ref()
    }

    /// Whether the "load more" affordance should be shown.
    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    /// Fetch the page at the stored cursor and append it.
    ///
    /// Returns the number of appended posts. On error the state is left as it
    /// was, so the same cursor can be retried.
    pub async fn load_more(&mut self, repo: &dyn ContentRepo) -> Result<usize, RepoError> {
        let Some(cursor) = self.next_page.as_ref() else {
            return Ok(0);
        };

        let page = repo.page_at(cursor).await?;
        let appended = page.items.len();
        self.posts.extend(page.items);
        self.next_page = page.next_page;
        Ok(appended)
    }

    pub fn into_parts(self) -> (Vec<PostSummary>, Option<PageCursor>) {
        (self.posts, self.next_page)
    }
}
