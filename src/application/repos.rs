//! Repository traits describing content adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::{PageCursor, PaginationError};
use crate::domain::posts::{PostDetail, PostSummary};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("content service request failed: {0}")]
    Transport(String),
    #[error("content service responded with status {status}")]
    Status { status: u16 },
    #[error("content service payload could not be decoded: {0}")]
    Decode(String),
    #[error("content service has no master ref")]
    MissingRef,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct PostsPage<T> {
    pub items: Vec<T>,
    pub next_page: Option<PageCursor>,
}

#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// First page of posts, newest first.
    async fn first_page(&self) -> Result<PostsPage<PostSummary>, RepoError>;

    /// The page a previous response pointed at.
    async fn page_at(&self, cursor: &PageCursor) -> Result<PostsPage<PostSummary>, RepoError>;

    async fn find_by_uid(&self, uid: &str) -> Result<Option<PostDetail>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}
