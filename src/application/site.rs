//! Static export of every listed post, the paged home listing and the
//! not-found page.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::{TryStreamExt, stream};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::feed::{self, FeedError};
use crate::application::render::{PageRenderError, PageRenderer};
use crate::domain::posts::PostSummary;

const MAX_CONCURRENCY: usize = 32;

#[derive(Debug, Error)]
pub enum SiteBuildError {
    #[error("failed to list posts: {0}")]
    Listing(#[from] FeedError),
    #[error("failed to render `{page}`: {source}")]
    Render {
        page: String,
        #[source]
        source: PageRenderError,
    },
    #[error("failed to write `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub listing_pages: usize,
    pub posts_written: usize,
    pub posts_skipped: usize,
}

pub struct SiteBuilder {
    renderer: PageRenderer,
}

impl SiteBuilder {
    pub fn new(renderer: PageRenderer) -> Self {
        Self { renderer }
    }

    pub fn clamp_concurrency(requested: usize) -> usize {
        requested.clamp(1, MAX_CONCURRENCY)
    }

    pub async fn build(&self, out: &Path, concurrency: usize) -> Result<BuildReport, SiteBuildError> {
        let concurrency = Self::clamp_concurrency(concurrency);

        let pages = self.renderer.feed().listing_pages().await?;
        let listing_pages = pages.len();
        self.write_listing(out, &pages).await?;

        let not_found = self
            .renderer
            .render_not_found()
            .map_err(|source| SiteBuildError::Render {
                page: "/404".to_string(),
                source,
            })?;
        write_page(&out.join("404.html"), &not_found).await?;

        let uids: Vec<String> = pages
            .into_iter()
            .flatten()
            .map(|post| post.uid)
            .collect();
        let written = Arc::new(AtomicUsize::new(0));
        let skipped = Arc::new(AtomicUsize::new(0));

        stream::iter(uids.into_iter().map(Ok::<_, SiteBuildError>))
            .try_for_each_concurrent(Some(concurrency), |uid| {
                let written = Arc::clone(&written);
                let skipped = Arc::clone(&skipped);
                async move {
                    let rendered = self.renderer.render_post(&uid).await.map_err(|source| {
                        SiteBuildError::Render {
                            page: format!("/post/{uid}"),
                            source,
                        }
                    })?;

                    match rendered {
                        Some(html) => {
                            let path = out.join("post").join(&uid).join("index.html");
                            write_page(&path, &html).await?;
                            written.fetch_add(1, Ordering::Relaxed);
                        }
                        None => {
                            warn!(
                                target = "lettera::build",
                                uid = %uid,
                                "post listed but not found by uid"
                            );
                            skipped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Ok(())
                }
            })
            .await?;

        let report = BuildReport {
            listing_pages: listing_pages.max(1),
            posts_written: written.load(Ordering::Relaxed),
            posts_skipped: skipped.load(Ordering::Relaxed),
        };
        info!(
            target = "lettera::build",
            listing_pages = report.listing_pages,
            posts = report.posts_written,
            skipped = report.posts_skipped,
            out = %out.display(),
            "static build finished"
        );
        Ok(report)
    }

    /// `index.html` holds the first CMS page. Page `n` of the listing lands at
    /// `page/{n}/index.html` for plain navigation and `page/{n}/fragment.html`
    /// for in-place swaps, each carrying every card up to that page.
    async fn write_listing(
        &self,
        out: &Path,
        pages: &[Vec<PostSummary>],
    ) -> Result<(), SiteBuildError> {
        let total = pages.len().max(1);
        for page in 1..=total {
            let content = feed::exported_listing(pages, page);
            let route = if page == 1 {
                "/".to_string()
            } else {
                format!("/page/{page}/")
            };
            let render_error = |source| SiteBuildError::Render {
                page: route.clone(),
                source,
            };

            if page == 1 {
                let html = self
                    .renderer
                    .render_listing(content, &route)
                    .map_err(render_error)?;
                write_page(&out.join("index.html"), &html).await?;
                continue;
            }

            let dir = out.join("page").join(page.to_string());
            let fragment = self
                .renderer
                .render_listing_fragment(content.clone())
                .map_err(render_error)?;
            let html = self
                .renderer
                .render_listing(content, &route)
                .map_err(render_error)?;
            write_page(&dir.join("index.html"), &html).await?;
            write_page(&dir.join("fragment.html"), &fragment).await?;
        }
        Ok(())
    }
}

async fn write_page(path: &Path, html: &str) -> Result<(), SiteBuildError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| SiteBuildError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, html)
        .await
        .map_err(|source| SiteBuildError::Io {
            path: path.to_path_buf(),
            source,
        })
}
