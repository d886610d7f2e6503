//! Full-document rendering shared by the HTTP surface and the static build.

mod fallback;
mod runtime;

pub use fallback::{FallbackMode, FallbackRenderer, Resolution};
pub use runtime::{InFlightError, InFlightRenders, RenderGuard};

use thiserror::Error;

use crate::application::chrome::ChromeService;
use crate::application::error::HttpError;
use crate::application::feed::{FeedError, FeedService, post_href};
use crate::presentation::views::{
    ErrorPageView, ErrorTemplate, HomeContext, IndexTemplate, LayoutContext,
    ListingFragmentTemplate, ListingFragmentView, LoadingTemplate, LoadingView, PostTemplate,
    TemplateRenderError, render_template,
};

/// Seconds the loading placeholder waits before reloading itself.
pub const LOADING_REFRESH_SECONDS: u32 = 2;

#[derive(Debug, Error)]
pub enum PageRenderError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Template(#[from] TemplateRenderError),
}

impl From<PageRenderError> for HttpError {
    fn from(err: PageRenderError) -> Self {
        match err {
            PageRenderError::Feed(err) => HttpError::from(err),
            PageRenderError::Template(err) => HttpError::from(err),
        }
    }
}

#[derive(Clone)]
pub struct PageRenderer {
    feed: FeedService,
    chrome: ChromeService,
}

impl PageRenderer {
    pub fn new(feed: FeedService, chrome: ChromeService) -> Self {
        Self { feed, chrome }
    }

    pub fn feed(&self) -> &FeedService {
        &self.feed
    }

    pub async fn render_index(&self) -> Result<String, PageRenderError> {
        let content = self.feed.home_context().await?;
        self.render_listing(content, "/")
    }

    /// Home page shell around an already assembled listing served at `path`.
    pub fn render_listing(
        &self,
        content: HomeContext,
        path: &str,
    ) -> Result<String, PageRenderError> {
        let chrome = self.chrome.for_path(path);
        Ok(render_template(IndexTemplate {
            view: LayoutContext::new(chrome, content),
        })?)
    }

    /// The list and its affordance without the page shell, for in-place swaps.
    pub fn render_listing_fragment(
        &self,
        content: HomeContext,
    ) -> Result<String, PageRenderError> {
        Ok(render_template(ListingFragmentTemplate {
            view: ListingFragmentView { content },
        })?)
    }

    /// `None` when the CMS has no post with this uid.
    pub async fn render_post(&self, uid: &str) -> Result<Option<String>, PageRenderError> {
        let Some(content) = self.feed.post_detail(uid).await? else {
            return Ok(None);
        };

        let chrome = self.chrome.for_path(&post_href(uid));
        let meta = chrome.meta.clone().with_content(
            format!("{} | {}", content.title, self.chrome.identity().title),
            content.subtitle.clone(),
        );
        let html = render_template(PostTemplate {
            view: LayoutContext::new(chrome.with_meta(meta), content),
        })?;
        Ok(Some(html))
    }

    pub fn render_loading(&self, uid: &str) -> Result<String, PageRenderError> {
        let chrome = self.chrome.for_path(&post_href(uid));
        Ok(render_template(LoadingTemplate {
            view: LayoutContext::new(
                chrome,
                LoadingView {
                    uid: uid.to_string(),
                    refresh_seconds: LOADING_REFRESH_SECONDS,
                },
            ),
        })?)
    }

    pub fn render_not_found(&self) -> Result<String, PageRenderError> {
        self.render_error(ErrorPageView::not_found(), "/404")
    }

    pub fn render_unavailable(&self, uid: &str) -> Result<String, PageRenderError> {
        self.render_error(ErrorPageView::unavailable(), &post_href(uid))
    }

    fn render_error(&self, view: ErrorPageView, path: &str) -> Result<String, PageRenderError> {
        let chrome = self.chrome.for_path(path);
        let meta = chrome.meta.clone().with_content(
            format!("{} | {}", view.title, self.chrome.identity().title),
            view.message.clone(),
        );
        Ok(render_template(ErrorTemplate {
            view: LayoutContext::new(chrome.with_meta(meta), view),
        })?)
    }
}
