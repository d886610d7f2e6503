use crate::application::error::{ErrorReport, HttpError};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<String, TemplateRenderError> {
    template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
    })
}

pub fn html_response(html: String, status: StatusCode) -> Response {
    (status, Html(html)).into_response()
}

/// Wrap an already rendered not-found document in a 404 response.
pub fn not_found_response(html: String) -> Response {
    let mut response = html_response(html, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Wrap an already rendered error document in a 502 response.
pub fn unavailable_response(html: String, detail: impl Into<String>) -> Response {
    let mut response = html_response(html, StatusCode::BAD_GATEWAY);
    ErrorReport::from_message(
        "presentation::views::unavailable_response",
        StatusCode::BAD_GATEWAY,
        detail,
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
    pub logo_src: String,
}

#[derive(Clone)]
pub struct HeadView {
    pub lang: String,
    pub toolbar_script: Option<String>,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub head: HeadView,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn with_canonical(self, canonical: String) -> Self {
        Self {
            meta: self.meta.with_canonical(canonical),
            ..self
        }
    }

    pub fn with_meta(self, meta: PageMetaView) -> Self {
        Self { meta, ..self }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub head: HeadView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            head: chrome.head,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
    pub canonical: String,
}

impl PageMetaView {
    pub fn with_canonical(self, canonical: String) -> Self {
        Self { canonical, ..self }
    }

    pub fn with_content(self, title: String, description: String) -> Self {
        Self {
            title,
            description,
            ..self
        }
    }
}

#[derive(Clone, Debug)]
pub struct PostCard {
    pub uid: String,
    pub href: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub published: String,
    pub iso_date: String,
}

/// Where the "load more" affordance fetches the next page from.
///
/// A served site asks the live endpoint for an append stream. An exported
/// site has no server, so the button fetches a pre-rendered fragment and
/// falls back to a plain link to the page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadMoreLink {
    pub fetch_url: String,
    pub page_href: Option<String>,
}

impl LoadMoreLink {
    pub fn live(token: &str) -> Self {
        Self {
            fetch_url: format!("/ui/posts?cursor={token}"),
            page_href: None,
        }
    }

    pub fn exported(page: usize) -> Self {
        Self {
            fetch_url: format!("/page/{page}/fragment.html"),
            page_href: Some(format!("/page/{page}/")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HomeContext {
    pub posts: Vec<PostCard>,
    pub has_results: bool,
    pub load_more: Option<LoadMoreLink>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<HomeContext>,
}

pub struct LoadMoreContext {
    pub load_more: Option<LoadMoreLink>,
}

/// The list and its affordance without the surrounding document.
pub struct ListingFragmentView {
    pub content: HomeContext,
}

#[derive(Template)]
#[template(path = "partials/listing_fragment.html")]
pub struct ListingFragmentTemplate {
    pub view: ListingFragmentView,
}

#[derive(Template)]
#[template(path = "partials/load_more.html")]
pub struct LoadMoreTemplate {
    pub view: LoadMoreContext,
}

#[derive(Template)]
#[template(path = "partials/post_cards_append.html")]
pub struct PostCardsAppendTemplate {
    pub posts: Vec<PostCard>,
}

/// Script-tag embed for the utterances comment service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentWidget {
    pub script_src: String,
    pub repo: String,
    pub issue_term: String,
    pub theme: String,
}

pub struct PostSectionView {
    pub heading: String,
    pub body_html: String,
}

pub struct PostDetailContext {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub published: String,
    pub iso_date: String,
    pub banner_url: Option<String>,
    pub reading_minutes: u32,
    pub sections: Vec<PostSectionView>,
    pub comments: Option<CommentWidget>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

/// Shown while a post that was not pre-rendered is being resolved.
pub struct LoadingView {
    pub uid: String,
    pub refresh_seconds: u32,
}

#[derive(Template)]
#[template(path = "loading.html")]
pub struct LoadingTemplate {
    pub view: LayoutContext<LoadingView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist. Try returning to the homepage to keep reading.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            title: "Content Unavailable".to_string(),
            message: "The content service could not be reached. Reload the page to try again.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
