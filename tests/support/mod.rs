#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use http_body_util::BodyExt;
use lettera::{
    application::{
        chrome::{ChromeService, SiteIdentity},
        feed::FeedService,
        pagination::PageCursor,
        render::{FallbackMode, FallbackRenderer, PageRenderer},
        repos::{ContentRepo, PostsPage, RepoError},
    },
    domain::{
        posts::{ContentBlock, PostDetail, PostSummary},
        rich_text::RichTextNode,
    },
    infra::http::{HttpState, build_router},
    presentation::views::CommentWidget,
};
use time::macros::datetime;
use tower::ServiceExt;
use url::Url;

pub const ENDPOINT: &str = "https://spacetraveling.cdn.prismic.io/api/v2";

/// Serves a fixed set of result pages the way the CMS does, chaining them
/// through `next_page` URLs on the CMS origin.
pub struct MemoryRepo {
    pages: Vec<Vec<PostDetail>>,
    page_fetches: AtomicUsize,
    lookups: AtomicUsize,
    healthy: bool,
    failing: bool,
}

impl MemoryRepo {
    pub fn new(pages: Vec<Vec<PostDetail>>) -> Self {
        Self {
            pages,
            page_fetches: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            healthy: true,
            failing: false,
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Every content request fails the way an unreachable CMS does.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn outage(&self) -> Result<(), RepoError> {
        if self.failing {
            Err(RepoError::Status { status: 503 })
        } else {
            Ok(())
        }
    }

    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn page(&self, index: usize) -> PostsPage<PostSummary> {
        let items = self
            .pages
            .get(index)
            .map(|posts| posts.iter().map(PostDetail::summary).collect())
            .unwrap_or_default();
        let next_page = (index + 1 < self.pages.len()).then(|| page_cursor(index + 2));
        PostsPage { items, next_page }
    }
}

/// Cursor for the 1-based result page `page`.
pub fn page_cursor(page: usize) -> PageCursor {
    PageCursor::from_next_page(&format!("{ENDPOINT}/documents/search?ref=main&page={page}"))
        .expect("cursor url")
}

#[async_trait]
impl ContentRepo for MemoryRepo {
    async fn first_page(&self) -> Result<PostsPage<PostSummary>, RepoError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        self.outage()?;
        Ok(self.page(0))
    }

    async fn page_at(&self, cursor: &PageCursor) -> Result<PostsPage<PostSummary>, RepoError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        self.outage()?;
        let page = cursor
            .url()
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .ok_or(RepoError::Status { status: 400 })?;
        if page == 0 || page > self.pages.len() {
            return Err(RepoError::Status { status: 404 });
        }
        Ok(self.page(page - 1))
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<PostDetail>, RepoError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.outage()?;
        Ok(self
            .pages
            .iter()
            .flatten()
            .find(|post| post.uid == uid)
            .cloned())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        if self.healthy {
            Ok(())
        } else {
            Err(RepoError::transport("connection refused"))
        }
    }
}

pub fn post(uid: &str, title: &str) -> PostDetail {
    PostDetail {
        uid: uid.to_string(),
        first_publication_date: Some(datetime!(2021-03-15 19:25:28 UTC)),
        title: title.to_string(),
        subtitle: format!("Tudo sobre {title}"),
        author: "Joseph Oliveira".to_string(),
        banner_url: Some("https://images.prismic.io/banner.png".to_string()),
        content: vec![
            ContentBlock::new(
                "Proin et varius",
                vec![RichTextNode::paragraph("Lorem ipsum dolor sit amet")],
            ),
            ContentBlock::new(
                "Cras laoreet",
                vec![RichTextNode::paragraph("Nullam dolor sapien, vulputate eu")],
            ),
        ],
    }
}

/// Three posts split into pages of two and one.
pub fn sample_repo() -> Arc<MemoryRepo> {
    Arc::new(MemoryRepo::new(vec![
        vec![
            post("como-utilizar-hooks", "Como utilizar Hooks"),
            post("criando-um-app-cra-do-zero", "Criando um app CRA do zero"),
        ],
        vec![post("mapas-com-react", "Mapas com React")],
    ]))
}

pub fn comments() -> CommentWidget {
    CommentWidget {
        script_src: "https://utteranc.es/client.js".to_string(),
        repo: "joseph/spacetraveling-comments".to_string(),
        issue_term: "pathname".to_string(),
        theme: "github-dark".to_string(),
    }
}

pub fn renderer(repo: Arc<MemoryRepo>, comments: Option<CommentWidget>) -> PageRenderer {
    let feed = FeedService::new(repo, Url::parse(ENDPOINT).expect("endpoint"), comments);
    let chrome = ChromeService::new(SiteIdentity {
        title: "spacetraveling".to_string(),
        description: "Blog sobre desenvolvimento".to_string(),
        public_url: "https://blog.example.com".to_string(),
        lang: "pt-BR".to_string(),
        toolbar_repo: Some("spacetraveling".to_string()),
    });
    PageRenderer::new(feed, chrome)
}

pub fn app(repo: Arc<MemoryRepo>, mode: FallbackMode) -> Router {
    let renderer = renderer(repo, Some(comments()));
    let fallback = FallbackRenderer::new(renderer.clone(), mode);
    build_router(HttpState::new(renderer, fallback))
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(
        app,
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
