use std::sync::Arc;

use askama::Template;
use axum::response::Response;
use datastar::prelude::ElementPatchMode;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::application::error::HttpError;
use crate::application::pagination::{PageCursor, PaginationError, PostListState};
use crate::application::repos::{ContentRepo, RepoError};
use crate::application::stream::StreamBuilder;
use crate::domain::posts::{self, PostDetail, PostSummary};
use crate::domain::reading_time;
use crate::domain::rich_text;
use crate::presentation::views::{
    CommentWidget, HomeContext, LoadMoreContext, LoadMoreLink, LoadMoreTemplate, PostCard,
    PostCardsAppendTemplate, PostDetailContext, PostSectionView, TemplateRenderError,
};

pub const POST_LIST_SELECTOR: &str = "#post-list";
pub const LOAD_MORE_SELECTOR: &str = "#load-more-container";

#[derive(Clone)]
pub struct AppendPayload {
    pub cards: Vec<PostCard>,
    pub load_more: Option<LoadMoreLink>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    InvalidCursor(#[from] PaginationError),
    #[error(transparent)]
    Cms(#[from] RepoError),
}

#[derive(Clone)]
pub struct FeedService {
    content: Arc<dyn ContentRepo>,
    cursor_origin: Url,
    comments: Option<CommentWidget>,
}

impl FeedService {
    pub fn new(
        content: Arc<dyn ContentRepo>,
        cursor_origin: Url,
        comments: Option<CommentWidget>,
    ) -> Self {
        Self {
            content,
            cursor_origin,
            comments,
        }
    }

    pub async fn home_context(&self) -> Result<HomeContext, FeedError> {
        let state = PostListState::from_page(self.content.first_page().await?);
        let (summaries, next_page) = state.into_parts();
        let posts: Vec<PostCard> = summaries.iter().map(summary_to_card).collect();

        Ok(HomeContext {
            has_results: !posts.is_empty(),
            posts,
            load_more: next_page.map(|cursor| LoadMoreLink::live(&cursor.encode())),
        })
    }

    /// Next page of cards for a token previously handed out by this service.
    pub async fn append_payload(&self, token: &str) -> Result<AppendPayload, FeedError> {
        let cursor = PageCursor::decode(token, &self.cursor_origin)?;
        let page = self.content.page_at(&cursor).await?;
        debug!(
            target = "lettera::application::feed",
            appended = page.items.len(),
            exhausted = page.next_page.is_none(),
            "loaded additional posts"
        );

        Ok(AppendPayload {
            cards: page.items.iter().map(summary_to_card).collect(),
            load_more: page
                .next_page
                .map(|cursor| LoadMoreLink::live(&cursor.encode())),
        })
    }

    /// Detail view for `uid`, or `None` when the uid is malformed or unknown.
    pub async fn post_detail(&self, uid: &str) -> Result<Option<PostDetailContext>, FeedError> {
        if posts::validate_uid(uid).is_err() {
            return Ok(None);
        }

        let Some(post) = self.content.find_by_uid(uid).await? else {
            return Ok(None);
        };

        Ok(Some(self.build_post_context(post)))
    }

    /// Every post uid, following `next_page` until the listing is exhausted.
    pub async fn static_paths(&self) -> Result<Vec<String>, FeedError> {
        Ok(self
            .listing_pages()
            .await?
            .into_iter()
            .flatten()
            .map(|post| post.uid)
            .collect())
    }

    /// The listing as the CMS pages it, one entry per result page.
    pub async fn listing_pages(&self) -> Result<Vec<Vec<PostSummary>>, FeedError> {
        let mut state = PostListState::from_page(self.content.first_page().await?);
        let mut pages = vec![state.posts().to_vec()];
        while state.has_more() {
            let seen = state.posts().len();
            state.load_more(self.content.as_ref()).await?;
            pages.push(state.posts()[seen..].to_vec());
        }
        Ok(pages)
    }

    pub async fn health(&self) -> Result<(), FeedError> {
        self.content.health_check().await.map_err(FeedError::from)
    }

    fn build_post_context(&self, post: PostDetail) -> PostDetailContext {
        let reading_minutes = reading_time::reading_time_minutes(&post.content);
        let sections = post
            .content
            .iter()
            .map(|block| PostSectionView {
                heading: block.heading.clone(),
                body_html: rich_text::as_html(&block.body),
            })
            .collect();

        PostDetailContext {
            published: posts::display_date(post.first_publication_date),
            iso_date: posts::iso_date(post.first_publication_date),
            uid: post.uid,
            title: post.title,
            subtitle: post.subtitle,
            author: post.author,
            banner_url: post.banner_url,
            reading_minutes,
            sections,
            comments: self.comments.clone(),
        }
    }
}

pub fn post_href(uid: &str) -> String {
    format!("/post/{uid}")
}

fn summary_to_card(summary: &PostSummary) -> PostCard {
    PostCard {
        uid: summary.uid.clone(),
        href: post_href(&summary.uid),
        title: summary.title.clone(),
        subtitle: summary.subtitle.clone(),
        author: summary.author.clone(),
        published: posts::display_date(summary.first_publication_date),
        iso_date: posts::iso_date(summary.first_publication_date),
    }
}

/// Listing for exported page `page` (1-based): every card up to that page,
/// linking to the next exported page while one exists.
pub fn exported_listing(pages: &[Vec<PostSummary>], page: usize) -> HomeContext {
    let shown = page.clamp(1, pages.len().max(1));
    let posts: Vec<PostCard> = pages
        .iter()
        .take(shown)
        .flatten()
        .map(summary_to_card)
        .collect();

    HomeContext {
        has_results: !posts.is_empty(),
        posts,
        load_more: (shown < pages.len()).then(|| LoadMoreLink::exported(shown + 1)),
    }
}

fn render_append_parts(payload: AppendPayload) -> Result<(Option<String>, String), HttpError> {
    let AppendPayload { cards, load_more } = payload;

    let cards_html = if cards.is_empty() {
        None
    } else {
        Some(
            PostCardsAppendTemplate { posts: cards }
                .render()
                .map_err(|err| {
                    HttpError::from(TemplateRenderError::new(
                        "application::feed::render_append_parts",
                        "Template rendering failed",
                        err,
                    ))
                })?,
        )
    };

    let load_more_html = LoadMoreTemplate {
        view: LoadMoreContext { load_more },
    }
    .render()
    .map_err(|err| {
        HttpError::from(TemplateRenderError::new(
            "application::feed::render_append_parts",
            "Template rendering failed",
            err,
        ))
    })?;

    Ok((cards_html, load_more_html))
}

/// SSE stream appending cards to the list and replacing the affordance.
pub fn build_datastar_append_response(payload: AppendPayload) -> Result<Response, HttpError> {
    let (cards_html, load_more_html) = render_append_parts(payload)?;

    let mut stream = StreamBuilder::new();
    if let Some(html) = cards_html {
        stream.push_patch(html, POST_LIST_SELECTOR, ElementPatchMode::Append);
    }
    stream.push_patch(load_more_html, LOAD_MORE_SELECTOR, ElementPatchMode::Inner);
    stream.push_signals(r#"{"postsLoading": false}"#);

    Ok(stream.into_response())
}

/// Plain HTML fallback for clients without datastar.
pub fn build_append_fragment(payload: AppendPayload) -> Result<String, HttpError> {
    let (cards_html, load_more_html) = render_append_parts(payload)?;
    let mut html = cards_html.unwrap_or_default();
    html.push_str(&load_more_html);
    Ok(html)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::macros::datetime;

    use super::*;
    use crate::application::repos::PostsPage;
    use crate::domain::posts::ContentBlock;
    use crate::domain::rich_text::RichTextNode;

    const ENDPOINT: &str = "https://blog.cdn.prismic.io/api/v2";

    fn cursor(page: usize) -> PageCursor {
        PageCursor::from_next_page(&format!("{ENDPOINT}/documents/search?page={page}"))
            .expect("cursor")
    }

    fn summary(uid: &str) -> PostSummary {
        PostSummary {
            uid: uid.to_string(),
            first_publication_date: Some(datetime!(2021-03-15 19:25:28 UTC)),
            title: format!("Title {uid}"),
            subtitle: "Subtitle".to_string(),
            author: "Joseph Oliveira".to_string(),
        }
    }

    struct TwoPages {
        lookups: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContentRepo for TwoPages {
        async fn first_page(&self) -> Result<PostsPage<PostSummary>, RepoError> {
            Ok(PostsPage {
                items: vec![summary("como-utilizar-hooks")],
                next_page: Some(cursor(2)),
            })
        }

        async fn page_at(&self, cursor: &PageCursor) -> Result<PostsPage<PostSummary>, RepoError> {
            assert!(cursor.url().as_str().ends_with("page=2"));
            Ok(PostsPage {
                items: vec![summary("criando-um-app-cra-do-zero")],
                next_page: None,
            })
        }

        async fn find_by_uid(&self, uid: &str) -> Result<Option<PostDetail>, RepoError> {
            self.lookups.lock().expect("lookups").push(uid.to_string());
            if uid != "como-utilizar-hooks" {
                return Ok(None);
            }
            Ok(Some(PostDetail {
                uid: uid.to_string(),
                first_publication_date: Some(datetime!(2021-03-15 19:25:28 UTC)),
                title: "Como utilizar Hooks".to_string(),
                subtitle: "Pensando em sincronização".to_string(),
                author: "Joseph Oliveira".to_string(),
                banner_url: Some("https://images.prismic.io/banner.png".to_string()),
                content: vec![ContentBlock::new(
                    "Proin et varius",
                    vec![RichTextNode::paragraph("Lorem <ipsum> dolor")],
                )],
            }))
        }

        async fn health_check(&self) -> Result<(), RepoError> {
            Ok(())
        }
    }

    fn service(comments: Option<CommentWidget>) -> (FeedService, Arc<TwoPages>) {
        let repo = Arc::new(TwoPages {
            lookups: Mutex::new(Vec::new()),
        });
        let origin = Url::parse(ENDPOINT).expect("origin");
        (FeedService::new(repo.clone(), origin, comments), repo)
    }

    #[tokio::test]
    async fn home_context_exposes_cursor_token() {
        let (feed, _) = service(None);
        let context = feed.home_context().await.expect("home");

        assert!(context.has_results);
        assert_eq!(context.posts[0].href, "/post/como-utilizar-hooks");
        assert_eq!(context.posts[0].published, "15 Mar 2021");
        let link = context.load_more.expect("load more link");
        let token = link
            .fetch_url
            .strip_prefix("/ui/posts?cursor=")
            .expect("live fetch url");
        assert!(link.page_href.is_none());
        assert_eq!(
            PageCursor::decode(token, &Url::parse(ENDPOINT).expect("origin")).expect("decode"),
            cursor(2)
        );
    }

    #[tokio::test]
    async fn append_payload_follows_token_and_clears_cursor() {
        let (feed, _) = service(None);
        let payload = feed
            .append_payload(&cursor(2).encode())
            .await
            .expect("append");

        assert_eq!(payload.cards.len(), 1);
        assert_eq!(payload.cards[0].uid, "criando-um-app-cra-do-zero");
        assert!(payload.load_more.is_none());
    }

    #[tokio::test]
    async fn append_payload_rejects_foreign_cursor() {
        let (feed, _) = service(None);
        let foreign = PageCursor::from_next_page("https://attacker.example/next")
            .expect("cursor")
            .encode();
        let err = feed.append_payload(&foreign).await.err().expect("rejected");
        assert!(matches!(err, FeedError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn post_detail_renders_reading_time_and_escaped_body() {
        let widget = CommentWidget {
            script_src: "https://utteranc.es/client.js".to_string(),
            repo: "owner/blog-comments".to_string(),
            issue_term: "pathname".to_string(),
            theme: "github-dark".to_string(),
        };
        let (feed, _) = service(Some(widget.clone()));
        let detail = feed
            .post_detail("como-utilizar-hooks")
            .await
            .expect("detail")
            .expect("known post");

        assert_eq!(detail.reading_minutes, 1);
        assert_eq!(detail.published, "15 Mar 2021");
        assert!(detail.sections[0].body_html.contains("Lorem &lt;ipsum&gt; dolor"));
        assert_eq!(detail.comments, Some(widget));
    }

    #[tokio::test]
    async fn malformed_uid_never_reaches_the_cms() {
        let (feed, repo) = service(None);
        assert!(feed.post_detail("../etc/passwd").await.expect("ok").is_none());
        assert!(repo.lookups.lock().expect("lookups").is_empty());
    }

    #[tokio::test]
    async fn static_paths_walk_every_page() {
        let (feed, _) = service(None);
        let paths = feed.static_paths().await.expect("paths");
        assert_eq!(paths, ["como-utilizar-hooks", "criando-um-app-cra-do-zero"]);
    }

    #[tokio::test]
    async fn listing_pages_keep_cms_page_boundaries() {
        let (feed, _) = service(None);
        let pages = feed.listing_pages().await.expect("pages");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0][0].uid, "como-utilizar-hooks");
        assert_eq!(pages[1][0].uid, "criando-um-app-cra-do-zero");
    }

    #[test]
    fn exported_listing_accumulates_and_links_forward() {
        let pages = vec![vec![summary("a"), summary("b")], vec![summary("c")], vec![summary("d")]];

        let first = exported_listing(&pages, 1);
        assert_eq!(first.posts.len(), 2);
        assert_eq!(first.load_more, Some(LoadMoreLink::exported(2)));

        let second = exported_listing(&pages, 2);
        assert_eq!(second.posts.len(), 3);
        assert_eq!(
            second.load_more.map(|link| link.fetch_url),
            Some("/page/3/fragment.html".to_string())
        );

        let last = exported_listing(&pages, 3);
        assert_eq!(last.posts.len(), 4);
        assert!(last.load_more.is_none());
    }

    #[test]
    fn exported_listing_of_empty_site_has_no_link() {
        let listing = exported_listing(&[], 1);
        assert!(!listing.has_results);
        assert!(listing.load_more.is_none());
    }

    #[test]
    fn fragment_without_cursor_drops_the_button() {
        let html = build_append_fragment(AppendPayload {
            cards: vec![summary_to_card(&summary("a"))],
            load_more: None,
        })
        .expect("fragment");
        assert!(html.contains("/post/a"));
        assert!(!html.contains("Carregar mais posts"));
    }
}
