//! HTTP adapter for the headless CMS document API.

mod model;

use std::num::NonZeroU32;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::application::pagination::{PageCursor, PaginationError};
use crate::application::repos::{ContentRepo, PostsPage, RepoError};
use crate::config::CmsSettings;
use crate::domain::posts::{PostDetail, PostSummary};
use crate::infra::error::InfraError;

use model::{ApiRoot, RawDocument, SearchResponse};

const METRIC_CMS_REQUESTS: &str = "lettera_cms_requests_total";
const METRIC_CMS_REQUEST_MS: &str = "lettera_cms_request_ms";
const ACCESS_TOKEN_PARAM: &str = "access_token";
const NEWEST_FIRST: &str = "[document.first_publication_date desc]";

#[derive(Clone)]
pub struct CmsClient {
    http: Client,
    endpoint: Url,
    search_endpoint: Url,
    access_token: Option<String>,
    document_type: String,
    page_size: NonZeroU32,
}

impl CmsClient {
    pub fn new(settings: &CmsSettings) -> Result<Self, InfraError> {
        let http = Client::builder()
            .user_agent(concat!("lettera/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        let mut search_endpoint = settings.endpoint.clone();
        search_endpoint
            .path_segments_mut()
            .map_err(|_| InfraError::configuration("cms.endpoint cannot carry a path"))?
            .pop_if_empty()
            .extend(["documents", "search"]);

        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            search_endpoint,
            access_token: settings.access_token.clone(),
            document_type: settings.document_type.clone(),
            page_size: settings.page_size,
        })
    }

    /// Origin every pagination cursor must stay on.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn authorize(&self, url: &mut Url) {
        if let Some(token) = self.access_token.as_deref() {
            let present = url.query_pairs().any(|(key, _)| key == ACCESS_TOKEN_PARAM);
            if !present {
                url.query_pairs_mut().append_pair(ACCESS_TOKEN_PARAM, token);
            }
        }
    }

    /// Cursors travel through browsers; the token is re-added on replay.
    fn strip_access_token(url: &mut Url) {
        if !url.query_pairs().any(|(key, _)| key == ACCESS_TOKEN_PARAM) {
            return;
        }
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != ACCESS_TOKEN_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    #[instrument(skip(self, url))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        mut url: Url,
    ) -> Result<T, RepoError> {
        self.authorize(&mut url);
        let started = Instant::now();
        let result = self.fetch(url).await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!(METRIC_CMS_REQUESTS, "operation" => operation, "outcome" => outcome).increment(1);
        histogram!(METRIC_CMS_REQUEST_MS, "operation" => operation)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        result
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T, RepoError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(RepoError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::Status {
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(RepoError::decode)
    }

    async fn master_ref(&self) -> Result<String, RepoError> {
        let root: ApiRoot = self.get_json("api_root", self.endpoint.clone()).await?;
        root.master_ref()
            .map(str::to_string)
            .ok_or(RepoError::MissingRef)
    }

    fn search_url(&self, master_ref: &str, predicate: &str, page_size: u32) -> Url {
        let mut url = self.search_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("ref", master_ref)
            .append_pair("q", &format!("[{predicate}]"))
            .append_pair("orderings", NEWEST_FIRST)
            .append_pair("pageSize", &page_size.to_string());
        url
    }

    fn listing_predicate(&self) -> String {
        format!("[at(document.type,\"{}\")]", self.document_type)
    }

    fn uid_predicate(&self, uid: &str) -> String {
        format!("[at(my.{}.uid,\"{uid}\")]", self.document_type)
    }

    fn summary_page(&self, response: SearchResponse) -> Result<PostsPage<PostSummary>, RepoError> {
        let next_page = match response.next_page.as_deref() {
            Some(raw) => {
                let mut url = PageCursor::from_next_page(raw)?.url().clone();
                Self::strip_access_token(&mut url);
                Some(PageCursor::new(url))
            }
            None => None,
        };

        let items = response
            .results
            .into_iter()
            .filter_map(RawDocument::into_summary)
            .collect();

        Ok(PostsPage { items, next_page })
    }
}

#[async_trait]
impl ContentRepo for CmsClient {
    async fn first_page(&self) -> Result<PostsPage<PostSummary>, RepoError> {
        let master_ref = self.master_ref().await?;
        let url = self.search_url(&master_ref, &self.listing_predicate(), self.page_size.get());
        let response: SearchResponse = self.get_json("list_posts", url).await?;
        self.summary_page(response)
    }

    async fn page_at(&self, cursor: &PageCursor) -> Result<PostsPage<PostSummary>, RepoError> {
        if cursor.url().origin() != self.endpoint.origin() {
            return Err(RepoError::Pagination(PaginationError::ForeignOrigin(
                cursor.url().to_string(),
            )));
        }

        let response: SearchResponse = self.get_json("list_posts", cursor.url().clone()).await?;
        self.summary_page(response)
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<PostDetail>, RepoError> {
        let master_ref = self.master_ref().await?;
        let url = self.search_url(&master_ref, &self.uid_predicate(uid), 1);
        let response: SearchResponse = self.get_json("find_post", url).await?;

        let detail = response
            .results
            .into_iter()
            .next()
            .and_then(RawDocument::into_detail);
        debug!(uid, found = detail.is_some(), "looked up post by uid");
        Ok(detail)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.master_ref().await.map(|_| ())
    }
}
