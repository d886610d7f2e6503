use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, Request, StatusCode,
        header::CACHE_CONTROL,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::{
    application::{
        error::HttpError,
        feed::{self, FeedService},
        render::{FallbackRenderer, PageRenderer, Resolution},
    },
    presentation::views::{html_response, not_found_response, unavailable_response},
};

use super::{
    DATASTAR_REQUEST_HEADER, cms_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub renderer: PageRenderer,
    pub fallback: FallbackRenderer,
}

impl HttpState {
    pub fn new(renderer: PageRenderer, fallback: FallbackRenderer) -> Self {
        Self { renderer, fallback }
    }

    fn feed(&self) -> &FeedService {
        self.renderer.feed()
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/post/{uid}", get(post_detail))
        .route("/404", get(not_found_page))
        .route("/ui/posts", get(posts_partial))
        .route("/_health/cms", get(cms_health))
        .route("/static/{*path}", get(crate::infra::assets::serve_static))
        .fallback(fallback_router)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CursorQuery {
    cursor: Option<String>,
}

async fn index(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let html = state.renderer.render_index().await?;
    Ok(html_response(html, StatusCode::OK))
}

async fn posts_partial(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<CursorQuery>,
) -> Result<Response, HttpError> {
    let Some(token) = query.cursor.filter(|token| !token.trim().is_empty()) else {
        return Err(HttpError::new(
            "infra::http::posts_partial",
            StatusCode::BAD_REQUEST,
            "Missing cursor",
            "Load more requires a cursor",
        ));
    };

    let payload = state.feed().append_payload(&token).await?;

    if headers.contains_key(DATASTAR_REQUEST_HEADER) {
        return feed::build_datastar_append_response(payload);
    }

    let html = feed::build_append_fragment(payload)?;
    Ok(html_response(html, StatusCode::OK))
}

async fn post_detail(State(state): State<HttpState>, Path(uid): Path<String>) -> Response {
    resolve_post(&state, &uid).await
}

async fn not_found_page(State(state): State<HttpState>) -> Response {
    render_not_found(&state)
}

async fn cms_health(State(state): State<HttpState>) -> Response {
    cms_health_response(state.feed().health().await)
}

/// Single-segment paths are served as posts; anything deeper is not found.
async fn fallback_router(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let uid = request.uri().path().trim_matches('/');

    if uid.is_empty() || uid.contains('/') {
        return render_not_found(&state);
    }

    let uid = uid.to_string();
    resolve_post(&state, &uid).await
}

async fn resolve_post(state: &HttpState, uid: &str) -> Response {
    match state.fallback.resolve(uid).await {
        Ok(Resolution::Ready(html)) => html_response(html.to_string(), StatusCode::OK),
        Ok(Resolution::Missing) => render_not_found(state),
        Ok(Resolution::Failed) => match state.renderer.render_unavailable(uid) {
            Ok(html) => {
                let mut response =
                    unavailable_response(html, format!("background render failed for `{uid}`"));
                set_no_store(&mut response);
                response
            }
            Err(err) => HttpError::from(err).into_response(),
        },
        Ok(Resolution::Pending) => match state.renderer.render_loading(uid) {
            Ok(html) => {
                let mut response = html_response(html, StatusCode::OK);
                set_no_store(&mut response);
                response
            }
            Err(err) => HttpError::from(err).into_response(),
        },
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn render_not_found(state: &HttpState) -> Response {
    match state.renderer.render_not_found() {
        Ok(html) => not_found_response(html),
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn set_no_store(response: &mut Response) {
    let value = HeaderValue::from_static("no-store");
    response.headers_mut().insert(CACHE_CONTROL, value);
}

#[cfg(test)]
mod tests {
    use axum::http::header::CONTENT_TYPE;

    use super::*;

    #[test]
    fn no_store_replaces_existing_cache_header() {
        let mut response = Response::builder()
            .header(CACHE_CONTROL, "public, max-age=60")
            .header(CONTENT_TYPE, "text/html")
            .body(Body::empty())
            .expect("response");

        set_no_store(&mut response);

        assert_eq!(
            response.headers().get(CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
    }
}
