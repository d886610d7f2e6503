use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::{StreamExt, stream};
use metrics::counter;
use tracing::{debug, info, warn};

use super::runtime::InFlightRenders;
use super::{PageRenderError, PageRenderer};
use crate::domain::posts::validate_uid;

const METRIC_FALLBACK_RENDERS: &str = "lettera_fallback_renders_total";

/// How a request for a post that was not rendered ahead of time is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackMode {
    /// Answer with a loading page and render in the background.
    #[default]
    Placeholder,
    /// Hold the request until the render completes.
    Blocking,
    /// Treat every post that was not pre-rendered as missing.
    Disabled,
}

impl FromStr for FallbackMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "placeholder" => Ok(Self::Placeholder),
            "blocking" => Ok(Self::Blocking),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!(
                "unknown fallback mode `{other}` (expected placeholder|blocking|disabled)"
            )),
        }
    }
}

/// How long an unknown or failed uid is answered from memory before the CMS
/// is asked again.
pub const DEFAULT_MISS_TTL: Duration = Duration::from_secs(30);

/// Upper bound on remembered misses. Arbitrary uids come straight from
/// request paths.
pub const MAX_MISSES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissKind {
    NotFound,
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct Miss {
    kind: MissKind,
    at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(Arc<str>),
    Missing,
    Pending,
    /// The last background render errored. Reported once, then retried.
    Failed,
}

/// Output store of rendered post documents keyed by uid.
#[derive(Clone)]
pub struct FallbackRenderer {
    renderer: PageRenderer,
    mode: FallbackMode,
    store: Arc<DashMap<String, Arc<str>>>,
    misses: Arc<DashMap<String, Miss>>,
    miss_ttl: Duration,
    in_flight: InFlightRenders,
}

impl FallbackRenderer {
    pub fn new(renderer: PageRenderer, mode: FallbackMode) -> Self {
        Self {
            renderer,
            mode,
            store: Arc::new(DashMap::new()),
            misses: Arc::new(DashMap::new()),
            miss_ttl: DEFAULT_MISS_TTL,
            in_flight: InFlightRenders::new(),
        }
    }

    pub fn with_miss_ttl(mut self, ttl: Duration) -> Self {
        self.miss_ttl = ttl;
        self
    }

    pub fn seed(&self, uid: &str, html: impl Into<Arc<str>>) {
        self.store.insert(uid.to_string(), html.into());
        self.misses.remove(uid);
    }

    pub fn rendered_count(&self) -> usize {
        self.store.len()
    }

    fn lookup(&self, uid: &str) -> Option<Resolution> {
        if let Some(html) = self.store.get(uid) {
            return Some(Resolution::Ready(Arc::clone(html.value())));
        }

        let miss = self.misses.get(uid).map(|entry| *entry.value())?;
        if miss.at.elapsed() >= self.miss_ttl {
            self.misses.remove(uid);
            return None;
        }
        match miss.kind {
            MissKind::NotFound => Some(Resolution::Missing),
            MissKind::Failed => {
                self.misses.remove(uid);
                Some(Resolution::Failed)
            }
        }
    }

    fn remember_miss(&self, uid: &str, kind: MissKind) {
        if self.misses.len() >= MAX_MISSES && !self.misses.contains_key(uid) {
            let ttl = self.miss_ttl;
            self.misses.retain(|_, miss| miss.at.elapsed() < ttl);
            if self.misses.len() >= MAX_MISSES {
                debug!(
                    target = "lettera::application::render",
                    uid = %uid,
                    "miss cache full; not remembering"
                );
                return;
            }
        }
        self.misses.insert(
            uid.to_string(),
            Miss {
                kind,
                at: Instant::now(),
            },
        );
    }

    pub async fn resolve(&self, uid: &str) -> Result<Resolution, PageRenderError> {
        if validate_uid(uid).is_err() {
            return Ok(Resolution::Missing);
        }

        if let Some(resolution) = self.lookup(uid) {
            return Ok(resolution);
        }

        match self.mode {
            FallbackMode::Disabled => Ok(Resolution::Missing),
            FallbackMode::Blocking => self.render_once(uid).await,
            FallbackMode::Placeholder => {
                self.spawn_render(uid);
                Ok(Resolution::Pending)
            }
        }
    }

    /// Pre-render every listed post. Individual failures are logged and left
    /// for the fallback path.
    pub async fn warm(&self, concurrency: usize) -> Result<usize, PageRenderError> {
        let uids = self.renderer.feed().static_paths().await?;
        let total = uids.len();

        stream::iter(uids)
            .for_each_concurrent(concurrency.max(1), |uid| async move {
                if let Err(err) = self.render_once(&uid).await {
                    warn!(
                        target = "lettera::application::render",
                        uid = %uid,
                        error = %err,
                        "pre-render failed"
                    );
                }
            })
            .await;

        info!(
            target = "lettera::application::render",
            listed = total,
            rendered = self.rendered_count(),
            "pre-render finished"
        );
        Ok(total)
    }

    /// Render `uid` inline, joining a render that is already running for it
    /// instead of starting a second one.
    async fn render_once(&self, uid: &str) -> Result<Resolution, PageRenderError> {
        loop {
            match self.in_flight.acquire(uid) {
                Ok(_guard) => {
                    if let Some(resolution) = self.lookup(uid) {
                        return Ok(resolution);
                    }
                    return self.render_and_store(uid).await;
                }
                Err(_) => {
                    self.in_flight.wait(uid).await;
                    if let Some(resolution) = self.lookup(uid) {
                        return Ok(resolution);
                    }
                }
            }
        }
    }

    async fn render_and_store(&self, uid: &str) -> Result<Resolution, PageRenderError> {
        let rendered = self.renderer.render_post(uid).await?;
        let (resolution, outcome) = match rendered {
            Some(html) => {
                let html: Arc<str> = Arc::from(html);
                self.store.insert(uid.to_string(), Arc::clone(&html));
                self.misses.remove(uid);
                (Resolution::Ready(html), "ready")
            }
            None => {
                self.remember_miss(uid, MissKind::NotFound);
                (Resolution::Missing, "missing")
            }
        };
        counter!(METRIC_FALLBACK_RENDERS, "outcome" => outcome).increment(1);
        Ok(resolution)
    }

    fn spawn_render(&self, uid: &str) {
        let guard = match self.in_flight.acquire(uid) {
            Ok(guard) => guard,
            Err(err) => {
                debug!(target = "lettera::application::render", "{err}");
                return;
            }
        };

        let this = self.clone();
        let uid = uid.to_string();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(err) = this.render_and_store(&uid).await {
                this.remember_miss(&uid, MissKind::Failed);
                counter!(METRIC_FALLBACK_RENDERS, "outcome" => "error").increment(1);
                warn!(
                    target = "lettera::application::render",
                    uid = %uid,
                    error = %err,
                    "background render failed"
                );
            }
        });
    }

    #[cfg(test)]
    fn remembered_misses(&self) -> usize {
        self.misses.len()
    }
}
