//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{BuildArgs, CliArgs, Command, ServeArgs, ServeOverrides, SharedOverrides};

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::chrome::SiteIdentity;
use crate::application::render::FallbackMode;
use crate::presentation::views::CommentWidget;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "lettera";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DOCUMENT_TYPE: &str = "posts";
const DEFAULT_PAGE_SIZE: u32 = 1;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_CMS_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SITE_TITLE: &str = "lettera";
const DEFAULT_SITE_LANG: &str = "pt-BR";
const DEFAULT_ISSUE_TERM: &str = "pathname";
const DEFAULT_COMMENTS_THEME: &str = "github-dark";
const COMMENTS_SCRIPT_SRC: &str = "https://utteranc.es/client.js";
const DEFAULT_RENDER_CONCURRENCY: u32 = 4;
const DEFAULT_MISS_TTL_SECS: u64 = 30;
const DEFAULT_BUILD_OUTPUT_DIR: &str = "dist";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cms: CmsSettings,
    pub comments: Option<CommentSettings>,
    pub site: SiteSettings,
    pub render: RenderSettings,
    pub build: BuildSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CmsSettings {
    pub endpoint: Url,
    pub access_token: Option<String>,
    pub document_type: String,
    pub page_size: NonZeroU32,
    pub timeout: Duration,
    pub toolbar_repo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentSettings {
    pub repo: String,
    pub issue_term: String,
    pub theme: String,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub description: String,
    pub public_url: String,
    pub lang: String,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub fallback: FallbackMode,
    pub prerender: bool,
    pub concurrency: NonZeroU32,
    pub miss_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub output_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

impl Settings {
    pub fn site_identity(&self) -> SiteIdentity {
        SiteIdentity {
            title: self.site.title.clone(),
            description: self.site.description.clone(),
            public_url: self.site.public_url.clone(),
            lang: self.site.lang.clone(),
            toolbar_repo: self.cms.toolbar_repo.clone(),
        }
    }

    pub fn comment_widget(&self) -> Option<CommentWidget> {
        self.comments.as_ref().map(|comments| CommentWidget {
            script_src: COMMENTS_SCRIPT_SRC.to_string(),
            repo: comments.repo.clone(),
            issue_term: comments.issue_term.clone(),
            theme: comments.theme.clone(),
        })
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("LETTERA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Build(args)) => raw.apply_build_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cms: RawCmsSettings,
    comments: RawCommentSettings,
    site: RawSiteSettings,
    render: RawRenderSettings,
    build: RawBuildSettings,
}

impl RawSettings {
    fn apply_shared_overrides(&mut self, overrides: &SharedOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(endpoint) = overrides.cms_endpoint.as_ref() {
            self.cms.endpoint = Some(endpoint.clone());
        }
        if let Some(token) = overrides.cms_access_token.as_ref() {
            self.cms.access_token = Some(token.clone());
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_shared_overrides(&overrides.shared);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(mode) = overrides.render_fallback.as_ref() {
            self.render.fallback = Some(mode.clone());
        }
        if let Some(prerender) = overrides.render_prerender {
            self.render.prerender = Some(prerender);
        }
    }

    fn apply_build_overrides(&mut self, args: &BuildArgs) {
        self.apply_shared_overrides(&args.overrides);

        if let Some(out) = args.out.as_ref() {
            self.build.output_dir = Some(out.clone());
        }
        if let Some(concurrency) = args.concurrency {
            self.render.concurrency = Some(concurrency);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cms,
            comments,
            site,
            render,
            build,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cms = build_cms_settings(cms)?;
        let comments = build_comment_settings(comments)?;
        let site = build_site_settings(site, &server)?;
        let render = build_render_settings(render)?;
        let build = build_build_settings(build)?;

        Ok(Self {
            server,
            logging,
            cms,
            comments,
            site,
            render,
            build,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cms_settings(cms: RawCmsSettings) -> Result<CmsSettings, LoadError> {
    let raw_endpoint = non_empty(cms.endpoint)
        .ok_or_else(|| LoadError::invalid("cms.endpoint", "must be set"))?;
    let endpoint = Url::parse(&raw_endpoint)
        .map_err(|err| LoadError::invalid("cms.endpoint", format!("invalid url: {err}")))?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "cms.endpoint",
            "scheme must be http or https",
        ));
    }

    let document_type =
        non_empty(cms.document_type).unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string());
    if !document_type
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(LoadError::invalid(
            "cms.document_type",
            "only ASCII letters, digits, `_` and `-` are allowed",
        ));
    }

    let page_size_value = cms.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size_value > MAX_PAGE_SIZE {
        return Err(LoadError::invalid(
            "cms.page_size",
            format!("must not exceed {MAX_PAGE_SIZE}"),
        ));
    }
    let page_size = non_zero_u32(page_size_value.into(), "cms.page_size")?;

    let timeout_secs = cms.timeout_seconds.unwrap_or(DEFAULT_CMS_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "cms.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CmsSettings {
        endpoint,
        access_token: non_empty(cms.access_token),
        document_type,
        page_size,
        timeout: Duration::from_secs(timeout_secs),
        toolbar_repo: non_empty(cms.toolbar_repo),
    })
}

fn build_comment_settings(
    comments: RawCommentSettings,
) -> Result<Option<CommentSettings>, LoadError> {
    let Some(repo) = non_empty(comments.repo) else {
        return Ok(None);
    };

    let mut parts = repo.split('/');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    );
    if !valid {
        return Err(LoadError::invalid(
            "comments.repo",
            "expected `owner/repository`",
        ));
    }

    Ok(Some(CommentSettings {
        repo,
        issue_term: non_empty(comments.issue_term)
            .unwrap_or_else(|| DEFAULT_ISSUE_TERM.to_string()),
        theme: non_empty(comments.theme).unwrap_or_else(|| DEFAULT_COMMENTS_THEME.to_string()),
    }))
}

fn build_site_settings(
    site: RawSiteSettings,
    server: &ServerSettings,
) -> Result<SiteSettings, LoadError> {
    let public_url = match non_empty(site.public_url) {
        Some(value) => {
            Url::parse(&value).map_err(|err| {
                LoadError::invalid("site.public_url", format!("invalid url: {err}"))
            })?;
            value
        }
        None => format!("http://{}", server.addr),
    };

    Ok(SiteSettings {
        title: non_empty(site.title).unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string()),
        description: site.description.unwrap_or_default(),
        public_url,
        lang: non_empty(site.lang).unwrap_or_else(|| DEFAULT_SITE_LANG.to_string()),
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let fallback = match render.fallback {
        Some(value) => FallbackMode::from_str(&value)
            .map_err(|reason| LoadError::invalid("render.fallback", reason))?,
        None => FallbackMode::default(),
    };

    let concurrency = non_zero_u32(
        render
            .concurrency
            .unwrap_or(DEFAULT_RENDER_CONCURRENCY)
            .into(),
        "render.concurrency",
    )?;

    let miss_ttl_secs = render.miss_ttl_seconds.unwrap_or(DEFAULT_MISS_TTL_SECS);
    if miss_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "render.miss_ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RenderSettings {
        fallback,
        prerender: render.prerender.unwrap_or(true),
        concurrency,
        miss_ttl: Duration::from_secs(miss_ttl_secs),
    })
}

fn build_build_settings(build: RawBuildSettings) -> Result<BuildSettings, LoadError> {
    let output_dir = build
        .output_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_OUTPUT_DIR));
    if output_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "build.output_dir",
            "path must not be empty",
        ));
    }

    Ok(BuildSettings { output_dir })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCmsSettings {
    endpoint: Option<String>,
    access_token: Option<String>,
    document_type: Option<String>,
    page_size: Option<u32>,
    timeout_seconds: Option<u64>,
    toolbar_repo: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommentSettings {
    repo: Option<String>,
    issue_term: Option<String>,
    theme: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    description: Option<String>,
    public_url: Option<String>,
    lang: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    fallback: Option<String>,
    prerender: Option<bool>,
    concurrency: Option<u32>,
    miss_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBuildSettings {
    output_dir: Option<PathBuf>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
