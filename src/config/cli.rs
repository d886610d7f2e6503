use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the lettera binary.
#[derive(Debug, Parser)]
#[command(name = "lettera", version, about = "Blog front-end over a headless CMS")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "LETTERA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the blog over HTTP.
    Serve(Box<ServeArgs>),
    /// Pre-render every post into a static directory.
    Build(BuildArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SharedOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the CMS API endpoint.
    #[arg(long = "cms-endpoint", value_name = "URL", value_hint = ValueHint::Url)]
    pub cms_endpoint: Option<String>,

    /// Override the CMS access token.
    #[arg(long = "cms-access-token", value_name = "TOKEN")]
    pub cms_access_token: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub shared: SharedOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// How uncached posts are served (placeholder|blocking|disabled).
    #[arg(long = "render-fallback", value_name = "MODE")]
    pub render_fallback: Option<String>,

    /// Toggle rendering every listed post at startup.
    #[arg(
        long = "render-prerender",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub render_prerender: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub overrides: SharedOverrides,

    /// Directory the rendered site is written to.
    #[arg(long = "out", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub out: Option<PathBuf>,

    /// Maximum number of concurrent post renders (clamped to 1..=32).
    /// Defaults to `render.concurrency`.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<u32>,
}
