use std::{path::PathBuf, process, sync::Arc, time::Duration};

use lettera::{
    application::{
        chrome::ChromeService,
        error::AppError,
        feed::FeedService,
        render::{FallbackRenderer, PageRenderer},
        site::SiteBuilder,
    },
    config,
    infra::{
        assets,
        cms::CmsClient,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let renderer = build_renderer(&settings)?;

    match command {
        config::Command::Serve(_) => run_serve(settings, renderer).await,
        config::Command::Build(_) => {
            let concurrency = settings.render.concurrency.get() as usize;
            run_build(settings.build.output_dir.clone(), concurrency, renderer).await
        }
    }
}

fn build_renderer(settings: &config::Settings) -> Result<PageRenderer, AppError> {
    let cms = CmsClient::new(&settings.cms)?;
    let origin = cms.endpoint().clone();
    let feed = FeedService::new(Arc::new(cms), origin, settings.comment_widget());
    let chrome = ChromeService::new(settings.site_identity());
    Ok(PageRenderer::new(feed, chrome))
}

async fn run_serve(settings: config::Settings, renderer: PageRenderer) -> Result<(), AppError> {
    let fallback = FallbackRenderer::new(renderer.clone(), settings.render.fallback)
        .with_miss_ttl(settings.render.miss_ttl);

    if settings.render.prerender {
        let warmer = fallback.clone();
        let concurrency = settings.render.concurrency.get() as usize;
        tokio::spawn(async move {
            if let Err(err) = warmer.warm(concurrency).await {
                warn!(error = %err, "pre-render skipped; posts will render on demand");
            }
        });
    }

    let router = http::build_router(HttpState::new(renderer, fallback));
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        addr = %settings.server.addr,
        fallback = ?settings.render.fallback,
        "serving blog"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!("server stopped");
    Ok(())
}

async fn run_build(
    out: PathBuf,
    concurrency: usize,
    renderer: PageRenderer,
) -> Result<(), AppError> {
    let builder = SiteBuilder::new(renderer);
    let report = builder.build(&out, concurrency).await?;
    let assets = assets::export_to(&out).await?;

    info!(
        out = %out.display(),
        listing_pages = report.listing_pages,
        posts = report.posts_written,
        skipped = report.posts_skipped,
        assets,
        "static build complete"
    );
    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    info!(
        grace_seconds = grace.as_secs(),
        "shutdown requested, draining connections"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!("connections still open after grace period, exiting");
        process::exit(1);
    });
}
