use std::{process, sync::Arc};

use tinycache::{
    application::{
        error::AppError,
        site::SiteService,
        translation::{Catalogs, TranslationCache},
    },
    cache::{CacheConfig, KeyBuilder, MemoryStore, ObjectStore, UnavailableStore},
    config::{self, StoreBackend},
    infra::{
        error::InfraError,
        fixture::SiteFixture,
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging).map_err(AppError::from)?;
            run_serve(settings).await
        }
        config::Command::Key(args) => {
            println!("{}", KeyBuilder::build(&args.namespace, &args.parts));
            Ok(())
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = settings.cache_config();
    let store = build_store(settings.store.backend);

    let fixture = SiteFixture::load(&settings.site.fixture)?;
    let catalogs = load_catalogs(store.clone(), &cache_config, &settings.site.translations);

    let site = Arc::new(SiteService::new(
        store,
        &cache_config,
        fixture,
        catalogs,
    ));
    let state = HttpState::new(site, cache_config.auth_cookie_prefix.as_str());

    serve_http(&settings, state).await
}

fn build_store(backend: StoreBackend) -> Arc<dyn ObjectStore> {
    match backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::None => {
            warn!(
                target: "tinycache::startup",
                "object store disabled; every render bypasses the cache"
            );
            Arc::new(UnavailableStore)
        }
    }
}

fn load_catalogs(
    store: Arc<dyn ObjectStore>,
    cache_config: &CacheConfig,
    sources: &[config::TranslationSource],
) -> Catalogs {
    let translations = TranslationCache::new(store, cache_config);
    let mut catalogs = Catalogs::new();
    for source in sources {
        if let Err(err) = translations.load_textdomain(&mut catalogs, &source.domain, &source.path)
        {
            warn!(
                target: "tinycache::startup",
                domain = %source.domain,
                error = %err,
                "translation catalog skipped"
            );
        }
    }
    catalogs
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
}
