//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::BTreeSet, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;
use crate::cache::config::{DAY, DEFAULT_AUTH_COOKIE_PREFIX, DEFAULT_QUERY_WHITELIST, HOUR};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tinycache";
const ENV_PREFIX: &str = "TINYCACHE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FIXTURE_PATH: &str = "demo/site.toml";

/// Command-line arguments for the tinycache binary.
#[derive(Debug, Parser)]
#[command(name = "tinycache", version, about = "Read-through rendering cache demo host")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TINYCACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the demo site with caching enabled.
    Serve(Box<ServeArgs>),
    /// Print the cache key derived from a namespace and identity parts.
    Key(KeyArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

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

    /// Override the object store backend (memory|none).
    #[arg(long = "store-backend", value_name = "BACKEND")]
    pub store_backend: Option<String>,

    /// Override the site fixture file.
    #[arg(long = "site-fixture", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub site_fixture: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    /// Namespace the key is derived in, usually the cache group.
    #[arg(value_name = "NAMESPACE")]
    pub namespace: String,

    /// Ordered identity parts.
    #[arg(value_name = "PART")]
    pub parts: Vec<String>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store with per-entry TTL.
    Memory,
    /// No persistent store: every request bypasses the cache.
    None,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "none" | "disabled" => Ok(StoreBackend::None),
            other => Err(format!("unknown backend `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub content_ttl: Duration,
    pub template_part_ttl: Duration,
    pub navmenu_ttl: Duration,
    pub catalog_ttl: Duration,
    pub navmenu_excludes: BTreeSet<String>,
    pub query_whitelist: BTreeSet<String>,
    pub generation_marker: bool,
    pub auth_cookie_prefix: String,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub fixture: PathBuf,
    pub translations: Vec<TranslationSource>,
}

/// A catalog file loaded for a text domain at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranslationSource {
    pub domain: String,
    pub path: PathBuf,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Key(_)) | None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Parse process arguments and load settings for them.
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
    store: RawStoreSettings,
    cache: RawCacheSettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(backend) = overrides.store_backend.as_ref() {
            self.store.backend = Some(backend.clone());
        }
        if let Some(path) = overrides.site_fixture.as_ref() {
            self.site.fixture = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            store,
            cache,
            site,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            store: build_store_settings(store)?,
            cache: build_cache_settings(cache)?,
            site: build_site_settings(site),
        })
    }

    /// Cache configuration as consumed by the cache instances.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::from(&self.cache)
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
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
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

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let backend = match store.backend {
        Some(value) => StoreBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("store.backend", reason))?,
        None => StoreBackend::Memory,
    };
    Ok(StoreSettings { backend })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let content_ttl = ttl(cache.content_ttl_seconds, DAY, "cache.content_ttl_seconds")?;
    let template_part_ttl = ttl(
        cache.template_part_ttl_seconds,
        HOUR,
        "cache.template_part_ttl_seconds",
    )?;
    let navmenu_ttl = ttl(cache.navmenu_ttl_seconds, DAY, "cache.navmenu_ttl_seconds")?;
    let catalog_ttl = ttl(cache.catalog_ttl_seconds, DAY, "cache.catalog_ttl_seconds")?;

    let navmenu_excludes = cache
        .navmenu_excludes
        .as_deref()
        .map(CacheConfig::parse_excludes)
        .unwrap_or_default();

    let query_whitelist = match cache.query_whitelist {
        Some(names) => names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect(),
        None => DEFAULT_QUERY_WHITELIST
            .iter()
            .map(|name| name.to_string())
            .collect(),
    };

    let auth_cookie_prefix = cache
        .auth_cookie_prefix
        .unwrap_or_else(|| DEFAULT_AUTH_COOKIE_PREFIX.to_string());
    if auth_cookie_prefix.trim().is_empty() {
        return Err(LoadError::invalid(
            "cache.auth_cookie_prefix",
            "prefix must not be empty",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        content_ttl,
        template_part_ttl,
        navmenu_ttl,
        catalog_ttl,
        navmenu_excludes,
        query_whitelist,
        generation_marker: cache.generation_marker.unwrap_or(true),
        auth_cookie_prefix,
    })
}

fn build_site_settings(site: RawSiteSettings) -> SiteSettings {
    SiteSettings {
        fixture: site
            .fixture
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FIXTURE_PATH)),
        translations: site.translations,
    }
}

fn ttl(value: Option<u64>, default: Duration, key: &'static str) -> Result<Duration, LoadError> {
    match value {
        Some(0) => Err(LoadError::invalid(key, "ttl must be greater than zero")),
        Some(seconds) => Ok(Duration::from_secs(seconds)),
        None => Ok(default),
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    candidate
        .parse::<SocketAddr>()
        .map_err(|err| format!("failed to parse `{candidate}`: {err}"))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    backend: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    content_ttl_seconds: Option<u64>,
    template_part_ttl_seconds: Option<u64>,
    navmenu_ttl_seconds: Option<u64>,
    catalog_ttl_seconds: Option<u64>,
    navmenu_excludes: Option<String>,
    query_whitelist: Option<Vec<String>>,
    generation_marker: Option<bool>,
    auth_cookie_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    fixture: Option<PathBuf>,
    translations: Vec<TranslationSource>,
}
