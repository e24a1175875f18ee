//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::render::Vars;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folia";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_VIEWS_DIR: &str = "views";
const DEFAULT_PUBLIC_DIR: &str = "public";
const DEFAULT_MARKUP_ENGINE: &str = "markdown";
const DEFAULT_TEMPLATE_ENGINE: &str = "jinja";
const DEFAULT_ENVIRONMENT: &str = "development";
const PRODUCTION_ENVIRONMENT: &str = "production";

/// Command-line arguments for the folia binary.
#[derive(Debug, Parser)]
#[command(name = "folia", version, about = "folia render-cache server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIA_CONFIG_FILE", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

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

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub graceful_shutdown_seconds: Option<u64>,

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

    /// Override the site root directory.
    #[arg(long = "site-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub site_root: Option<PathBuf>,

    /// Override the deployment environment name.
    #[arg(
        long = "site-environment",
        env = "FOLIA_ENVIRONMENT",
        value_name = "NAME"
    )]
    pub site_environment: Option<String>,

    /// Force caching on regardless of environment.
    #[arg(
        long = "force-cache",
        env = "FOLIA_FORCE_CACHE",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub force_cache: Option<bool>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub site: SiteSettings,
    pub routes: Vec<RouteSettings>,
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

/// Site layout and pipeline selection.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub root: PathBuf,
    pub views_dir: String,
    pub public_dir: String,
    pub markup_engine: String,
    pub template_engine: String,
    pub environment: String,
    pub force_cache: bool,
    pub default_vars: Vars,
}

impl SiteSettings {
    /// The process-wide cache gate, decided once at startup: forced on, or
    /// on because the deployment environment is production.
    pub fn cache_enabled(&self) -> bool {
        self.force_cache || self.environment == PRODUCTION_ENVIRONMENT
    }
}

/// What a configured route serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Asset,
    Markup,
    Page,
}

/// One entry of the configured route table.
#[derive(Debug, Clone)]
pub struct RouteSettings {
    pub path: String,
    pub target: RouteTarget,
    pub resource: String,
    pub cache: bool,
    pub zip: bool,
    pub warm: bool,
    pub vars: Vars,
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

    builder = builder.add_source(Environment::with_prefix("FOLIA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    site: RawSiteSettings,
    routes: Vec<RawRouteSettings>,
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
struct RawSiteSettings {
    root: Option<PathBuf>,
    views_dir: Option<String>,
    public_dir: Option<String>,
    markup_engine: Option<String>,
    template_engine: Option<String>,
    environment: Option<String>,
    force_cache: Option<bool>,
    default_vars: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRouteSettings {
    path: String,
    kind: String,
    resource: String,
    #[serde(default)]
    cache: Option<bool>,
    #[serde(default)]
    zip: Option<bool>,
    #[serde(default)]
    warm: Option<bool>,
    #[serde(default)]
    vars: Option<Map<String, Value>>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(root) = overrides.site_root.as_ref() {
            self.site.root = Some(root.clone());
        }
        if let Some(environment) = overrides.site_environment.as_ref() {
            self.site.environment = Some(environment.clone());
        }
        if let Some(force) = overrides.force_cache {
            self.site.force_cache = Some(force);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            site,
            routes,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let site = build_site_settings(site);
        let routes = routes
            .into_iter()
            .map(build_route_settings)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            server,
            logging,
            site,
            routes,
        })
    }
}

fn build_server_settings(raw: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = raw.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = raw.port.unwrap_or(DEFAULT_PORT);
    let addr = format!("{host}:{port}")
        .parse()
        .map_err(|err| LoadError::invalid("server.host", format!("{err}")))?;

    let graceful_shutdown = Duration::from_secs(
        raw.graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
    );

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
}

fn build_logging_settings(raw: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match raw.level {
        Some(level) => LevelFilter::from_str(&level)
            .map_err(|_| LoadError::invalid("logging.level", format!("unknown level `{level}`")))?,
        None => LevelFilter::INFO,
    };

    let format = if raw.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_site_settings(raw: RawSiteSettings) -> SiteSettings {
    SiteSettings {
        root: raw.root.unwrap_or_else(|| PathBuf::from(".")),
        views_dir: raw.views_dir.unwrap_or_else(|| DEFAULT_VIEWS_DIR.to_string()),
        public_dir: raw
            .public_dir
            .unwrap_or_else(|| DEFAULT_PUBLIC_DIR.to_string()),
        markup_engine: raw
            .markup_engine
            .unwrap_or_else(|| DEFAULT_MARKUP_ENGINE.to_string()),
        template_engine: raw
            .template_engine
            .unwrap_or_else(|| DEFAULT_TEMPLATE_ENGINE.to_string()),
        environment: raw
            .environment
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
        force_cache: raw.force_cache.unwrap_or(false),
        default_vars: raw.default_vars.unwrap_or_default(),
    }
}

fn build_route_settings(raw: RawRouteSettings) -> Result<RouteSettings, LoadError> {
    if !raw.path.starts_with('/') {
        return Err(LoadError::invalid(
            "routes.path",
            format!("`{}` must start with `/`", raw.path),
        ));
    }

    let target = match raw.kind.as_str() {
        "asset" => RouteTarget::Asset,
        "markup" => RouteTarget::Markup,
        "page" => RouteTarget::Page,
        other => {
            return Err(LoadError::invalid(
                "routes.kind",
                format!("`{other}` is not one of asset|markup|page"),
            ));
        }
    };

    Ok(RouteSettings {
        path: raw.path,
        target,
        resource: raw.resource,
        cache: raw.cache.unwrap_or(true),
        zip: raw.zip.unwrap_or(target == RouteTarget::Asset),
        warm: raw.warm.unwrap_or(false),
        vars: raw.vars.unwrap_or_default(),
    })
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}
