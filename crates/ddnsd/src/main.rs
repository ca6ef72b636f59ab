// # ddnsd - DDNS Daemon
//
// The daemon is a THIN integration layer: all reconciliation logic lives in
// ddns-core. It is responsible for:
// 1. Reading settings from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the Cloudflare record store and HTTP resolver into the scheduler
// 4. Mapping SIGHUP to reload and SIGTERM/SIGINT to shutdown
//
// ## Configuration
//
// The managed target comes from a JSON file (`DDNS_CONFIG_PATH`), with any
// of the following environment variables taking precedence over it:
//
// ### Target
// - `DDNS_PROVIDER_API_TOKEN`: Cloudflare API token
// - `DDNS_PROVIDER_ZONE_ID`: Zone ID
// - `DDNS_RECORD_NAME`: Fully-qualified record name
// - `DDNS_RECORD_TYPE`: A or AAAA (default A)
//
// ### Daemon
// - `DDNS_CONFIG_PATH`: Config file (default /etc/ddns/config.json)
// - `DDNS_PROVIDER_BASE_URL`: Cloudflare API root override
// - `DDNS_IP_ENDPOINT`: Address lookup URL tried before the built-in ones
// - `DDNS_TICK_INTERVAL_SECS`: Seconds between cycles (default 5)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `DDNS_LOG_DIR`: Write logs to daily files (`ddns.<date>.log`) in this directory
// - `DDNS_RUN_MODE`: daemon, once, configure, check-ip, records (default daemon)
//
// ## Example
//
// ```bash
// export DDNS_PROVIDER_API_TOKEN=your_token
// export DDNS_PROVIDER_ZONE_ID=023e105f4ecef8ad9ca31a8372d0c353
// export DDNS_RECORD_NAME=host.example.com
//
// ddnsd
// ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use ddns_core::traits::{AddressResolverFactory, ConfigLoader, RecordStoreFactory};
use ddns_core::{
    Configuration, EngineConfig, EngineEvent, JsonFileConfigLoader, RecordType, Scheduler,
    SchedulerHandle,
};
use ddns_ip_http::HttpResolverFactory;
use ddns_provider_cloudflare::CloudflareFactory;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Config file used when `DDNS_CONFIG_PATH` is unset
const DEFAULT_CONFIG_PATH: &str = "/etc/ddns/config.json";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What the process does after startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    /// Scheduler loop until SIGTERM/SIGINT
    Daemon,
    /// One reconciliation cycle, then exit (for cron)
    Once,
    /// Persist the environment-supplied target to the config file
    Configure,
    /// Print the public address and the endpoint that supplied it
    CheckIp,
    /// Print the records at the configured name
    Records,
}

impl FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daemon" => Ok(RunMode::Daemon),
            "once" => Ok(RunMode::Once),
            "configure" => Ok(RunMode::Configure),
            "check-ip" => Ok(RunMode::CheckIp),
            "records" => Ok(RunMode::Records),
            other => anyhow::bail!(
                "DDNS_RUN_MODE '{}' is not valid. \
                Valid modes: daemon, once, configure, check-ip, records",
                other
            ),
        }
    }
}

/// Environment values that take precedence over the config file
#[derive(Default, Clone, PartialEq, Eq)]
struct Overrides {
    api_token: Option<String>,
    zone_id: Option<String>,
    record_name: Option<String>,
    record_type: Option<RecordType>,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for Overrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overrides")
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .field("zone_id", &self.zone_id)
            .field("record_name", &self.record_name)
            .field("record_type", &self.record_type)
            .finish()
    }
}

impl Overrides {
    fn apply(&self, config: &mut Configuration) {
        if let Some(ref token) = self.api_token {
            config.api_token = token.clone();
        }
        if let Some(ref zone) = self.zone_id {
            config.zone_id = zone.clone();
        }
        if let Some(ref name) = self.record_name {
            config.record_name = name.clone();
        }
        if let Some(record_type) = self.record_type {
            config.record_type = record_type;
        }
    }
}

/// Daemon settings
#[derive(Debug)]
struct Settings {
    config_path: PathBuf,
    overrides: Overrides,
    base_url: Option<String>,
    ip_endpoint: Option<String>,
    tick_interval_secs: u64,
    log_level: String,
    log_dir: Option<PathBuf>,
    run_mode: RunMode,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load settings from any variable source
    fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let record_type = match non_empty("DDNS_RECORD_TYPE") {
            Some(value) => Some(
                value
                    .parse::<RecordType>()
                    .map_err(|e| anyhow::anyhow!("DDNS_RECORD_TYPE: {}", e))?,
            ),
            None => None,
        };

        let tick_interval_secs = match non_empty("DDNS_TICK_INTERVAL_SECS") {
            Some(value) => value.parse().with_context(|| {
                format!("DDNS_TICK_INTERVAL_SECS must be a number. Got: {}", value)
            })?,
            None => EngineConfig::default().tick_interval().as_secs(),
        };

        let run_mode = match non_empty("DDNS_RUN_MODE") {
            Some(value) => value.parse()?,
            None => RunMode::Daemon,
        };

        Ok(Self {
            config_path: non_empty("DDNS_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            overrides: Overrides {
                api_token: non_empty("DDNS_PROVIDER_API_TOKEN"),
                zone_id: non_empty("DDNS_PROVIDER_ZONE_ID"),
                record_name: non_empty("DDNS_RECORD_NAME"),
                record_type,
            },
            base_url: non_empty("DDNS_PROVIDER_BASE_URL"),
            ip_endpoint: non_empty("DDNS_IP_ENDPOINT"),
            tick_interval_secs,
            log_level: non_empty("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_dir: non_empty("DDNS_LOG_DIR").map(PathBuf::from),
            run_mode,
        })
    }

    /// Validate the settings
    ///
    /// Target values are checked again after the config file is merged in,
    /// since any of them may come from the file instead.
    fn validate(&self) -> Result<()> {
        if !(1..=3600).contains(&self.tick_interval_secs) {
            anyhow::bail!(
                "DDNS_TICK_INTERVAL_SECS must be between 1 and 3600 seconds. Got: {}",
                self.tick_interval_secs
            );
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!(
                    "DDNS_PROVIDER_BASE_URL must use HTTP or HTTPS scheme. Got: {}",
                    url
                );
            }

            // Warn if using HTTP (not HTTPS)
            if url.starts_with("http://") {
                eprintln!(
                    "WARNING: DDNS_PROVIDER_BASE_URL uses HTTP (not HTTPS). \
                    The API token will be sent in clear text."
                );
            }
        }

        if let Some(ref url) = self.ip_endpoint {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!("DDNS_IP_ENDPOINT must be an HTTP(S) URL. Got: {}", url);
            }
        }

        log_level(&self.log_level)?;

        if let Some(ref name) = self.overrides.record_name {
            validate_domain_name(name)?;
        }

        Ok(())
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval_ms: self.tick_interval_secs * 1000,
            ..EngineConfig::default()
        }
    }

    fn resolvers(&self) -> HttpResolverFactory {
        match self.ip_endpoint {
            Some(ref url) => HttpResolverFactory::with_primary(url.clone()),
            None => HttpResolverFactory::new(),
        }
    }

    fn record_stores(&self) -> CloudflareFactory {
        match self.base_url {
            Some(ref url) => CloudflareFactory::with_base_url(url.clone()),
            None => CloudflareFactory::new(),
        }
    }
}

/// Parse a log level name
fn log_level(name: &str) -> Result<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            name
        ),
    }
}

/// Validate the merged target before any provider call
fn validate_target(config: &Configuration) -> Result<()> {
    config.validate()?;

    // Check for obvious placeholder tokens (common mistake)
    let token_lower = config.api_token.to_lowercase();
    if token_lower.contains("your_token")
        || token_lower.contains("replace_me")
        || token_lower == "token"
    {
        anyhow::bail!(
            "API token appears to be a placeholder. \
            Use an actual API token from Cloudflare."
        );
    }

    validate_domain_name(&config.record_name)?;
    Ok(())
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.trim_end_matches('.').split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        // Wildcard labels are not addresses this host can own
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

/// Config file loader with environment values layered on top
///
/// Every load re-reads the file, so SIGHUP picks up edits to it.
struct LayeredConfigLoader {
    file: JsonFileConfigLoader,
    overrides: Overrides,
}

#[async_trait]
impl ConfigLoader for LayeredConfigLoader {
    async fn load(&self) -> ddns_core::Result<Configuration> {
        let mut config = self.file.load().await?;
        self.overrides.apply(&mut config);
        Ok(config)
    }

    async fn save(&self, config: &Configuration) -> ddns_core::Result<()> {
        self.file.save(config).await
    }
}

/// Daily-rotated log file appender in `dir`
///
/// Files are named `ddns.<YYYY-MM-DD>.log` and roll over at UTC midnight.
fn log_file_appender(dir: &Path) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("ddns")
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("Failed to open log directory {}", dir.display()))
}

/// Install the global tracing subscriber
///
/// With `DDNS_LOG_DIR` set, logs go to a daily file there through a
/// non-blocking writer. The returned guard must live until exit so buffered
/// lines are flushed.
fn init_logging(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let level = log_level(&settings.log_level)?;

    match settings.log_dir {
        Some(ref dir) => {
            let (writer, guard) = tracing_appender::non_blocking(log_file_appender(dir)?);

            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(writer)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;

            Ok(Some(guard))
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;

            Ok(None)
        }
    }
}

fn main() -> ExitCode {
    // Load settings from environment
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Validate settings
    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let _log_guard = match init_logging(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!("Starting ddnsd ({:?} mode)", settings.run_mode);
    debug!("Settings: {:?}", settings);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(settings)).into()
}

/// Dispatch on the run mode
async fn run(settings: Settings) -> DdnsExitCode {
    let loader = Arc::new(LayeredConfigLoader {
        file: JsonFileConfigLoader::new(&settings.config_path),
        overrides: settings.overrides.clone(),
    });

    let result = match settings.run_mode {
        RunMode::Configure => configure(loader.as_ref()).await,
        RunMode::CheckIp => check_ip(&settings, loader.as_ref()).await,
        RunMode::Records => list_records(&settings, loader.as_ref()).await,
        RunMode::Once => run_once(&settings, loader).await,
        RunMode::Daemon => run_daemon(&settings, loader).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Load and validate the merged target; failures are configuration errors
async fn load_target(loader: &dyn ConfigLoader) -> std::result::Result<Configuration, DdnsExitCode> {
    let config = match loader.load().await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(DdnsExitCode::ConfigError);
        }
    };

    if let Err(e) = validate_target(&config) {
        error!("Configuration validation error: {:#}", e);
        return Err(DdnsExitCode::ConfigError);
    }

    Ok(config)
}

/// Persist the environment-supplied target to the config file
async fn configure(loader: &LayeredConfigLoader) -> Result<DdnsExitCode> {
    let config = match load_target(loader).await {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };

    loader.save(&config).await?;
    println!(
        "Saved {} {} (zone {}) to {}",
        config.record_type,
        config.record_name,
        config.zone_id,
        loader.file.path().display()
    );
    Ok(DdnsExitCode::CleanShutdown)
}

/// Print the public address and its source
async fn check_ip(settings: &Settings, loader: &dyn ConfigLoader) -> Result<DdnsExitCode> {
    // Only the record type matters here, so an incomplete target is fine
    let record_type = match loader.load().await {
        Ok(config) => config.record_type,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Ok(DdnsExitCode::ConfigError);
        }
    };

    let resolver = settings.resolvers().create(record_type)?;
    let observed = resolver.resolve().await?;
    println!("{}", observed);
    Ok(DdnsExitCode::CleanShutdown)
}

/// Print the records at the configured name
async fn list_records(settings: &Settings, loader: &dyn ConfigLoader) -> Result<DdnsExitCode> {
    let config = match load_target(loader).await {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };

    let store = settings.record_stores().create(&config)?;
    let records = store.list(&config.zone_id, &config.record_name).await?;

    if records.is_empty() {
        println!("No records at {}", config.record_name);
    }
    for record in records {
        println!(
            "{}\t{}\t{}\t{}\tttl={}",
            record.id, record.record_type, record.name, record.content, record.ttl
        );
    }
    Ok(DdnsExitCode::CleanShutdown)
}

/// Build the scheduler, mapping startup failures to a config exit code
async fn build_scheduler(
    settings: &Settings,
    loader: Arc<LayeredConfigLoader>,
) -> std::result::Result<(Scheduler, SchedulerHandle, mpsc::Receiver<EngineEvent>), DdnsExitCode> {
    let config = load_target(loader.as_ref()).await?;

    let stores = settings.record_stores();
    verify_access(&stores, &config).await?;

    Scheduler::new(
        loader,
        Arc::new(settings.resolvers()),
        Arc::new(stores),
        settings.engine_config(),
    )
    .await
    .map_err(|e| {
        error!("Failed to start scheduler: {}", e);
        DdnsExitCode::ConfigError
    })
}

/// List the records once to prove the credential and zone are usable
async fn verify_access(
    stores: &CloudflareFactory,
    config: &Configuration,
) -> std::result::Result<(), DdnsExitCode> {
    let store = stores.create(config).map_err(|e| {
        error!("Failed to create record store: {}", e);
        DdnsExitCode::ConfigError
    })?;

    match store.list(&config.zone_id, &config.record_name).await {
        Ok(records) => {
            let owned = records.iter().filter(|r| r.is_type(config.record_type)).count();
            info!(
                "Provider access verified: {} {} record(s) at {}",
                owned, config.record_type, config.record_name
            );
            Ok(())
        }
        Err(e) => {
            error!(
                "Provider access check failed for zone {}: {}. \
                Check the API token permissions and zone ID.",
                config.zone_id, e
            );
            Err(DdnsExitCode::ConfigError)
        }
    }
}

/// Run a single reconciliation cycle
async fn run_once(settings: &Settings, loader: Arc<LayeredConfigLoader>) -> Result<DdnsExitCode> {
    let (mut scheduler, _handle, _events) = match build_scheduler(settings, loader).await {
        Ok(parts) => parts,
        Err(code) => return Ok(code),
    };

    let outcome = scheduler.run_once().await;
    if outcome.is_failure() {
        error!("Cycle failed: {:?}", outcome);
        return Ok(DdnsExitCode::RuntimeError);
    }

    info!("Cycle finished: {:?}", outcome);
    Ok(DdnsExitCode::CleanShutdown)
}

/// Run the scheduler until a shutdown signal
async fn run_daemon(settings: &Settings, loader: Arc<LayeredConfigLoader>) -> Result<DdnsExitCode> {
    // Without working handlers the daemon could neither reload nor stop cleanly
    let signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!("{:#}", e);
            return Ok(DdnsExitCode::RuntimeError);
        }
    };

    let (scheduler, handle, events) = match build_scheduler(settings, loader).await {
        Ok(parts) => parts,
        Err(code) => return Ok(code),
    };

    let signals = tokio::spawn(forward_signals(handle, signals));
    let drain = tokio::spawn(drain_events(events));

    info!("Starting DDNS scheduler");
    let result = scheduler.run().await;

    signals.abort();
    drain.abort();

    result?;
    info!("Shutdown complete");
    Ok(DdnsExitCode::CleanShutdown)
}

/// Keep the event channel drained; the scheduler logs outcomes itself
async fn drain_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

/// OS signal streams, registered before the scheduler starts
#[cfg(unix)]
struct ShutdownSignals {
    hangup: Signal,
    terminate: Signal,
    interrupt: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup()).context("Failed to setup SIGHUP handler")?,
            terminate: signal(SignalKind::terminate())
                .context("Failed to setup SIGTERM handler")?,
            interrupt: signal(SignalKind::interrupt())
                .context("Failed to setup SIGINT handler")?,
        })
    }
}

/// Translate OS signals into scheduler requests
///
/// SIGHUP reloads; SIGTERM and SIGINT shut down.
#[cfg(unix)]
async fn forward_signals(handle: SchedulerHandle, mut signals: ShutdownSignals) {
    let name = loop {
        tokio::select! {
            _ = signals.hangup.recv() => {
                info!("Received SIGHUP, reloading configuration");
                handle.reload().await;
            }
            _ = signals.terminate.recv() => break "SIGTERM",
            _ = signals.interrupt.recv() => break "SIGINT",
        }
    };

    info!("Received shutdown signal: {}", name);
    handle.shutdown().await;
}

/// CTRL-C is the only signal outside Unix; it is registered on first poll
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }
}

/// Translate CTRL-C into a shutdown request
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn forward_signals(handle: SchedulerHandle, _signals: ShutdownSignals) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Keep the handle so the scheduler does not read this as a shutdown
        error!("Failed to wait for CTRL-C, only SIGKILL will stop the daemon: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal: SIGINT");
    handle.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let s = settings(&[]).unwrap();

        assert_eq!(s.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(s.tick_interval_secs, 5);
        assert_eq!(s.run_mode, RunMode::Daemon);
        assert_eq!(s.overrides, Overrides::default());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn environment_overrides_file_values() {
        let s = settings(&[
            ("DDNS_PROVIDER_API_TOKEN", "env-token"),
            ("DDNS_RECORD_TYPE", "aaaa"),
        ])
        .unwrap();

        let mut config = Configuration::new("file-token", "zone", "host.example.com", RecordType::A);
        s.overrides.apply(&mut config);

        assert_eq!(config.api_token, "env-token");
        assert_eq!(config.zone_id, "zone");
        assert_eq!(config.record_type, RecordType::Aaaa);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(settings(&[("DDNS_RECORD_TYPE", "CNAME")]).is_err());
        assert!(settings(&[("DDNS_RUN_MODE", "forever")]).is_err());
        assert!(settings(&[("DDNS_TICK_INTERVAL_SECS", "soon")]).is_err());

        let s = settings(&[("DDNS_TICK_INTERVAL_SECS", "0")]).unwrap();
        assert!(s.validate().is_err());

        let s = settings(&[("DDNS_LOG_LEVEL", "loud")]).unwrap();
        assert!(s.validate().is_err());

        let s = settings(&[("DDNS_PROVIDER_BASE_URL", "ftp://api")]).unwrap();
        assert!(s.validate().is_err());

        let s = settings(&[("DDNS_IP_ENDPOINT", "api.ipify.org")]).unwrap();
        assert!(s.validate().is_err());
    }

    #[test]
    fn run_modes_parse() {
        assert_eq!("once".parse::<RunMode>().unwrap(), RunMode::Once);
        assert_eq!("CHECK-IP".parse::<RunMode>().unwrap(), RunMode::CheckIp);
        assert_eq!("records".parse::<RunMode>().unwrap(), RunMode::Records);
        assert_eq!("configure".parse::<RunMode>().unwrap(), RunMode::Configure);
    }

    #[test]
    fn tick_interval_feeds_engine_config() {
        let s = settings(&[("DDNS_TICK_INTERVAL_SECS", "30")]).unwrap();
        let engine = s.engine_config();

        assert_eq!(engine.tick_interval_ms, 30_000);
        assert_eq!(engine.confirm_delay_ms, EngineConfig::default().confirm_delay_ms);
    }

    #[test]
    fn target_validation() {
        let good = Configuration::new("a-real-looking-token", "zone", "host.example.com", RecordType::A);
        assert!(validate_target(&good).is_ok());

        let mut placeholder = good.clone();
        placeholder.api_token = "your_token".to_string();
        assert!(validate_target(&placeholder).is_err());

        let mut bad_name = good.clone();
        bad_name.record_name = "-bad.example.com".to_string();
        assert!(validate_target(&bad_name).is_err());

        let mut missing = good;
        missing.zone_id.clear();
        assert!(validate_target(&missing).is_err());
    }

    #[test]
    fn overrides_debug_hides_token() {
        let s = settings(&[("DDNS_PROVIDER_API_TOKEN", "secret_token_12345")]).unwrap();
        let shown = format!("{:?}", s);

        assert!(!shown.contains("secret_token"));
        assert!(shown.contains("<REDACTED>"));
    }

    #[tokio::test]
    async fn layered_loader_merges_file_and_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let file = JsonFileConfigLoader::new(&path);
        file.save(&Configuration::new(
            "file-token",
            "file-zone",
            "file.example.com",
            RecordType::A,
        ))
        .await
        .unwrap();

        let loader = LayeredConfigLoader {
            file,
            overrides: Overrides {
                record_name: Some("env.example.com".to_string()),
                ..Overrides::default()
            },
        };

        let config = loader.load().await.unwrap();
        assert_eq!(config.api_token, "file-token");
        assert_eq!(config.zone_id, "file-zone");
        assert_eq!(config.record_name, "env.example.com");
    }

    #[test]
    fn log_files_are_dated_and_rotated_daily() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let mut appender = log_file_appender(dir.path()).unwrap();
        appender.write_all(b"cycle finished\n").unwrap();
        appender.flush().unwrap();

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec![format!("ddns.{}.log", today)]);
        let written = std::fs::read_to_string(dir.path().join(&names[0])).unwrap();
        assert!(written.contains("cycle finished"));
    }

    #[tokio::test]
    async fn check_ip_reports_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loader = LayeredConfigLoader {
            file: JsonFileConfigLoader::new(&path),
            overrides: Overrides::default(),
        };

        let code = check_ip(&settings(&[]).unwrap(), &loader).await.unwrap();
        assert_eq!(code, DdnsExitCode::ConfigError);
    }

    #[cfg(unix)]
    mod signals {
        use super::*;
        use ddns_core::traits::{AddressResolver, RecordStore};
        use ddns_core::{AddressRecord, IpVersion, ObservedAddress};
        use std::time::Duration;

        struct StaticResolver;

        #[async_trait]
        impl AddressResolver for StaticResolver {
            async fn resolve(&self) -> ddns_core::Result<ObservedAddress> {
                Ok(ObservedAddress::new("192.0.2.10".parse().unwrap(), "static"))
            }

            fn version(&self) -> IpVersion {
                IpVersion::V4
            }
        }

        impl AddressResolverFactory for StaticResolver {
            fn create(
                &self,
                _record_type: RecordType,
            ) -> ddns_core::Result<Arc<dyn AddressResolver>> {
                Ok(Arc::new(StaticResolver))
            }
        }

        /// Read-only zone: every write is refused
        struct ReadOnlyStore;

        #[async_trait]
        impl RecordStore for ReadOnlyStore {
            async fn list(&self, _zone: &str, _name: &str) -> ddns_core::Result<Vec<AddressRecord>> {
                Ok(Vec::new())
            }

            async fn create(
                &self,
                _zone: &str,
                _record_type: RecordType,
                _name: &str,
                _content: &str,
                _ttl: u32,
            ) -> ddns_core::Result<AddressRecord> {
                Err(ddns_core::Error::transport("read-only", "writes disabled"))
            }

            async fn update(
                &self,
                _zone: &str,
                _record_id: &str,
                _record_type: RecordType,
                _name: &str,
                _content: &str,
                _ttl: u32,
                _proxied: bool,
            ) -> ddns_core::Result<()> {
                Err(ddns_core::Error::transport("read-only", "writes disabled"))
            }

            fn provider_name(&self) -> &'static str {
                "read-only"
            }
        }

        impl RecordStoreFactory for ReadOnlyStore {
            fn create(&self, _config: &Configuration) -> ddns_core::Result<Arc<dyn RecordStore>> {
                Ok(Arc::new(ReadOnlyStore))
            }
        }

        async fn next_event<F>(events: &mut mpsc::Receiver<EngineEvent>, pred: F) -> EngineEvent
        where
            F: Fn(&EngineEvent) -> bool,
        {
            tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    let event = events.recv().await.expect("scheduler stopped early");
                    if pred(&event) {
                        return event;
                    }
                }
            })
            .await
            .expect("event not seen within 5 seconds")
        }

        #[tokio::test]
        async fn sighup_reaches_scheduler_as_reload() {
            let dir = tempfile::tempdir().unwrap();
            let file = JsonFileConfigLoader::new(dir.path().join("config.json"));
            file.save(&Configuration::new("token", "zone", "host.example.com", RecordType::A))
                .await
                .unwrap();

            let engine = EngineConfig {
                tick_interval_ms: 3_600_000,
                confirm_delay_ms: 0,
                resolve_retry_delay_ms: 0,
                mutation_retry_delay_ms: 0,
                ..EngineConfig::default()
            };
            let (scheduler, handle, mut events) = Scheduler::new(
                Arc::new(LayeredConfigLoader {
                    file,
                    overrides: Overrides::default(),
                }),
                Arc::new(StaticResolver),
                Arc::new(ReadOnlyStore),
                engine,
            )
            .await
            .unwrap();

            let signals = ShutdownSignals::install().unwrap();
            let running = tokio::spawn(scheduler.run());
            let forwarder = tokio::spawn(forward_signals(handle.clone(), signals));

            next_event(&mut events, |e| matches!(e, EngineEvent::CycleCompleted(_))).await;

            let status = std::process::Command::new("kill")
                .args(["-HUP", &std::process::id().to_string()])
                .status()
                .unwrap();
            assert!(status.success());

            let reloaded = next_event(&mut events, |e| matches!(e, EngineEvent::Reloaded { .. })).await;
            assert_eq!(
                reloaded,
                EngineEvent::Reloaded {
                    record_name: "host.example.com".to_string()
                }
            );

            assert!(handle.shutdown().await);
            running.await.unwrap().unwrap();
            forwarder.abort();
        }
    }
}
