use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub profiles: ProfilesConfig,
    pub network: NetworkConfig,
    pub checks: ChecksConfig,
    pub redirect_capture: RedirectCaptureConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// Profile set used when the CLI omits --profiles
    pub default: String,
    /// When true the monitor/quick-check meta profiles use the DAS-only
    /// quick-whois member instead of full whois
    pub quick_whois_in_meta: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-probe timeout in seconds
    pub request_timeout: u64,
    /// Max concurrent domain tasks
    pub concurrency: usize,
    /// Soft total budget per domain in seconds
    pub per_domain_budget: u64,
    /// Redirect hop cap for the HTTP prober
    pub max_redirects: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChecksConfig {
    pub whois: WhoisChecksConfig,
}

/// Endpoints and rate limits for the two `.lt` registry protocols.
///
/// DAS is the bulk registration-status service; the registry tolerates tens
/// of queries per second there. Port-43 WHOIS is hard-limited to 100 queries
/// per 30 minutes, which the bucket below must never exceed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhoisChecksConfig {
    /// DAS endpoint
    pub server: String,
    pub port: u16,
    /// DAS queries per second (bucket capacity = rate)
    pub rate_limit: f64,
    /// DAS socket timeout in seconds
    pub timeout: u64,

    /// Port-43 WHOIS endpoint
    pub whois_server: String,
    pub whois_port: u16,
    pub whois_timeout: u64,
    pub whois_rate_limit: WhoisRateLimit,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhoisRateLimit {
    pub capacity: u32,
    pub period_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedirectCaptureConfig {
    /// Hosts ending with one of these suffixes keep their subdomain when
    /// reduced to a registrable root
    pub keep_subdomains_for: Vec<String>,
    /// Exact roots never recorded as discoveries (hosting panels, registrars)
    pub ignore_common_services: Vec<String>,
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "domain-analyzer")]
#[command(version, about = "Domain analyzer for the .lt zone")]
pub struct CommandLineArgs {
    /// Single domain to analyze
    #[arg(long, value_name = "HOST")]
    pub domain: Option<String>,

    /// Path to a newline-delimited domain list
    #[arg(long, value_name = "PATH")]
    pub input: Option<String>,

    /// Comma-separated profile names (default from config: standard)
    #[arg(long, value_name = "NAMES")]
    pub profiles: Option<String>,

    /// Max concurrent domain tasks (overrides config file)
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Directory for per-domain result JSON files
    #[arg(long, value_name = "DIR")]
    pub output: Option<String>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Logging level (overrides config file, e.g., "info,domain_analyzer=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Per-probe timeout in seconds (overrides config file)
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load(cli_args: &CommandLineArgs) -> Result<Self, anyhow::Error> {
        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_DATABASE_URL: Database URL (default: sqlite://data/analyzer.db)
    /// - APP_LOG_LEVEL: Logging level (e.g., "info,domain_analyzer=debug")
    /// - APP_REQUEST_TIMEOUT: Per-probe timeout in seconds
    /// - APP_CONCURRENCY: Max concurrent domain tasks
    /// - APP_DAS_SERVER / APP_DAS_PORT: DAS endpoint override
    /// - APP_WHOIS_SERVER / APP_WHOIS_PORT: port-43 WHOIS endpoint override
    fn apply_env_overrides(&mut self) {
        if let Ok(db_url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = db_url;
            tracing::info!("Override database.url from env");
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(timeout) = std::env::var("APP_REQUEST_TIMEOUT")
            && let Ok(timeout) = timeout.parse()
        {
            self.network.request_timeout = timeout;
            tracing::info!(
                "Override network.request_timeout from env: {}",
                self.network.request_timeout
            );
        }

        if let Ok(concurrency) = std::env::var("APP_CONCURRENCY")
            && let Ok(concurrency) = concurrency.parse()
        {
            self.network.concurrency = concurrency;
            tracing::info!("Override network.concurrency from env: {}", self.network.concurrency);
        }

        if let Ok(server) = std::env::var("APP_DAS_SERVER") {
            self.checks.whois.server = server;
            tracing::info!("Override checks.whois.server from env: {}", self.checks.whois.server);
        }

        if let Ok(port) = std::env::var("APP_DAS_PORT")
            && let Ok(port) = port.parse()
        {
            self.checks.whois.port = port;
            tracing::info!("Override checks.whois.port from env: {}", self.checks.whois.port);
        }

        if let Ok(server) = std::env::var("APP_WHOIS_SERVER") {
            self.checks.whois.whois_server = server;
            tracing::info!(
                "Override checks.whois.whois_server from env: {}",
                self.checks.whois.whois_server
            );
        }

        if let Ok(port) = std::env::var("APP_WHOIS_PORT")
            && let Ok(port) = port.parse()
        {
            self.checks.whois.whois_port = port;
            tracing::info!(
                "Override checks.whois.whois_port from env: {}",
                self.checks.whois.whois_port
            );
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(db_url) = &args.database_url {
            self.database.url = db_url.clone();
            tracing::info!("Override database.url from CLI");
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(concurrency) = args.concurrency {
            self.network.concurrency = concurrency;
            tracing::info!("Override network.concurrency from CLI: {}", self.network.concurrency);
        }

        if let Some(timeout) = args.request_timeout {
            self.network.request_timeout = timeout;
            tracing::info!(
                "Override network.request_timeout from CLI: {}",
                self.network.request_timeout
            );
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.network.concurrency == 0 {
            anyhow::bail!("network.concurrency must be > 0");
        }

        if self.network.request_timeout == 0 {
            anyhow::bail!("network.request_timeout must be > 0");
        }

        if self.checks.whois.rate_limit <= 0.0 {
            anyhow::bail!("checks.whois.rate_limit must be > 0");
        }

        if self.checks.whois.whois_rate_limit.capacity == 0
            || self.checks.whois.whois_rate_limit.period_seconds == 0
        {
            anyhow::bail!("checks.whois.whois_rate_limit must have capacity and period > 0");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout)
    }

    pub fn per_domain_budget(&self) -> Duration {
        Duration::from_secs(self.network.per_domain_budget)
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/analyzer.db".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,domain_analyzer=debug".to_string(),
            file: Some("logs/analyzer.log".to_string()),
        }
    }
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self { default: "standard".to_string(), quick_whois_in_meta: true }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { request_timeout: 5, concurrency: 10, per_domain_budget: 60, max_redirects: 10 }
    }
}

impl Default for WhoisChecksConfig {
    fn default() -> Self {
        Self {
            server: "das.domreg.lt".to_string(),
            port: 4343,
            rate_limit: 4.0,
            timeout: 5,
            whois_server: "whois.domreg.lt".to_string(),
            whois_port: 43,
            whois_timeout: 10,
            whois_rate_limit: WhoisRateLimit::default(),
        }
    }
}

impl Default for WhoisRateLimit {
    fn default() -> Self {
        // Registry ceiling: 100 queries per 30 minutes
        Self { capacity: 100, period_seconds: 1800 }
    }
}

impl Default for RedirectCaptureConfig {
    fn default() -> Self {
        Self {
            keep_subdomains_for: vec![
                ".gov.lt".to_string(),
                ".lrv.lt".to_string(),
                ".edu.lt".to_string(),
                ".mil.lt".to_string(),
            ],
            ignore_common_services: vec![
                "serveriai.lt".to_string(),
                "hostinger.lt".to_string(),
                "interneto-vizija.lt".to_string(),
                "domreg.lt".to_string(),
            ],
        }
    }
}
