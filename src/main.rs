use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use domain_analyzer::config::{CommandLineArgs, Config};
use domain_analyzer::db;
use domain_analyzer::models::{ResultRecord, ScanStatus};
use domain_analyzer::services::checks::CheckRegistry;
use domain_analyzer::services::profiles::{self, ProfileCatalog};
use domain_analyzer::services::{
    ActiveAnalyzer, DasClient, DnsProber, HttpProber, Orchestrator, RateLimitedDas, SqliteStore,
    TlsProber, WhoisClient,
};
use domain_analyzer::utils::{AnalyzerError, StringExt, TokenBucket};

/// Exit codes: 0 = at least one domain produced a result, 1 = unrecoverable
/// configuration error, 2 = invalid arguments.
const EXIT_CONFIG_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli_args = CommandLineArgs::parse();

    let config = match Config::load(&cli_args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        },
    };

    // Keep the appender guard alive for the lifetime of the process
    let _log_guard = init_tracing(&config);
    tracing::info!("Domain analyzer starting up");

    match run(&config, &cli_args).await {
        Ok(code) => code,
        Err(e) => {
            if matches!(
                e.downcast_ref::<AnalyzerError>(),
                Some(err) if matches!(err, AnalyzerError::UnknownProfile(_)
                    | AnalyzerError::EmptyProfileRequest
                    | AnalyzerError::InvalidInput(_))
            ) {
                eprintln!("Invalid arguments: {e}");
                return ExitCode::from(EXIT_INVALID_ARGS);
            }
            tracing::error!("Run failed: {}", e);
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        },
    }
}

fn init_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path.file_name().and_then(|n| n.to_str()).unwrap_or("analyzer.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
        Some(guard)
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
        None
    }
}

async fn run(config: &Config, cli_args: &CommandLineArgs) -> anyhow::Result<ExitCode> {
    let domains = load_domains(cli_args)?;
    if domains.is_empty() {
        return Err(AnalyzerError::invalid_input(
            "no domains given; pass --domain HOST or --input FILE",
        )
        .into());
    }

    // Resolve the profile request up front so bad names fail before any I/O
    let catalog = Arc::new(ProfileCatalog::builtin(config.profiles.quick_whois_in_meta)?);
    let requested = cli_args.profiles.clone().unwrap_or_else(|| config.profiles.default.clone());
    let requested = profiles::parse_profile_request(&requested)?;
    let plan = Arc::new(profiles::resolve(&catalog, &requested)?);
    tracing::info!(
        "Execution plan: {:?} in {} parallel groups (estimated {})",
        plan.execution_order,
        plan.parallel_groups.len(),
        plan.estimated_duration
    );

    let pool = db::create_pool(&config.database.url).await?;
    tracing::info!("Database pool created successfully");

    let store = Arc::new(SqliteStore::new(pool));

    let whois_config = &config.checks.whois;
    let das = Arc::new(RateLimitedDas::new(
        DasClient::new(
            whois_config.server.clone(),
            whois_config.port,
            Duration::from_secs(whois_config.timeout),
        ),
        whois_config.rate_limit,
    ));
    let whois = Arc::new(WhoisClient::new(
        whois_config.whois_server.clone(),
        whois_config.whois_port,
        Duration::from_secs(whois_config.whois_timeout),
        TokenBucket::new(
            whois_config.whois_rate_limit.capacity,
            Duration::from_secs(whois_config.whois_rate_limit.period_seconds),
        ),
    ));

    let http = Arc::new(HttpProber::new(config.request_timeout(), config.network.max_redirects));
    let dns = Arc::new(DnsProber::new(config.request_timeout()));
    let tls = Arc::new(TlsProber::new(config.request_timeout()));
    let active = Arc::new(ActiveAnalyzer::new(
        config.redirect_capture.keep_subdomains_for.clone(),
        config.redirect_capture.ignore_common_services.clone(),
    ));
    let registry = Arc::new(CheckRegistry::standard(Arc::clone(&http), tls));

    let orchestrator = Arc::new(Orchestrator::new(
        catalog,
        store,
        das,
        whois,
        http,
        dns,
        active,
        registry,
        config.network.concurrency,
        config.per_domain_budget(),
    ));

    let total = domains.len();
    let results = orchestrator.scan_all(domains, plan).await;

    if let Some(output_dir) = &cli_args.output {
        write_results(output_dir, &results)?;
    }

    let succeeded = results
        .iter()
        .filter(|r| !matches!(r.status, ScanStatus::Error))
        .count();
    tracing::info!("Scan finished: {}/{} domains produced results", succeeded, total);

    if results.is_empty() {
        return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
    }
    Ok(ExitCode::SUCCESS)
}

/// Domains come from --domain or a newline-delimited file via --input.
fn load_domains(cli_args: &CommandLineArgs) -> anyhow::Result<Vec<String>> {
    let mut domains = Vec::new();

    if let Some(domain) = cli_args.domain.clean() {
        domains.push(domain.to_lowercase());
    }

    if let Some(input) = &cli_args.input {
        let content = std::fs::read_to_string(input)
            .map_err(|e| AnalyzerError::invalid_input(format!("cannot read {input}: {e}")))?;
        domains.extend(
            content
                .lines()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        );
    }

    Ok(domain_analyzer::utils::unique_ordered(domains))
}

/// One JSON file per domain under the output directory.
fn write_results(output_dir: &str, results: &[ResultRecord]) -> anyhow::Result<()> {
    std::fs::create_dir_all(output_dir)?;
    for record in results {
        let path = Path::new(output_dir).join(format!("{}.json", record.domain));
        std::fs::write(&path, serde_json::to_vec_pretty(record)?)?;
    }
    tracing::info!("Wrote {} result files to {}", results.len(), output_dir);
    Ok(())
}
