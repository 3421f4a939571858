pub mod active_analyzer;
pub mod checks;
pub mod das_client;
pub mod dns_prober;
pub mod http_prober;
pub mod orchestrator;
pub mod profiles;
pub mod store;
pub mod tls_prober;
pub mod whois_client;

pub use active_analyzer::{ActiveAnalyzer, ActivityReport};
pub use checks::{CheckRegistry, ProfileCheck};
pub use das_client::{DasClient, DasResponse, RateLimitedDas};
pub use dns_prober::{DnsProbeResult, DnsProber, DnsRecordSet};
pub use http_prober::{HttpProbeResult, HttpProber};
pub use orchestrator::Orchestrator;
pub use profiles::{ExecutionPlan, Profile, ProfileCatalog, ProfileCategory};
pub use store::{SqliteStore, Store};
pub use tls_prober::{TlsProbeResult, TlsProber};
pub use whois_client::{WhoisClient, WhoisOutcome, WhoisRecord, parse_whois_response};
