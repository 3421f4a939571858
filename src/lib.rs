//! Domain Analyzer Library
//!
//! This library contains all the core modules for the domain analyzer:
//! the profile engine, the protocol clients and probes, the per-domain
//! orchestrator and the persistence facade.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{CommandLineArgs, Config};
pub use models::{CheckResult, CheckStatus, ResultRecord, ScanStatus, SkipReason};
pub use services::{
    ActiveAnalyzer, CheckRegistry, DasClient, DnsProber, ExecutionPlan, HttpProber, Orchestrator,
    ProfileCatalog, RateLimitedDas, SqliteStore, Store, TlsProber, WhoisClient,
};
pub use utils::{AnalyzerError, AnalyzerResult, TokenBucket};
