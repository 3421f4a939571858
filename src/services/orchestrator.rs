//! Per-domain scan orchestration.
//!
//! State machine per domain:
//! `START → WHOIS_GATE → (SKIP_UNREG | ACTIVE_GATE) → (SKIP_INACTIVE | FULL) → DONE`.
//! The registration gate is always the cheap DAS round-trip; port-43 WHOIS
//! enrichment joins it only when the plan asks for it and its bucket still
//! holds a token. Inside FULL the plan's parallel groups run in order, all
//! profiles of a group concurrently.

use crate::models::{
    CheckResult, ProfilesMeta, ResultRecord, ScanStatus, ScanSummary, SkipReason,
};
use crate::services::active_analyzer::ActiveAnalyzer;
use crate::services::checks::CheckRegistry;
use crate::services::das_client::RateLimitedDas;
use crate::services::dns_prober::DnsProber;
use crate::services::http_prober::HttpProber;
use crate::services::profiles::{ExecutionPlan, Profile, ProfileCatalog};
use crate::services::store::Store;
use crate::services::whois_client::{WhoisClient, WhoisOutcome};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

/// Profiles the gates execute before FULL scheduling takes over
const GATE_PROFILES: &[&str] = &["whois", "quick-whois", "http", "dns", "active"];

/// Mutable scan state shared with the budget-bounded pipeline so completed
/// work survives cancellation.
#[derive(Default)]
struct ScanState {
    checks: BTreeMap<String, CheckResult>,
    executed: Vec<String>,
    outcome: Option<(ScanStatus, Option<SkipReason>)>,
}

pub struct Orchestrator {
    catalog: Arc<ProfileCatalog>,
    store: Arc<dyn Store>,
    das: Arc<RateLimitedDas>,
    whois: Arc<WhoisClient>,
    http: Arc<HttpProber>,
    dns: Arc<DnsProber>,
    active: Arc<ActiveAnalyzer>,
    registry: Arc<CheckRegistry>,
    concurrency: usize,
    per_domain_budget: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<ProfileCatalog>,
        store: Arc<dyn Store>,
        das: Arc<RateLimitedDas>,
        whois: Arc<WhoisClient>,
        http: Arc<HttpProber>,
        dns: Arc<DnsProber>,
        active: Arc<ActiveAnalyzer>,
        registry: Arc<CheckRegistry>,
        concurrency: usize,
        per_domain_budget: Duration,
    ) -> Self {
        Self {
            catalog,
            store,
            das,
            whois,
            http,
            dns,
            active,
            registry,
            concurrency,
            per_domain_budget,
        }
    }

    /// Scan every domain through a bounded worker pool. Domains are
    /// independent; their results come back in completion order.
    pub async fn scan_all(
        self: &Arc<Self>,
        domains: Vec<String>,
        plan: Arc<ExecutionPlan>,
    ) -> Vec<ResultRecord> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for domain in domains {
            let semaphore = Arc::clone(&semaphore);
            let orchestrator = Arc::clone(self);
            let plan = Arc::clone(&plan);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                orchestrator.scan_domain(&domain, &plan).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(record) => results.push(record),
                Err(e) => tracing::error!("Domain scan task failed: {}", e),
            }
        }
        results
    }

    /// Run the full state machine for one domain and persist the outcome.
    pub async fn scan_domain(&self, domain: &str, plan: &ExecutionPlan) -> ResultRecord {
        let domain = crate::utils::normalize(domain);
        let task_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        tracing::info!("Scanning {} (profiles: {:?})", domain, plan.requested);

        let domain_id = match self.store.get_or_create_domain(&domain).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!("Store error creating row for {}: {}", domain, e);
                None
            },
        };

        let state = Arc::new(Mutex::new(ScanState::default()));
        let budget_exceeded = tokio::time::timeout(
            self.per_domain_budget,
            self.run_pipeline(&domain, plan, domain_id, Arc::clone(&state)),
        )
        .await
        .is_err();

        let state = {
            let mut guard = state.lock().await;
            std::mem::take(&mut *guard)
        };

        let mut record = ResultRecord::new(
            &domain,
            ProfilesMeta {
                requested: plan.requested.clone(),
                expanded: plan.expanded.clone(),
                executed: state.executed,
                execution_order: plan.execution_order.clone(),
                parallel_groups: plan.parallel_groups.clone(),
            },
        );
        record.checks = state.checks;

        if budget_exceeded {
            tracing::warn!(
                "Per-domain budget of {:?} exceeded for {}; keeping completed profiles",
                self.per_domain_budget,
                domain
            );
            record.status = ScanStatus::Partial;
            record.error = Some("timeout".to_string());
        } else if let Some((status, skip_reason)) = state.outcome {
            record.status = status;
            record.skip_reason = skip_reason;
        }

        record.summary = build_summary(&record);
        record.meta.execution_time_sec = started.elapsed().as_secs_f64();

        if let Some(id) = domain_id
            && let Err(e) = self.store.save_result(id, &task_id, &record).await
        {
            tracing::error!("Store error saving result for {} (result lost): {}", domain, e);
        }

        tracing::info!(
            "Finished {} in {:.2}s: {} ({} checks)",
            domain,
            record.meta.execution_time_sec,
            record.status.as_str(),
            record.checks.len()
        );
        record
    }

    async fn run_pipeline(
        &self,
        domain: &str,
        plan: &ExecutionPlan,
        domain_id: Option<i64>,
        state: Arc<Mutex<ScanState>>,
    ) {
        // ---- WHOIS_GATE: cheap registration check first, always ----
        let das_response = self.das.check(domain).await;
        let gate_key =
            if plan.contains("whois") { "whois" } else { "quick-whois" }.to_string();

        if das_response.registered == Some(false) {
            // Authoritative "available": write the flag and bail out
            self.write_flags(domain_id, Some(false), None).await;
            let mut guard = state.lock().await;
            guard.checks.insert(
                gate_key.clone(),
                CheckResult::success(serde_json::json!({
                    "registered": false,
                    "status": das_response.status,
                    "domain": das_response.domain,
                    "source": "das",
                })),
            );
            guard.executed.push(gate_key);
            guard.outcome = Some((ScanStatus::Skipped, Some(SkipReason::Unregistered)));
            return;
        }

        if das_response.registered == Some(true) {
            self.write_flags(domain_id, Some(true), None).await;
        }

        let das_data = serde_json::json!({
            "registered": das_response.assume_registered(),
            "status": das_response.status,
            "domain": das_response.domain,
            "error": das_response.error,
            "source": "das",
        });

        let gate_result = if plan.contains("whois") {
            match self.whois.lookup(domain).await {
                WhoisOutcome::Success(record) => {
                    let mut data =
                        serde_json::to_value(&*record).unwrap_or(Value::Null);
                    data["registered"] = serde_json::json!(das_response.assume_registered());
                    data["das"] = das_data;
                    CheckResult::success(data)
                },
                WhoisOutcome::RateLimited { retry_after } => {
                    // Degrade: DAS data survives, enrichment is forgone
                    let mut result = CheckResult::rate_limited(retry_after.as_secs_f64());
                    result.data["das"] = das_data;
                    result.data["registered"] =
                        serde_json::json!(das_response.assume_registered());
                    result
                },
                WhoisOutcome::Error { message } => CheckResult::error(message, das_data),
            }
        } else {
            CheckResult::success(das_data)
        };

        {
            let mut guard = state.lock().await;
            guard.checks.insert(gate_key.clone(), gate_result);
            guard.executed.push(gate_key);
        }

        // Registration-only plans stop here; nothing to gate on activity
        let beyond_gate = plan
            .execution_order
            .iter()
            .any(|p| p != "whois" && p != "quick-whois");
        if !beyond_gate {
            state.lock().await.outcome = Some((ScanStatus::Success, None));
            return;
        }

        // ---- ACTIVE_GATE: probe HTTP and DNS together, classify ----
        let (http_result, dns_result) =
            tokio::join!(self.http.probe(domain), self.dns.probe(domain));

        let http_check = {
            let data = serde_json::to_value(&http_result).unwrap_or(Value::Null);
            if http_result.succeeded() {
                CheckResult::success(data).with_elapsed(http_result.response_time_ms)
            } else {
                CheckResult::error(
                    http_result.error.clone().unwrap_or_else(|| "probe failed".to_string()),
                    data,
                )
            }
        };

        let dns_check = {
            let data = serde_json::to_value(&dns_result).unwrap_or(Value::Null);
            if dns_result.all_failed() {
                CheckResult::error("all lookups failed".to_string(), data)
            } else {
                CheckResult::success(data)
            }
        };

        let report = self.active.analyze(domain, &http_result, &dns_result);

        for captured in &report.captured_domains {
            let metadata = serde_json::json!({
                "status": report.status_code,
                "chain_length": report.redirect_chain.len(),
            });
            match self
                .store
                .insert_captured_domain(captured, domain, "redirect", Some(metadata))
                .await
            {
                Ok(true) => {},
                Ok(false) => {
                    tracing::debug!("Captured domain {} already known", captured);
                },
                Err(e) => {
                    tracing::error!("Store error recording discovery {}: {}", captured, e);
                },
            }
        }

        self.write_flags(domain_id, None, Some(report.active)).await;

        let is_active = report.active;
        {
            let mut guard = state.lock().await;
            guard.checks.insert("http".to_string(), http_check);
            guard.executed.push("http".to_string());
            guard.checks.insert("dns".to_string(), dns_check);
            guard.executed.push("dns".to_string());
            guard.checks.insert(
                "active".to_string(),
                CheckResult::success(serde_json::to_value(&report).unwrap_or(Value::Null)),
            );
            guard.executed.push("active".to_string());
        }

        if !is_active {
            state.lock().await.outcome = Some((ScanStatus::Partial, Some(SkipReason::Inactive)));
            return;
        }

        // ---- FULL: drive remaining profiles group by group ----
        for group in &plan.parallel_groups {
            let pending: Vec<Profile> = group
                .iter()
                .filter(|name| !GATE_PROFILES.contains(&name.as_str()))
                .filter_map(|name| self.catalog.get(name).cloned())
                .collect();
            if pending.is_empty() {
                continue;
            }

            // Siblings see outputs up to the previous group only
            let snapshot = state.lock().await.checks.clone();

            let mut join_set = JoinSet::new();
            for profile in pending {
                let registry = Arc::clone(&self.registry);
                let snapshot = snapshot.clone();
                let domain = domain.to_string();
                join_set.spawn(async move {
                    let result = run_profile(&registry, &profile, &domain, &snapshot).await;
                    (profile.name, result)
                });
            }

            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((name, result)) => {
                        let mut guard = state.lock().await;
                        guard.checks.insert(name.clone(), result);
                        guard.executed.push(name);
                    },
                    Err(e) => tracing::error!("Profile task for {} failed: {}", domain, e),
                }
            }
        }

        state.lock().await.outcome = Some((ScanStatus::Success, None));
    }

    async fn write_flags(
        &self,
        domain_id: Option<i64>,
        is_registered: Option<bool>,
        is_active: Option<bool>,
    ) {
        let Some(id) = domain_id else { return };
        if let Err(e) = self.store.update_domain_flags(id, is_registered, is_active).await {
            tracing::error!("Store error updating flags for domain {}: {}", id, e);
        }
    }
}

/// Execute one profile's checks. A failed check is recorded, never raised.
async fn run_profile(
    registry: &CheckRegistry,
    profile: &Profile,
    domain: &str,
    prior: &BTreeMap<String, CheckResult>,
) -> CheckResult {
    let started = Instant::now();
    let mut results: Vec<(String, CheckResult)> = Vec::new();

    for check_id in &profile.checks {
        let result = match registry.get(check_id) {
            Some(check) => check.run(domain, prior).await,
            None => CheckResult::error(format!("check '{check_id}' not implemented"), Value::Null),
        };
        results.push((check_id.clone(), result));
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match results.len() {
        0 => CheckResult::skipped("profile defines no checks"),
        1 => results.remove(0).1.with_elapsed(elapsed_ms),
        _ => {
            // Multi-check profile: worst status wins, data keyed by check id
            let status = results
                .iter()
                .map(|(_, r)| r.status)
                .max_by_key(|s| match s {
                    crate::models::CheckStatus::Success => 0,
                    crate::models::CheckStatus::Skipped => 1,
                    crate::models::CheckStatus::RateLimited => 2,
                    crate::models::CheckStatus::Error => 3,
                })
                .unwrap_or(crate::models::CheckStatus::Success);
            let data: serde_json::Map<String, Value> = results
                .into_iter()
                .map(|(id, r)| (id, serde_json::to_value(&r).unwrap_or(Value::Null)))
                .collect();
            CheckResult {
                status,
                data: Value::Object(data),
                error: None,
                elapsed_ms: Some(elapsed_ms),
            }
        },
    }
}

/// Fold per-check issues and warnings into the aggregate summary.
fn build_summary(record: &ResultRecord) -> ScanSummary {
    let http = record.checks.get("http");
    let reachable = http.map(|c| c.is_success()).unwrap_or(false);
    let https = http
        .and_then(|c| c.data.get("https"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    for result in record.checks.values() {
        for (key, sink) in [("issues", &mut issues), ("warnings", &mut warnings)] {
            if let Some(items) = result.data.get(key).and_then(|v| v.as_array()) {
                sink.extend(items.iter().filter_map(|i| i.as_str().map(str::to_string)));
            }
        }
    }

    let grade = if record.status == ScanStatus::Skipped || !reachable {
        "F".to_string()
    } else {
        match issues.len() {
            0 => "A".to_string(),
            1..=2 => "B".to_string(),
            3..=4 => "C".to_string(),
            _ => "D".to_string(),
        }
    };

    ScanSummary { reachable, https, issues, warnings, grade }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckStatus;

    #[test]
    fn summary_grades_by_issue_count() {
        let mut record = ResultRecord::new("example.lt", ProfilesMeta::default());
        record.status = ScanStatus::Success;
        record.checks.insert(
            "http".to_string(),
            CheckResult::success(serde_json::json!({ "https": true })),
        );
        record.checks.insert(
            "headers".to_string(),
            CheckResult::success(serde_json::json!({
                "issues": ["a", "b", "c"],
                "warnings": ["w"],
            })),
        );

        let summary = build_summary(&record);
        assert!(summary.reachable);
        assert!(summary.https);
        assert_eq!(summary.issues.len(), 3);
        assert_eq!(summary.warnings, vec!["w".to_string()]);
        assert_eq!(summary.grade, "C");
    }

    #[test]
    fn unreachable_domain_is_graded_f() {
        let mut record = ResultRecord::new("example.lt", ProfilesMeta::default());
        record.status = ScanStatus::Partial;
        record.checks.insert(
            "http".to_string(),
            CheckResult {
                status: CheckStatus::Error,
                data: Value::Null,
                error: Some("timeout".into()),
                elapsed_ms: None,
            },
        );
        let summary = build_summary(&record);
        assert!(!summary.reachable);
        assert_eq!(summary.grade, "F");
    }
}
