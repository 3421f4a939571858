// Orchestrator state-machine tests against mock registry endpoints

use crate::models::{CheckStatus, ScanStatus, SkipReason};
use crate::services::profiles::{ProfileCatalog, resolve};
use crate::tests::common::{build_harness, spawn_das_server, spawn_whois_server};
use crate::utils::TokenBucket;
use std::time::Duration;

fn plan_for(names: &[&str]) -> crate::services::ExecutionPlan {
    let catalog = ProfileCatalog::builtin(true).unwrap();
    let requested: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    resolve(&catalog, &requested).unwrap()
}

fn full_whois_bucket() -> TokenBucket {
    TokenBucket::new(100, Duration::from_secs(1800))
}

fn empty_whois_bucket() -> TokenBucket {
    let bucket = TokenBucket::new(1, Duration::from_secs(1800));
    assert!(bucket.try_acquire());
    bucket
}

#[tokio::test]
async fn unregistered_domain_skips_everything_downstream() {
    let das = spawn_das_server("Domain: nonexistent-xyz-test-12345.lt\nStatus: available\n").await;
    let harness = build_harness(das, None, full_whois_bucket()).await;

    let plan = plan_for(&["complete"]);
    let record = harness
        .orchestrator
        .scan_domain("nonexistent-xyz-test-12345.lt", &plan)
        .await;

    assert_eq!(record.status, ScanStatus::Skipped);
    assert_eq!(record.skip_reason, Some(SkipReason::Unregistered));

    // Only the registration gate may appear in the checks map
    assert_eq!(record.checks.len(), 1);
    let gate = record.checks.get("whois").expect("gate recorded under whois");
    assert_eq!(gate.status, CheckStatus::Success);
    assert_eq!(gate.data["registered"], false);

    let domain = harness
        .store
        .get_domain("nonexistent-xyz-test-12345.lt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(domain.is_registered, Some(false));

    // The skipped scan still wrote an audit row
    let results: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM results")
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(results.0, 1);
}

#[tokio::test]
async fn registration_only_plan_stops_after_the_gate() {
    let das = spawn_das_server("Domain: example.lt\nStatus: registered\n").await;
    let harness = build_harness(das, None, full_whois_bucket()).await;

    let plan = plan_for(&["quick-whois"]);
    let record = harness.orchestrator.scan_domain("example.lt", &plan).await;

    assert_eq!(record.status, ScanStatus::Success);
    assert_eq!(record.skip_reason, None);
    assert_eq!(record.checks.len(), 1);
    let gate = record.checks.get("quick-whois").unwrap();
    assert_eq!(gate.data["registered"], true);
    assert_eq!(gate.data["status"], "registered");

    let domain = harness.store.get_domain("example.lt").await.unwrap().unwrap();
    assert_eq!(domain.is_registered, Some(true));
    // Activity gate never ran
    assert_eq!(domain.is_active, None);
}

#[tokio::test]
async fn whois_enrichment_merges_with_das_data() {
    let das = spawn_das_server("Domain: example.lt\nStatus: registered\n").await;
    let whois = spawn_whois_server(
        "% DOMREG whois\nDomain: example.lt\nStatus: registered\n\
         Registered: 2015-03-20\nExpires: 2099-03-20\nRegistrar: UAB Testas\n\
         Nameserver: ns1.example.lt\n",
    )
    .await;
    let harness = build_harness(das, Some(whois), full_whois_bucket()).await;

    let plan = plan_for(&["whois"]);
    let record = harness.orchestrator.scan_domain("example.lt", &plan).await;

    assert_eq!(record.status, ScanStatus::Success);
    let gate = record.checks.get("whois").unwrap();
    assert_eq!(gate.status, CheckStatus::Success);
    assert_eq!(gate.data["registered"], true);
    assert_eq!(gate.data["registrar"], "UAB Testas");
    assert_eq!(gate.data["das"]["status"], "registered");
    assert_eq!(gate.data["nameservers"][0], "ns1.example.lt");
}

#[tokio::test]
async fn whois_rate_limit_degrades_to_das_data() {
    let das = spawn_das_server("Domain: example.lt\nStatus: registered\n").await;
    let harness = build_harness(das, None, empty_whois_bucket()).await;

    let plan = plan_for(&["whois"]);
    let record = harness.orchestrator.scan_domain("example.lt", &plan).await;

    // The scan itself is fine; only enrichment was forgone
    assert_eq!(record.status, ScanStatus::Success);
    let gate = record.checks.get("whois").unwrap();
    assert_eq!(gate.status, CheckStatus::RateLimited);
    assert!(gate.data["time_until_available"].as_f64().unwrap() > 0.0);
    assert_eq!(gate.data["das"]["status"], "registered");
    assert_eq!(gate.data["registered"], true);

    let domain = harness.store.get_domain("example.lt").await.unwrap().unwrap();
    assert_eq!(domain.is_registered, Some(true));
}

#[tokio::test]
async fn das_outage_assumes_registered_and_continues() {
    // Nothing listens on the DAS port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let harness =
        build_harness(("127.0.0.1".to_string(), port), None, full_whois_bucket()).await;

    let plan = plan_for(&["quick-whois"]);
    let record = harness.orchestrator.scan_domain("example.lt", &plan).await;

    // Conservative default: unknown registration never causes a skip
    assert_eq!(record.status, ScanStatus::Success);
    assert_eq!(record.skip_reason, None);
    let gate = record.checks.get("quick-whois").unwrap();
    assert_eq!(gate.data["registered"], true);

    // Flag stays tri-state unknown: DAS was not authoritative
    let domain = harness.store.get_domain("example.lt").await.unwrap().unwrap();
    assert_eq!(domain.is_registered, None);
}

#[tokio::test]
async fn rescan_appends_history_for_the_same_domain() {
    let das = spawn_das_server("Domain: example.lt\nStatus: available\n").await;
    let harness = build_harness(das, None, full_whois_bucket()).await;

    let plan = plan_for(&["quick-whois"]);
    harness.orchestrator.scan_domain("example.lt", &plan).await;
    harness.orchestrator.scan_domain("example.lt", &plan).await;

    let domains: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM domains")
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(domains.0, 1);

    let results: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM results")
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(results.0, 2);
}

#[tokio::test]
async fn result_meta_records_the_plan() {
    let das = spawn_das_server("Status: available\n").await;
    let harness = build_harness(das, None, full_whois_bucket()).await;

    let plan = plan_for(&["quick-check"]);
    let record = harness.orchestrator.scan_domain("example.lt", &plan).await;

    assert_eq!(record.meta.profiles.requested, vec!["quick-check".to_string()]);
    assert_eq!(
        record.meta.profiles.expanded,
        vec!["quick-whois".to_string(), "http".to_string()]
    );
    assert_eq!(record.meta.schema_version, 1);
    assert!(record.meta.execution_time_sec >= 0.0);
    assert_eq!(record.meta.profiles.executed, vec!["quick-whois".to_string()]);
}

#[tokio::test]
async fn worker_pool_scans_all_domains() {
    let das = spawn_das_server("Status: available\n").await;
    let harness = build_harness(das, None, full_whois_bucket()).await;

    let plan = std::sync::Arc::new(plan_for(&["quick-whois"]));
    let domains: Vec<String> = (0..5).map(|i| format!("laisvas-{i}.lt")).collect();

    let results = harness.orchestrator.scan_all(domains, plan).await;
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.status == ScanStatus::Skipped));

    let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM domains")
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(rows.0, 5);
}
