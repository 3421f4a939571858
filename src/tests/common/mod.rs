// Common test utilities and helpers

use crate::services::checks::CheckRegistry;
use crate::services::profiles::ProfileCatalog;
use crate::services::{
    ActiveAnalyzer, DasClient, DnsProber, HttpProber, Orchestrator, RateLimitedDas, SqliteStore,
    Store, TlsProber, WhoisClient,
};
use crate::utils::TokenBucket;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Create an in-memory SQLite database for testing
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Spawn a mock DAS server answering every connection with `response`.
/// Returns `(host, port)`.
pub async fn spawn_das_server(response: &'static str) -> (String, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 256];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    ("127.0.0.1".to_string(), addr.port())
}

/// Spawn a mock port-43 WHOIS server answering with `response`.
pub async fn spawn_whois_server(response: &'static str) -> (String, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 256];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                // Remote close ends the response
            });
        }
    });
    ("127.0.0.1".to_string(), addr.port())
}

pub struct TestHarness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<SqliteStore>,
    pub pool: SqlitePool,
}

/// Wire an orchestrator against a mock DAS endpoint, an optional mock WHOIS
/// endpoint and an in-memory store.
pub async fn build_harness(
    das_endpoint: (String, u16),
    whois_endpoint: Option<(String, u16)>,
    whois_bucket: TokenBucket,
) -> TestHarness {
    let pool = create_test_db().await;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let store_dyn: Arc<dyn Store> = Arc::clone(&store) as Arc<dyn Store>;

    let das = Arc::new(RateLimitedDas::new(
        DasClient::new(das_endpoint.0, das_endpoint.1, Duration::from_secs(2)),
        100.0,
    ));

    let (whois_host, whois_port) =
        whois_endpoint.unwrap_or_else(|| ("127.0.0.1".to_string(), 9));
    let whois = Arc::new(WhoisClient::new(
        whois_host,
        whois_port,
        Duration::from_secs(2),
        whois_bucket,
    ));

    let http = Arc::new(HttpProber::new(Duration::from_millis(500), 10));
    let dns = Arc::new(DnsProber::new(Duration::from_millis(500)));
    let tls = Arc::new(TlsProber::new(Duration::from_millis(500)));
    let active = Arc::new(ActiveAnalyzer::new(
        vec![".gov.lt".into(), ".lrv.lt".into(), ".edu.lt".into(), ".mil.lt".into()],
        Vec::new(),
    ));
    let registry = Arc::new(CheckRegistry::standard(Arc::clone(&http), tls));
    let catalog = Arc::new(ProfileCatalog::builtin(true).expect("builtin catalog"));

    let orchestrator = Arc::new(Orchestrator::new(
        catalog,
        store_dyn,
        das,
        whois,
        http,
        dns,
        active,
        registry,
        2,
        Duration::from_secs(30),
    ));

    TestHarness { orchestrator, store, pool }
}
