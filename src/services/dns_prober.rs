//! DNS prober: resolves the six record types the analyzer cares about in one
//! concurrent pass.
//!
//! NXDOMAIN and empty answers are successful lookups with empty sets; only
//! transport-level failures count as errors.

use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::{ResolveError, ResolveErrorKind, Resolver, TokioResolver};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One record type's answer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsRecordSet {
    pub records: Vec<String>,
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DnsRecordSet {
    fn from_error(error: &ResolveError) -> Self {
        if is_no_records(error) {
            // Negative answer: the lookup worked, the zone has nothing
            Self::default()
        } else {
            Self { records: Vec::new(), ttl: None, error: Some(error.to_string()) }
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsProbeResult {
    pub domain: String,
    pub a: DnsRecordSet,
    pub aaaa: DnsRecordSet,
    pub mx: DnsRecordSet,
    pub ns: DnsRecordSet,
    pub txt: DnsRecordSet,
    pub cname: DnsRecordSet,
}

impl DnsProbeResult {
    /// True when the domain resolves to at least one address
    pub fn has_addresses(&self) -> bool {
        !self.a.records.is_empty() || !self.aaaa.records.is_empty()
    }

    /// Transport failure across the board; a single flaky type is not fatal
    pub fn all_failed(&self) -> bool {
        [&self.a, &self.aaaa, &self.mx, &self.ns, &self.txt, &self.cname]
            .iter()
            .all(|set| set.is_error())
    }
}

pub struct DnsProber {
    resolver: TokioResolver,
}

impl DnsProber {
    pub fn new(timeout: Duration) -> Self {
        let mut builder = Resolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        );
        builder.options_mut().timeout = timeout;
        Self { resolver: builder.build() }
    }

    /// Resolve all six record types concurrently for one domain.
    pub async fn probe(&self, domain: &str) -> DnsProbeResult {
        let (a, aaaa, mx, ns, txt, cname) = tokio::join!(
            self.lookup_a(domain),
            self.lookup_aaaa(domain),
            self.lookup_mx(domain),
            self.lookup_ns(domain),
            self.lookup_txt(domain),
            self.lookup_cname(domain),
        );

        let result = DnsProbeResult { domain: domain.to_string(), a, aaaa, mx, ns, txt, cname };
        tracing::debug!(
            "DNS probe for {}: {} A, {} AAAA, {} MX",
            domain,
            result.a.records.len(),
            result.aaaa.records.len(),
            result.mx.records.len()
        );
        result
    }

    async fn lookup_a(&self, domain: &str) -> DnsRecordSet {
        match self.resolver.ipv4_lookup(domain).await {
            Ok(lookup) => DnsRecordSet {
                records: lookup.iter().map(|r| r.to_string()).collect(),
                ttl: first_ttl(lookup.as_lookup()),
                error: None,
            },
            Err(e) => DnsRecordSet::from_error(&e),
        }
    }

    async fn lookup_aaaa(&self, domain: &str) -> DnsRecordSet {
        match self.resolver.ipv6_lookup(domain).await {
            Ok(lookup) => DnsRecordSet {
                records: lookup.iter().map(|r| r.to_string()).collect(),
                ttl: first_ttl(lookup.as_lookup()),
                error: None,
            },
            Err(e) => DnsRecordSet::from_error(&e),
        }
    }

    async fn lookup_mx(&self, domain: &str) -> DnsRecordSet {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => DnsRecordSet {
                records: lookup
                    .iter()
                    .map(|mx| format!("{} {}", mx.preference(), mx.exchange()))
                    .collect(),
                ttl: first_ttl(lookup.as_lookup()),
                error: None,
            },
            Err(e) => DnsRecordSet::from_error(&e),
        }
    }

    async fn lookup_ns(&self, domain: &str) -> DnsRecordSet {
        match self.resolver.ns_lookup(domain).await {
            Ok(lookup) => DnsRecordSet {
                records: lookup.iter().map(|ns| ns.to_string()).collect(),
                ttl: first_ttl(lookup.as_lookup()),
                error: None,
            },
            Err(e) => DnsRecordSet::from_error(&e),
        }
    }

    async fn lookup_txt(&self, domain: &str) -> DnsRecordSet {
        match self.resolver.txt_lookup(domain).await {
            Ok(lookup) => DnsRecordSet {
                records: lookup.iter().map(|txt| txt.to_string()).collect(),
                ttl: first_ttl(lookup.as_lookup()),
                error: None,
            },
            Err(e) => DnsRecordSet::from_error(&e),
        }
    }

    async fn lookup_cname(&self, domain: &str) -> DnsRecordSet {
        match self.resolver.lookup(domain, RecordType::CNAME).await {
            Ok(lookup) => DnsRecordSet {
                records: lookup.iter().map(|r| r.to_string()).collect(),
                ttl: first_ttl(&lookup),
                error: None,
            },
            Err(e) => DnsRecordSet::from_error(&e),
        }
    }
}

fn first_ttl(lookup: &hickory_resolver::lookup::Lookup) -> Option<u32> {
    lookup.record_iter().next().map(|record| record.ttl())
}

/// Negative answers (NXDOMAIN, NODATA) are not transport errors.
fn is_no_records(error: &ResolveError) -> bool {
    match error.kind() {
        ResolveErrorKind::Proto(proto) => {
            matches!(proto.kind(), ProtoErrorKind::NoRecordsFound { .. })
        },
        _ => false,
    }
}
