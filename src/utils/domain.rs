//! Pure helpers for hostname normalization and `.lt` family analysis.
//!
//! Everything in this module is deterministic and idempotent; the orchestrator
//! and the active analyzer lean on these functions for redirect-chain capture.

use crate::utils::collection_ext::unique_ordered;

/// Normalize a URL or hostname into a bare lowercase host.
///
/// Strips the scheme, path, query, port and a leading `www.` label.
///
/// # Example
/// ```ignore
/// assert_eq!(normalize("https://www.Example.LT/path?q=1"), "example.lt");
/// ```
pub fn normalize(host: &str) -> String {
    let mut s = host.trim();

    if let Some(idx) = s.find("://") {
        s = &s[idx + 3..];
    }

    // Drop path, query and fragment
    for sep in ['/', '?', '#'] {
        if let Some(idx) = s.find(sep) {
            s = &s[..idx];
        }
    }

    // Drop userinfo and port
    if let Some(idx) = s.rfind('@') {
        s = &s[idx + 1..];
    }
    if let Some(idx) = s.find(':') {
        s = &s[..idx];
    }

    let mut s = s.trim_end_matches('.').to_lowercase();
    if let Some(stripped) = s.strip_prefix("www.") {
        s = stripped.to_string();
    }
    s
}

/// Reduce a host to its registrable root.
///
/// Hosts ending with one of `keep_patterns` (e.g. `.gov.lt`) keep their
/// subdomain labels; everything else is cut down to the rightmost two labels.
pub fn extract_main(host: &str, keep_patterns: &[String]) -> String {
    let host = normalize(host);

    if keep_patterns.iter().any(|p| host.ends_with(p.as_str())) {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }
    labels[labels.len() - 2..].join(".")
}

/// True iff the host sits under the `.lt` top-level domain.
pub fn is_lithuanian(host: &str) -> bool {
    let host = normalize(host);
    host.rsplit('.').next() == Some("lt") && host.len() > 3
}

/// Two hosts belong to the same family when they share a registrable root.
pub fn same_family(a: &str, b: &str, keep_patterns: &[String]) -> bool {
    extract_main(a, keep_patterns) == extract_main(b, keep_patterns)
}

/// Extract distinct `.lt` roots from a redirect chain, excluding the origin's
/// own family and an ignore list of well-known service hosts.
///
/// Order of first occurrence in the chain is preserved.
pub fn extract_lt_from_chain(
    chain: &[String],
    origin: &str,
    keep_patterns: &[String],
    ignore: &[String],
) -> Vec<String> {
    let roots: Vec<String> = chain
        .iter()
        .map(|url| extract_main(url, keep_patterns))
        .filter(|root| !root.is_empty())
        .filter(|root| is_lithuanian(root))
        .filter(|root| !ignore.iter().any(|i| i == root))
        .filter(|root| !same_family(root, origin, keep_patterns))
        .collect();

    unique_ordered(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep() -> Vec<String> {
        vec![".gov.lt".into(), ".lrv.lt".into(), ".edu.lt".into(), ".mil.lt".into()]
    }

    #[test]
    fn normalize_strips_scheme_path_port_and_www() {
        assert_eq!(normalize("https://www.Example.LT/path?q=1"), "example.lt");
        assert_eq!(normalize("http://example.lt:8080/"), "example.lt");
        assert_eq!(normalize("example.lt."), "example.lt");
        assert_eq!(normalize("www.example.lt"), "example.lt");
    }

    #[test]
    fn extract_main_cuts_to_two_labels() {
        assert_eq!(extract_main("a.b.example.lt", &keep()), "example.lt");
        assert_eq!(extract_main("example.lt", &keep()), "example.lt");
    }

    #[test]
    fn extract_main_preserves_keep_patterns() {
        assert_eq!(extract_main("stat.gov.lt", &keep()), "stat.gov.lt");
        assert_eq!(extract_main("https://www.stat.gov.lt/page", &keep()), "stat.gov.lt");
        assert_eq!(extract_main("vilnius.lrv.lt", &keep()), "vilnius.lrv.lt");
    }

    #[test]
    fn extract_main_is_idempotent() {
        for host in ["a.b.example.lt", "stat.gov.lt", "example.lt", "https://www.example.lt/x"] {
            let once = extract_main(host, &keep());
            assert_eq!(extract_main(&once, &keep()), once);
        }
    }

    #[test]
    fn lithuanian_detection() {
        assert!(is_lithuanian("example.lt"));
        assert!(is_lithuanian("https://www.example.lt/x"));
        assert!(!is_lithuanian("example.lt.com"));
        assert!(!is_lithuanian("example.com"));
    }

    #[test]
    fn same_family_follows_extract_main() {
        assert!(same_family("www.example.lt", "sub.example.lt", &keep()));
        assert!(!same_family("example.lt", "other.lt", &keep()));
        // Preserved subdomains are distinct families
        assert!(!same_family("stat.gov.lt", "kam.gov.lt", &keep()));
    }

    #[test]
    fn chain_extraction_dedups_and_skips_origin_family() {
        let chain = vec![
            "http://gyvigali.lt".to_string(),
            "https://augalyn.lt/landing".to_string(),
            "https://www.augalyn.lt".to_string(),
            "https://cdn.example.com".to_string(),
        ];
        let captured = extract_lt_from_chain(&chain, "gyvigali.lt", &keep(), &[]);
        assert_eq!(captured, vec!["augalyn.lt".to_string()]);
    }

    #[test]
    fn chain_extraction_honors_ignore_list() {
        let chain = vec!["https://serveriai.lt/parked".to_string()];
        let ignore = vec!["serveriai.lt".to_string()];
        let captured = extract_lt_from_chain(&chain, "example.lt", &keep(), &ignore);
        assert!(captured.is_empty());
    }

    #[test]
    fn chain_extraction_keeps_government_subdomains() {
        let chain = vec!["https://stat.gov.lt/report".to_string()];
        let captured = extract_lt_from_chain(&chain, "example.lt", &keep(), &[]);
        assert_eq!(captured, vec!["stat.gov.lt".to_string()]);
    }
}
