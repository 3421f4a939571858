//! Immutable profile catalog.
//!
//! The catalog is constructed once at startup, validated, and shared
//! read-only for the rest of the process lifetime.

use crate::utils::{AnalyzerError, AnalyzerResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileCategory {
    Core,
    Analysis,
    Intelligence,
    Meta,
}

impl ProfileCategory {
    /// Scheduling tie-break rank: CORE < ANALYSIS < INTELLIGENCE
    pub fn rank(&self) -> u8 {
        match self {
            Self::Core => 0,
            Self::Analysis => 1,
            Self::Intelligence => 2,
            Self::Meta => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Analysis => "analysis",
            Self::Intelligence => "intelligence",
            Self::Meta => "meta",
        }
    }
}

/// A named, reusable bundle of checks sharing a data source or theme
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub category: ProfileCategory,
    /// Profiles whose outputs must be available before this one runs.
    /// Always empty for META profiles.
    pub dependencies: Vec<String>,
    /// Member profiles. Non-empty only for META profiles; expansion may
    /// itself contain META names.
    pub members: Vec<String>,
    /// Concrete check identifiers executed by this profile
    pub checks: Vec<String>,
    pub description: String,
    /// Advisory, e.g. "~2s"
    pub estimated_duration: String,
}

impl Profile {
    fn new(
        name: &str,
        category: ProfileCategory,
        dependencies: &[&str],
        members: &[&str],
        checks: &[&str],
        description: &str,
        estimated_duration: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            category,
            dependencies: dependencies.iter().map(|s| s.to_string()).collect(),
            members: members.iter().map(|s| s.to_string()).collect(),
            checks: checks.iter().map(|s| s.to_string()).collect(),
            description: description.to_string(),
            estimated_duration: estimated_duration.to_string(),
        }
    }
}

/// Read-only registry of every known profile
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileCatalog {
    /// Build the shipped catalog.
    ///
    /// `quick_whois_in_meta` decides whether the monitor/quick-check meta
    /// profiles carry the DAS-only quick-whois member or full whois.
    pub fn builtin(quick_whois_in_meta: bool) -> AnalyzerResult<Self> {
        use ProfileCategory::*;

        let gate_whois = if quick_whois_in_meta { "quick-whois" } else { "whois" };

        let profiles = vec![
            Profile::new(
                "quick-whois",
                Core,
                &[],
                &[],
                &["das_status"],
                "Registration status via the DAS bulk protocol",
                "~1s",
            ),
            Profile::new(
                "whois",
                Core,
                &[],
                &[],
                &["whois_lookup"],
                "Registrar, dates and contacts via port-43 WHOIS",
                "~2s",
            ),
            Profile::new(
                "dns",
                Core,
                &[],
                &[],
                &["dns_records"],
                "A/AAAA/MX/NS/TXT/CNAME record sets",
                "~1s",
            ),
            Profile::new(
                "http",
                Core,
                &[],
                &[],
                &["http_probe"],
                "HTTP reachability, status and redirect chain",
                "~3s",
            ),
            Profile::new(
                "ssl",
                Core,
                &[],
                &[],
                &["tls_certificate"],
                "TLS handshake and certificate capture",
                "~2s",
            ),
            Profile::new(
                "active",
                Analysis,
                &["http", "dns"],
                &[],
                &["active_status"],
                "Active/inactive classification with redirect capture",
                "~1s",
            ),
            Profile::new(
                "content",
                Analysis,
                &["http"],
                &[],
                &["content_fetch"],
                "Page body retrieval and basic content statistics",
                "~3s",
            ),
            Profile::new(
                "headers",
                Analysis,
                &["http", "content"],
                &[],
                &["header_audit"],
                "Security and caching header audit",
                "~1s",
            ),
            Profile::new(
                "seo",
                Intelligence,
                &["content"],
                &[],
                &["seo_score"],
                "Title/description/heading heuristics",
                "~1s",
            ),
            Profile::new(
                "language",
                Intelligence,
                &["content"],
                &[],
                &["language_detect"],
                "Lithuanian-vs-other language heuristic",
                "~1s",
            ),
            Profile::new(
                "standard",
                Meta,
                &[],
                &["whois", "dns", "http", "ssl", "active", "headers"],
                &[],
                "Default scan set",
                "~8s",
            ),
            Profile::new(
                "complete",
                Meta,
                &[],
                &["standard", "content", "seo", "language"],
                &[],
                "Everything the analyzer knows how to run",
                "~12s",
            ),
            Profile::new(
                "monitor",
                Meta,
                &[],
                &[gate_whois, "http", "active"],
                &[],
                "Lightweight recurring availability check",
                "~4s",
            ),
            Profile::new(
                "quick-check",
                Meta,
                &[],
                &[gate_whois, "http"],
                &[],
                "Fastest registration plus reachability pass",
                "~3s",
            ),
        ];

        let catalog = Self {
            profiles: profiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn by_category(&self, category: ProfileCategory) -> Vec<&Profile> {
        self.profiles.values().filter(|p| p.category == category).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Validate the catalog once at load time.
    ///
    /// Checks, in order: every dependency and META member refers to a known
    /// profile; the transitive dependency graph is acyclic; META expansion
    /// terminates; CORE profiles carry no dependencies.
    pub fn validate(&self) -> AnalyzerResult<()> {
        for profile in self.profiles.values() {
            for dep in &profile.dependencies {
                if !self.profiles.contains_key(dep) {
                    return Err(AnalyzerError::config(format!(
                        "profile '{}' depends on unknown profile '{}'",
                        profile.name, dep
                    )));
                }
            }
            for member in &profile.members {
                if !self.profiles.contains_key(member) {
                    return Err(AnalyzerError::config(format!(
                        "meta profile '{}' references unknown member '{}'",
                        profile.name, member
                    )));
                }
            }

            if profile.category == ProfileCategory::Meta && profile.members.is_empty() {
                return Err(AnalyzerError::config(format!(
                    "meta profile '{}' has no members",
                    profile.name
                )));
            }

            if profile.category == ProfileCategory::Core && !profile.dependencies.is_empty() {
                return Err(AnalyzerError::config(format!(
                    "core profile '{}' must not declare dependencies",
                    profile.name
                )));
            }
        }

        self.check_dependency_cycles()?;
        self.check_meta_termination()?;

        Ok(())
    }

    /// DFS with grey/black marking over the non-META dependency graph.
    fn check_dependency_cycles(&self) -> AnalyzerResult<()> {
        #[derive(PartialEq, Clone, Copy)]
        enum Mark {
            Grey,
            Black,
        }

        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();

        fn visit<'a>(
            catalog: &'a ProfileCatalog,
            name: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
            stack: &mut Vec<String>,
        ) -> AnalyzerResult<()> {
            match marks.get(name) {
                Some(Mark::Black) => return Ok(()),
                Some(Mark::Grey) => {
                    let mut cycle = stack.clone();
                    cycle.push(name.to_string());
                    return Err(AnalyzerError::CircularDependency(cycle));
                },
                None => {},
            }

            marks.insert(name, Mark::Grey);
            stack.push(name.to_string());

            if let Some(profile) = catalog.get(name) {
                for dep in &profile.dependencies {
                    visit(catalog, dep, marks, stack)?;
                }
            }

            stack.pop();
            marks.insert(name, Mark::Black);
            Ok(())
        }

        for name in self.profiles.keys() {
            let mut stack = Vec::new();
            visit(self, name, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    /// META membership must not be cyclic, otherwise expansion never ends.
    fn check_meta_termination(&self) -> AnalyzerResult<()> {
        for profile in self.profiles.values() {
            if profile.category != ProfileCategory::Meta {
                continue;
            }
            let mut seen: HashSet<&str> = HashSet::new();
            let mut queue: Vec<&str> = vec![profile.name.as_str()];
            while let Some(name) = queue.pop() {
                if !seen.insert(name) {
                    continue;
                }
                if let Some(p) = self.get(name) {
                    for member in &p.members {
                        if member == &profile.name {
                            return Err(AnalyzerError::CircularDependency(vec![
                                profile.name.clone(),
                                name.to_string(),
                            ]));
                        }
                        queue.push(member);
                    }
                }
            }
        }
        Ok(())
    }
}
