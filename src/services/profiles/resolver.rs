//! Profile resolver: turns a requested profile list into an execution plan.
//!
//! META profiles are expanded recursively, transitive dependencies pulled in,
//! and the result topologically sorted with a deterministic tie-break so the
//! same request always yields the same plan.

use super::catalog::{ProfileCatalog, ProfileCategory};
use crate::utils::{AnalyzerError, AnalyzerResult, unique_ordered};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Resolved, schedulable view of one profile request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Names exactly as the caller provided them
    pub requested: Vec<String>,
    /// META profiles replaced by their non-META members, first occurrence wins
    pub expanded: Vec<String>,
    /// Topological order; dependencies strictly precede dependents
    pub execution_order: Vec<String>,
    /// DAG levels: every profile's dependencies lie in strictly earlier groups
    pub parallel_groups: Vec<Vec<String>>,
    pub core_profiles: Vec<String>,
    pub analysis_profiles: Vec<String>,
    pub intelligence_profiles: Vec<String>,
    pub estimated_duration: String,
}

impl ExecutionPlan {
    pub fn contains(&self, name: &str) -> bool {
        self.execution_order.iter().any(|n| n == name)
    }
}

/// Split comma-separated CLI input into candidate profile names.
///
/// Lowercases and trims each element; empty elements are rejected.
pub fn parse_profile_request(input: &str) -> AnalyzerResult<Vec<String>> {
    if input.trim().is_empty() {
        return Err(AnalyzerError::EmptyProfileRequest);
    }

    let mut names = Vec::new();
    for part in input.split(',') {
        let name = part.trim().to_lowercase();
        if name.is_empty() {
            return Err(AnalyzerError::invalid_input(format!(
                "empty profile name in request '{input}'"
            )));
        }
        names.push(name);
    }
    Ok(names)
}

/// Resolve a requested profile set into an [`ExecutionPlan`].
///
/// Fails with `UnknownProfile` or `CircularDependency`; no partial plan is
/// ever returned.
pub fn resolve(catalog: &ProfileCatalog, requested: &[String]) -> AnalyzerResult<ExecutionPlan> {
    if requested.is_empty() {
        return Err(AnalyzerError::EmptyProfileRequest);
    }

    for name in requested {
        if catalog.get(name).is_none() {
            return Err(AnalyzerError::unknown_profile(name));
        }
    }

    let expanded = expand_meta(catalog, requested);
    let closure = dependency_closure(catalog, &expanded);
    let execution_order = topological_sort(catalog, &closure)?;
    let parallel_groups = level_groups(catalog, &execution_order);

    let mut core_profiles = Vec::new();
    let mut analysis_profiles = Vec::new();
    let mut intelligence_profiles = Vec::new();
    for name in &execution_order {
        if let Some(profile) = catalog.get(name) {
            match profile.category {
                ProfileCategory::Core => core_profiles.push(name.clone()),
                ProfileCategory::Analysis => analysis_profiles.push(name.clone()),
                ProfileCategory::Intelligence => intelligence_profiles.push(name.clone()),
                ProfileCategory::Meta => {},
            }
        }
    }

    let estimated_duration = estimate_duration(catalog, &execution_order);

    Ok(ExecutionPlan {
        requested: requested.to_vec(),
        expanded,
        execution_order,
        parallel_groups,
        core_profiles,
        analysis_profiles,
        intelligence_profiles,
        estimated_duration,
    })
}

/// Replace META names by their non-META members, depth-first, keeping the
/// first occurrence of every resulting name.
fn expand_meta(catalog: &ProfileCatalog, requested: &[String]) -> Vec<String> {
    let mut result = Vec::new();
    let mut seen_meta: HashSet<String> = HashSet::new();

    fn expand_one(
        catalog: &ProfileCatalog,
        name: &str,
        seen_meta: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) {
        let Some(profile) = catalog.get(name) else { return };
        if profile.category == ProfileCategory::Meta {
            // Seen-set keyed by META name terminates cyclic definitions
            if !seen_meta.insert(name.to_string()) {
                return;
            }
            for member in &profile.members {
                expand_one(catalog, member, seen_meta, out);
            }
        } else {
            out.push(name.to_string());
        }
    }

    for name in requested {
        expand_one(catalog, name, &mut seen_meta, &mut result);
    }

    unique_ordered(result)
}

/// Add transitive dependencies of every expanded profile.
fn dependency_closure(catalog: &ProfileCatalog, expanded: &[String]) -> Vec<String> {
    let mut result: Vec<String> = expanded.to_vec();
    let mut seen: HashSet<String> = expanded.iter().cloned().collect();
    let mut queue: Vec<String> = expanded.to_vec();

    while let Some(name) = queue.pop() {
        if let Some(profile) = catalog.get(&name) {
            for dep in &profile.dependencies {
                if seen.insert(dep.clone()) {
                    result.push(dep.clone());
                    queue.push(dep.clone());
                }
            }
        }
    }

    result
}

/// Kahn's algorithm with a deterministic tie-break: category rank
/// (CORE < ANALYSIS < INTELLIGENCE), then name.
fn topological_sort(catalog: &ProfileCatalog, names: &[String]) -> AnalyzerResult<Vec<String>> {
    let name_set: HashSet<&str> = names.iter().map(String::as_str).collect();

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for name in names {
        let profile = catalog
            .get(name)
            .ok_or_else(|| AnalyzerError::unknown_profile(name))?;
        let degree = profile
            .dependencies
            .iter()
            .filter(|d| name_set.contains(d.as_str()))
            .count();
        in_degree.insert(name.as_str(), degree);
        for dep in &profile.dependencies {
            if name_set.contains(dep.as_str()) {
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }
    }

    let rank = |name: &str| -> (u8, String) {
        let category = catalog.get(name).map(|p| p.category.rank()).unwrap_or(u8::MAX);
        (category, name.to_string())
    };

    let mut ready: BTreeSet<(u8, String)> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| rank(n))
        .collect();

    let mut order = Vec::with_capacity(names.len());
    while let Some(entry) = ready.iter().next().cloned() {
        ready.remove(&entry);
        let (_, name) = entry;
        order.push(name.clone());

        if let Some(children) = dependents.get(name.as_str()) {
            for child in children {
                let degree = in_degree.get_mut(child).expect("in-degree tracked");
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(rank(child));
                }
            }
        }
    }

    if order.len() != names.len() {
        let remaining: Vec<String> = names
            .iter()
            .filter(|n| !order.contains(n))
            .cloned()
            .collect();
        return Err(AnalyzerError::CircularDependency(remaining));
    }

    Ok(order)
}

/// Extract DAG levels: group k holds every profile whose dependencies all
/// landed in groups < k.
fn level_groups(catalog: &ProfileCatalog, execution_order: &[String]) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut placed: HashSet<String> = HashSet::new();
    let in_plan: HashSet<&str> = execution_order.iter().map(String::as_str).collect();

    while placed.len() < execution_order.len() {
        let mut group = Vec::new();
        for name in execution_order {
            if placed.contains(name) {
                continue;
            }
            let ready = catalog
                .get(name)
                .map(|p| {
                    p.dependencies
                        .iter()
                        .filter(|d| in_plan.contains(d.as_str()))
                        .all(|d| placed.contains(d))
                })
                .unwrap_or(true);
            if ready {
                group.push(name.clone());
            }
        }

        if group.is_empty() {
            // Unreachable after a successful topological sort
            break;
        }

        placed.extend(group.iter().cloned());
        groups.push(group);
    }

    groups
}

/// Sum member estimates into an advisory total, e.g. "~9s".
fn estimate_duration(catalog: &ProfileCatalog, names: &[String]) -> String {
    let total: u64 = names
        .iter()
        .filter_map(|n| catalog.get(n))
        .filter_map(|p| {
            p.estimated_duration
                .trim_start_matches('~')
                .trim_end_matches('s')
                .parse::<u64>()
                .ok()
        })
        .sum();
    format!("~{total}s")
}
