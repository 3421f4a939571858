//! Collection helpers used by the profile resolver and redirect-chain
//! extraction, where first-occurrence order is part of the contract.

use std::collections::HashSet;
use std::hash::Hash;

/// Deduplicate while preserving first-occurrence order.
///
/// # Example
/// ```ignore
/// let names = vec!["http", "dns", "http"];
/// let unique = unique_ordered(names); // ["http", "dns"]
/// ```
#[inline]
pub fn unique_ordered<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}
