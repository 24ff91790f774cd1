//! Retention policy for unpinned versions.

use crate::state::PackageState;
use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeSet;
use wgm_schema::version::parse_order_key;

/// Whole calendar months between `then` and `now`, ignoring the day.
pub fn age_in_months(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let years = i64::from(now.year()) - i64::from(then.year());
    let months = i64::from(now.month()) - i64::from(then.month());
    years * 12 + months
}

/// Unpinned versions of `package` eligible for removal.
///
/// Count rule: all but the `max_count` highest unpinned versions (by version
/// order, not recency). Age rule: unpinned versions older than
/// `max_age_months`. The result is the union; pinned versions never appear.
pub fn plan_cleanup(
    package: &PackageState,
    now: DateTime<Utc>,
    max_count: usize,
    max_age_months: u32,
) -> BTreeSet<String> {
    let mut unpinned: Vec<(&String, DateTime<Utc>)> = package
        .versions
        .iter()
        .filter(|(_, entry)| !entry.pinned)
        .map(|(version, entry)| (version, entry.timestamp))
        .collect();
    unpinned.sort_by_cached_key(|(version, _)| parse_order_key(version));

    let mut eligible = BTreeSet::new();

    let excess = unpinned.len().saturating_sub(max_count);
    for (version, _) in &unpinned[..excess] {
        eligible.insert((*version).clone());
    }

    for (version, timestamp) in &unpinned {
        if age_in_months(*timestamp, now) > i64::from(max_age_months) {
            eligible.insert((*version).clone());
        }
    }

    eligible
}
