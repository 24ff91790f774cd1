//! Version ordering for manifest directory labels.
//!
//! Upstream labels are mostly dotted integers (`1.2.3`, `24.1.0.512`) but a
//! fair number are not (`1.2-beta`, `2023.10.x`, `latest`). Every label still
//! gets an ordering key:
//!
//! - Strict: dotted non-negative integers, optional leading `v`.
//! - Fallback: integer components up to the first part that is not one,
//!   padded with zeros to at least three components.
//!
//! Keys compare component-wise with missing trailing components read as
//! zero, so `1.2` and `1.2.0` are equal, and so are `1.2.beta` and `1.2`.

use std::cmp::Ordering;
use std::fmt;

const MIN_FALLBACK_COMPONENTS: usize = 3;

/// Ordering key derived from a version label.
#[derive(Debug, Clone)]
pub struct VersionKey {
    parts: Vec<u64>,
    strict: bool,
}

impl VersionKey {
    /// Numeric components of the key.
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Whether the label parsed as strict dotted integers.
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl PartialEq for VersionKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionKey {}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| {
                let a = self.parts.get(i).copied().unwrap_or(0);
                let b = other.parts.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        f.write_str(&joined.join("."))
    }
}

fn normalize(v: &str) -> &str {
    let v = v.trim();
    v.strip_prefix(['v', 'V']).unwrap_or(v)
}

fn parse_component(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Build the ordering key for any label. Never fails.
pub fn parse_order_key(v: &str) -> VersionKey {
    let v = normalize(v);

    let strict: Option<Vec<u64>> = v.split('.').map(parse_component).collect();
    if let Some(parts) = strict {
        return VersionKey {
            parts,
            strict: true,
        };
    }

    let mut parts: Vec<u64> = v.split('.').map_while(parse_component).collect();
    if parts.len() < MIN_FALLBACK_COMPONENTS {
        parts.resize(MIN_FALLBACK_COMPONENTS, 0);
    }
    VersionKey {
        parts,
        strict: false,
    }
}

/// Whether a label can take part in resolution at all. Only blank labels
/// are rejected; malformed ones still order through the fallback key.
pub fn is_resolvable(v: &str) -> bool {
    !v.trim().is_empty()
}

/// Compare two labels by their ordering keys.
pub fn compare(a: &str, b: &str) -> Ordering {
    parse_order_key(a).cmp(&parse_order_key(b))
}

/// Returns true if `candidate` orders strictly after `current`.
pub fn is_newer(current: &str, candidate: &str) -> bool {
    compare(candidate, current) == Ordering::Greater
}

/// Pick the highest label.
///
/// Blank labels are skipped. When several labels share the highest key the
/// first one in iteration order wins, so a sorted input resolves the same
/// way on every run.
pub fn resolve<'a, I>(candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, VersionKey)> = None;
    for candidate in candidates.into_iter().filter(|c| is_resolvable(c)) {
        let key = parse_order_key(candidate);
        match &best {
            Some((_, best_key)) if key <= *best_key => {}
            _ => best = Some((candidate, key)),
        }
    }
    best.map(|(v, _)| v)
}

/// Sort labels ascending by ordering key. Stable, so equal keys keep their
/// input order.
pub fn sort_ascending(versions: &mut [String]) {
    versions.sort_by_cached_key(|v| parse_order_key(v));
}
