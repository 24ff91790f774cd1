//! Package selectors given on the command line.

use wgm_schema::PackageId;

/// A `Publisher` or `Publisher/Package` selector as typed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFilter {
    publisher: String,
    package: Option<String>,
}

impl PackageFilter {
    /// Split on the first `/`. Anything is accepted.
    pub fn parse(s: &str) -> Self {
        match s.split_once('/') {
            Some((publisher, package)) => Self {
                publisher: publisher.to_string(),
                package: Some(package.to_string()),
            },
            None => Self {
                publisher: s.to_string(),
                package: None,
            },
        }
    }

    /// Publisher part as typed.
    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Package part, if one was given.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Manifest shard the publisher lives in.
    pub fn shard(&self) -> Option<String> {
        self.publisher
            .chars()
            .next()
            .map(|c| c.to_lowercase().collect())
    }

    /// Case-insensitive publisher prefix match.
    pub fn matches_publisher(&self, name: &str) -> bool {
        starts_with_ignore_case(name, &self.publisher)
    }

    /// Case-insensitive package prefix match. True when no package part was
    /// given.
    pub fn matches_package_prefix(&self, name: &str) -> bool {
        self.package
            .as_deref()
            .is_none_or(|p| starts_with_ignore_case(name, p))
    }

    /// Case-insensitive exact package match. True when no package part was
    /// given.
    pub fn matches_package_exact(&self, name: &str) -> bool {
        self.package
            .as_deref()
            .is_none_or(|p| name.eq_ignore_ascii_case(p))
    }

    /// Match an identity already held in state: exact id with a package
    /// part, publisher prefix without.
    pub fn matches_downloaded(&self, id: &PackageId) -> bool {
        match &self.package {
            Some(package) => id.publisher() == self.publisher && id.package() == package,
            None => self.matches_publisher(id.publisher()),
        }
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.to_lowercase().starts_with(&prefix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_forms() {
        let f = PackageFilter::parse("Microsoft");
        assert_eq!(f.publisher(), "Microsoft");
        assert_eq!(f.package(), None);
        assert_eq!(f.shard().as_deref(), Some("m"));

        let f = PackageFilter::parse("Spotify/Spotify");
        assert_eq!(f.package(), Some("Spotify"));

        assert_eq!(PackageFilter::parse("").shard(), None);
    }

    #[test]
    fn downloaded_matching() {
        let teams = PackageId::parse("Microsoft.Teams").unwrap();
        assert!(PackageFilter::parse("micro").matches_downloaded(&teams));
        assert!(PackageFilter::parse("Microsoft/Teams").matches_downloaded(&teams));
        assert!(!PackageFilter::parse("Microsoft/Team").matches_downloaded(&teams));
        assert!(!PackageFilter::parse("Mozilla").matches_downloaded(&teams));
    }
}
