//! Key namespacing for stored objects.
//!
//! Every object class lives under its own prefix (`task:`, `preview:`,
//! `image:`, `zip:`, `status:`) so a prefix scan selects exactly one class.
//! All key construction in the crate goes through [`Namespace`]; nothing
//! builds raw key strings by hand.

use std::fmt;

/// The object classes stored in the cache, one per key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Generation task records (`task:<id>`).
    Task,
    /// Rendered preview pages (`preview:<id>`).
    Preview,
    /// Encoded images (`image:<id>`).
    Image,
    /// Packaged ZIP downloads (`zip:<id>`).
    Zip,
    /// Status pages (`status:<id>`).
    Status,
}

impl Namespace {
    /// All namespaces, in declaration order.
    pub const ALL: [Namespace; 5] = [
        Namespace::Task,
        Namespace::Preview,
        Namespace::Image,
        Namespace::Zip,
        Namespace::Status,
    ];

    /// The key prefix tag for this namespace, without the separator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Preview => "preview",
            Self::Image => "image",
            Self::Zip => "zip",
            Self::Status => "status",
        }
    }

    /// Builds the storage key for an object id, e.g. `task:abc123`.
    pub fn key(&self, id: &str) -> String {
        format!("{}:{id}", self.as_str())
    }

    /// The scan pattern matching every key in this namespace, e.g. `task:*`.
    pub fn pattern(&self) -> String {
        format!("{}:*", self.as_str())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_prefix_and_id() {
        assert_eq!(Namespace::Task.key("abc123"), "task:abc123");
        assert_eq!(Namespace::Zip.key("dl-1"), "zip:dl-1");
    }

    #[test]
    fn pattern_matches_namespace_keys() {
        for ns in Namespace::ALL {
            let pattern = ns.pattern();
            assert!(pattern.ends_with('*'));
            let key = ns.key("some-id");
            assert!(key.starts_with(pattern.trim_end_matches('*')));
        }
    }

    #[test]
    fn prefixes_are_distinct() {
        for a in Namespace::ALL {
            for b in Namespace::ALL {
                if a != b {
                    // No prefix may shadow another, or scans would bleed
                    // across object classes.
                    assert!(!a.key("x").starts_with(b.pattern().trim_end_matches('*')));
                }
            }
        }
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(Namespace::Preview.to_string(), "preview");
    }
}
