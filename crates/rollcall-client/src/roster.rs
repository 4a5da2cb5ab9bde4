use std::collections::HashSet;

/// Collapse runs of whitespace, trim, and lowercase.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The set of names allowed to submit. Loading it from the datastore is the
/// embedding application's job; this only answers membership.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    normalized: HashSet<String>,
}

impl Roster {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized = names
            .into_iter()
            .map(|n| normalize_name(n.as_ref()))
            .filter(|n| !n.is_empty())
            .collect();
        Self { normalized }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.normalized.contains(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_ignores_case_and_spacing() {
        let roster = Roster::new(["Alice  Smith", "Bob"]);
        assert!(roster.contains("alice smith"));
        assert!(roster.contains("  ALICE   Smith "));
        assert!(!roster.contains("Alice"));
    }

    #[test]
    fn blank_names_are_dropped() {
        let roster = Roster::new(["", "   ", "Carol"]);
        assert_eq!(roster.len(), 1);
        assert!(!roster.contains(""));
    }
}
