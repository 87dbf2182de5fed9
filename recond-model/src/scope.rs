use serde::{Deserialize, Serialize};

/// The category a scope target belongs to.
///
/// Wire values match the original dashboard payloads (`wildcard`, `domain`,
/// `out-of-scope`), which double as the scope file names on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeKind {
    Wildcard,
    Domain,
    OutOfScope,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 3] = [ScopeKind::Wildcard, ScopeKind::Domain, ScopeKind::OutOfScope];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Wildcard => "wildcard",
            ScopeKind::Domain => "domain",
            ScopeKind::OutOfScope => "out-of-scope",
        }
    }

    /// File the kind's entries are persisted in, relative to a project's
    /// `scope/` directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ScopeKind::Wildcard => "wildcard.txt",
            ScopeKind::Domain => "domain.txt",
            ScopeKind::OutOfScope => "out-of-scope.txt",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "wildcard" => Some(ScopeKind::Wildcard),
            "domain" => Some(ScopeKind::Domain),
            "out-of-scope" => Some(ScopeKind::OutOfScope),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project's full target scope.
///
/// Entries are trimmed, lowercased, and unique within their kind. The struct
/// is also the snapshot handed to a tool run; snapshots are taken at tool
/// start and never updated mid-run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub wildcards: Vec<String>,
    pub domains: Vec<String>,
    pub out_of_scope: Vec<String>,
}

impl Scope {
    pub fn entries(&self, kind: ScopeKind) -> &[String] {
        match kind {
            ScopeKind::Wildcard => &self.wildcards,
            ScopeKind::Domain => &self.domains,
            ScopeKind::OutOfScope => &self.out_of_scope,
        }
    }

    pub fn entries_mut(&mut self, kind: ScopeKind) -> &mut Vec<String> {
        match kind {
            ScopeKind::Wildcard => &mut self.wildcards,
            ScopeKind::Domain => &mut self.domains,
            ScopeKind::OutOfScope => &mut self.out_of_scope,
        }
    }

    /// Wildcard entries with any leading `*.` stripped, the form discovery
    /// tools expect.
    pub fn wildcard_roots(&self) -> Vec<String> {
        self.wildcards
            .iter()
            .map(|w| w.trim_start_matches("*.").to_string())
            .filter(|w| !w.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.wildcards.is_empty() && self.domains.is_empty() && self.out_of_scope.is_empty()
    }
}
