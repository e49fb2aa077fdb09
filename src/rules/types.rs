//! Rule types produced by a source read.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of mirror rule. Declaration order is merge precedence: digest-pinned
/// rules are more specific and win over tag-based ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Digest,
    Tag,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Digest => "digest",
            RuleKind::Tag => "tag",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resource a rule was read from.
///
/// Ordering is precedence among resources of the same kind: earliest
/// creation first, then resource name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleOrigin {
    pub created: DateTime<Utc>,
    pub name: String,
}

impl RuleOrigin {
    pub fn new(name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            created,
            name: name.into(),
        }
    }
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One source registry reference and its ordered mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRule {
    /// Source registry reference, `host[/namespace]`.
    pub source: String,
    /// Mirror endpoints in the order the resource declared them.
    pub mirrors: Vec<String>,
    pub kind: RuleKind,
    pub origin: RuleOrigin,
    /// Index of this entry inside its resource.
    pub position: usize,
    pub never_contact_source: bool,
}

impl MirrorRule {
    pub fn new<I, S>(kind: RuleKind, origin: RuleOrigin, source: impl Into<String>, mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: source.into(),
            mirrors: mirrors.into_iter().map(Into::into).collect(),
            kind,
            origin,
            position: 0,
            never_contact_source: false,
        }
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn never_contact_source(mut self, never: bool) -> Self {
        self.never_contact_source = never;
        self
    }

    /// Total order used when merging rules for the same source.
    pub fn precedence_key(&self) -> (RuleKind, &RuleOrigin, usize) {
        (self.kind, &self.origin, self.position)
    }
}

/// Every rule read in one pass, partitioned by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorRuleSet {
    pub digest: Vec<MirrorRule>,
    pub tag: Vec<MirrorRule>,
}

impl MirrorRuleSet {
    pub fn new(digest: Vec<MirrorRule>, tag: Vec<MirrorRule>) -> Self {
        Self { digest, tag }
    }

    /// Add a rule to the partition matching its kind.
    pub fn push(&mut self, rule: MirrorRule) {
        match rule.kind {
            RuleKind::Digest => self.digest.push(rule),
            RuleKind::Tag => self.tag.push(rule),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MirrorRule> {
        self.digest.iter().chain(self.tag.iter())
    }

    pub fn len(&self) -> usize {
        self.digest.len() + self.tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
