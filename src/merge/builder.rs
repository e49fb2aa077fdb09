//! Merge of digest and tag rules into one canonical configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::merge::canonical::{CanonicalRegistryConfig, MirrorEndpoint, RegistryEntry};
use crate::merge::normalize::normalize_endpoint;
use crate::rules::{MirrorRule, MirrorRuleSet, RuleKind};

/// Two resources of the same kind disagree about the mirrors of one source.
///
/// Any difference counts, including lists that share endpoints but differ in
/// membership or order. Only identical lists are silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictWarning {
    pub reference: String,
    pub kind: RuleKind,
    /// Resource whose endpoints come first.
    pub winner: String,
    /// Resource whose unique endpoints are appended after the winner's.
    pub loser: String,
}

impl fmt::Display for ConflictWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflicting {} mirror rules for {}: {} takes precedence over {}",
            self.kind, self.reference, self.winner, self.loser
        )
    }
}

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    pub config: CanonicalRegistryConfig,
    pub conflicts: Vec<ConflictWarning>,
}

/// A rule with its endpoints normalized for comparison.
struct Candidate<'a> {
    rule: &'a MirrorRule,
    mirrors: Vec<String>,
}

/// Merge every rule into one canonical configuration.
///
/// Within a source reference, digest rules come before tag rules; rules of
/// the same kind are ordered by resource creation time, then resource name,
/// then position inside the resource. Endpoints are de-duplicated keeping the
/// first occurrence.
pub fn merge(rules: &MirrorRuleSet) -> MergeOutput {
    let mut groups: BTreeMap<String, Vec<Candidate<'_>>> = BTreeMap::new();
    for rule in rules.iter() {
        let reference = normalize_endpoint(&rule.source);
        if reference.is_empty() {
            tracing::warn!(origin = %rule.origin, kind = %rule.kind, "Ignoring mirror rule with empty source");
            continue;
        }
        let mirrors = rule
            .mirrors
            .iter()
            .map(|m| normalize_endpoint(m))
            .filter(|m| !m.is_empty())
            .collect();
        groups.entry(reference).or_default().push(Candidate { rule, mirrors });
    }

    let mut registries = BTreeMap::new();
    let mut conflicts = Vec::new();
    for (reference, mut candidates) in groups {
        candidates.sort_by(|a, b| {
            a.rule
                .precedence_key()
                .cmp(&b.rule.precedence_key())
                .then_with(|| a.mirrors.cmp(&b.mirrors))
        });
        detect_conflicts(&reference, &candidates, &mut conflicts);
        registries.insert(reference, merge_group(&candidates));
    }

    MergeOutput {
        config: CanonicalRegistryConfig::new(registries),
        conflicts,
    }
}

/// The first rule of each kind wins; every other resource of that kind with a
/// different endpoint list is reported once.
fn detect_conflicts(reference: &str, candidates: &[Candidate<'_>], out: &mut Vec<ConflictWarning>) {
    for kind in [RuleKind::Digest, RuleKind::Tag] {
        let mut same_kind = candidates.iter().filter(|c| c.rule.kind == kind);
        let Some(winner) = same_kind.next() else {
            continue;
        };

        let mut reported = BTreeSet::new();
        for other in same_kind {
            if other.rule.origin == winner.rule.origin || other.mirrors == winner.mirrors {
                continue;
            }
            if reported.insert(other.rule.origin.name.as_str()) {
                out.push(ConflictWarning {
                    reference: reference.to_string(),
                    kind,
                    winner: winner.rule.origin.name.clone(),
                    loser: other.rule.origin.name.clone(),
                });
            }
        }
    }
}

fn merge_group(candidates: &[Candidate<'_>]) -> RegistryEntry {
    let mut entry = RegistryEntry::default();
    for candidate in candidates {
        entry.never_contact_source |= candidate.rule.never_contact_source;

        let is_digest = candidate.rule.kind == RuleKind::Digest;
        for location in &candidate.mirrors {
            match entry.mirrors.iter_mut().find(|m| &m.location == location) {
                Some(existing) => {
                    existing.pull_by_digest |= is_digest;
                    existing.pull_by_tag |= !is_digest;
                }
                None => entry.mirrors.push(MirrorEndpoint {
                    location: location.clone(),
                    pull_by_digest: is_digest,
                    pull_by_tag: !is_digest,
                }),
            }
        }
    }
    entry
}
