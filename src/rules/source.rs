//! Consistent snapshot of both mirror-set collections.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::cluster::StoreError;
use crate::merge::normalize::normalize_endpoint;
use crate::rules::resources::{ImageDigestMirrorSet, ImageMirrors, ImageTagMirrorSet, MirrorSourcePolicy, ObjectMeta};
use crate::rules::types::{MirrorRule, MirrorRuleSet, RuleKind, RuleOrigin};

/// Both mirror-set collections as returned by one store read.
#[derive(Debug, Default)]
pub struct MirrorSets {
    pub digest: Vec<ImageDigestMirrorSet>,
    pub tag: Vec<ImageTagMirrorSet>,
}

/// Read access to the cluster's mirror-set resources.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn list_digest_mirror_sets(&self) -> Result<Vec<ImageDigestMirrorSet>, StoreError>;
    async fn list_tag_mirror_sets(&self) -> Result<Vec<ImageTagMirrorSet>, StoreError>;

    /// Both collections at once.
    ///
    /// Lists each kind in turn unless the store can read both in one go.
    async fn list_all(&self) -> Result<MirrorSets, SourceError> {
        let digest = self
            .list_digest_mirror_sets()
            .await
            .map_err(|source| SourceError::Unavailable {
                kind: RuleKind::Digest,
                source,
            })?;
        let tag = self
            .list_tag_mirror_sets()
            .await
            .map_err(|source| SourceError::Unavailable {
                kind: RuleKind::Tag,
                source,
            })?;
        Ok(MirrorSets { digest, tag })
    }
}

/// Reading the rule sources failed. No rules are returned in that case.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Listing {kind} mirror sets failed: {source}")]
    Unavailable {
        kind: RuleKind,
        #[source]
        source: StoreError,
    },

    /// A store that reads both kinds together failed.
    #[error("Reading mirror sets failed: {0}")]
    Snapshot(#[source] StoreError),
}

/// Typed read-only view over both mirror-set collections.
#[derive(Clone)]
pub struct MirrorRuleSource {
    store: Arc<dyn ClusterStore>,
}

impl MirrorRuleSource {
    pub fn new(store: Arc<dyn ClusterStore>) -> Self {
        Self { store }
    }

    /// Read both collections and convert them into one rule set.
    ///
    /// All-or-nothing: if either listing fails the caller gets an error and
    /// nothing else.
    pub async fn fetch_all(&self) -> Result<MirrorRuleSet, SourceError> {
        let MirrorSets {
            digest: digest_sets,
            tag: tag_sets,
        } = self.store.list_all().await?;

        let rules = rule_set_from_resources(&digest_sets, &tag_sets);
        tracing::debug!(
            digest_sets = digest_sets.len(),
            tag_sets = tag_sets.len(),
            digest_rules = rules.digest.len(),
            tag_rules = rules.tag.len(),
            "Mirror rule sources read"
        );
        Ok(rules)
    }
}

/// Convert listed resources into rules, dropping entries with no usable source.
pub fn rule_set_from_resources(digest_sets: &[ImageDigestMirrorSet], tag_sets: &[ImageTagMirrorSet]) -> MirrorRuleSet {
    let mut rules = MirrorRuleSet::default();
    for set in digest_sets {
        collect_rules(&mut rules, RuleKind::Digest, &set.metadata, &set.spec.image_digest_mirrors);
    }
    for set in tag_sets {
        collect_rules(&mut rules, RuleKind::Tag, &set.metadata, &set.spec.image_tag_mirrors);
    }
    rules
}

fn collect_rules(rules: &mut MirrorRuleSet, kind: RuleKind, metadata: &ObjectMeta, entries: &[ImageMirrors]) {
    let origin = RuleOrigin::new(metadata.name.clone(), metadata.created());

    for (position, entry) in entries.iter().enumerate() {
        let source = normalize_endpoint(&entry.source);
        if source.is_empty() {
            tracing::warn!(
                kind = %kind,
                resource = %metadata.name,
                position,
                "Skipping mirror entry with empty source"
            );
            continue;
        }

        let mirrors: Vec<String> = entry
            .mirrors
            .iter()
            .map(|m| normalize_endpoint(m))
            .filter(|m| !m.is_empty())
            .collect();

        let rule = MirrorRule::new(kind, origin.clone(), source, mirrors)
            .at_position(position)
            .never_contact_source(entry.mirror_source_policy == MirrorSourcePolicy::NeverContactSource);
        rules.push(rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FlakyStore {
        fail_tags: AtomicBool,
    }

    #[async_trait]
    impl ClusterStore for FlakyStore {
        async fn list_digest_mirror_sets(&self) -> Result<Vec<ImageDigestMirrorSet>, StoreError> {
            Ok(vec![ImageDigestMirrorSet::new(
                ObjectMeta::new("idms", chrono::DateTime::UNIX_EPOCH),
                vec![ImageMirrors::new("HTTPS://Registry.Example.com/foo/", ["https://m1.example.com/", " "])],
            )])
        }

        async fn list_tag_mirror_sets(&self) -> Result<Vec<ImageTagMirrorSet>, StoreError> {
            if self.fail_tags.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("apiserver timeout".into()));
            }
            Ok(vec![ImageTagMirrorSet::new(
                ObjectMeta::new("itms", chrono::DateTime::UNIX_EPOCH),
                vec![
                    ImageMirrors::new("", ["m9.example.com"]),
                    ImageMirrors::new("registry.example.com/foo", ["m2.example.com"]).never_contact_source(),
                ],
            )])
        }
    }

    #[tokio::test]
    async fn test_fetch_all_normalizes_and_partitions() {
        let source = MirrorRuleSource::new(Arc::new(FlakyStore {
            fail_tags: AtomicBool::new(false),
        }));
        let rules = source.fetch_all().await.unwrap();

        assert_eq!(rules.digest.len(), 1);
        assert_eq!(rules.digest[0].source, "registry.example.com/foo");
        assert_eq!(rules.digest[0].mirrors, vec!["m1.example.com"]);

        // Entry with an empty source is skipped; position is kept from the resource.
        assert_eq!(rules.tag.len(), 1);
        assert_eq!(rules.tag[0].position, 1);
        assert!(rules.tag[0].never_contact_source);
    }

    #[tokio::test]
    async fn test_fetch_all_is_all_or_nothing() {
        let source = MirrorRuleSource::new(Arc::new(FlakyStore {
            fail_tags: AtomicBool::new(true),
        }));
        let err = source.fetch_all().await.unwrap_err();
        match err {
            SourceError::Unavailable { kind, .. } => assert_eq!(kind, RuleKind::Tag),
            other => panic!("unexpected error {other:?}"),
        }
    }

    /// Serves only whole snapshots; per-kind listings are never expected.
    #[derive(Default)]
    struct SnapshotStore {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl ClusterStore for SnapshotStore {
        async fn list_digest_mirror_sets(&self) -> Result<Vec<ImageDigestMirrorSet>, StoreError> {
            Err(StoreError::Unavailable("per-kind listing used".into()))
        }

        async fn list_tag_mirror_sets(&self) -> Result<Vec<ImageTagMirrorSet>, StoreError> {
            Err(StoreError::Unavailable("per-kind listing used".into()))
        }

        async fn list_all(&self) -> Result<MirrorSets, SourceError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(MirrorSets {
                digest: vec![ImageDigestMirrorSet::new(
                    ObjectMeta::new("idms", chrono::DateTime::UNIX_EPOCH),
                    vec![ImageMirrors::new("registry.example.com", ["m1.example.com"])],
                )],
                tag: vec![ImageTagMirrorSet::new(
                    ObjectMeta::new("itms", chrono::DateTime::UNIX_EPOCH),
                    vec![ImageMirrors::new("quay.example.com", ["m2.example.com"])],
                )],
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_all_reads_one_snapshot() {
        let store = Arc::new(SnapshotStore::default());
        let source = MirrorRuleSource::new(store.clone());

        let rules = source.fetch_all().await.unwrap();

        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert_eq!(rules.digest.len(), 1);
        assert_eq!(rules.tag.len(), 1);
    }
}
