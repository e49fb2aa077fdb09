//! The canonical, node-applicable registry configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 over the semantic content of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigHash(String);

impl ConfigHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigHash {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A mirror endpoint and the pull modes it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorEndpoint {
    pub location: String,
    /// Contributed by a digest-pinned rule.
    pub pull_by_digest: bool,
    /// Contributed by a tag-based rule.
    pub pull_by_tag: bool,
}

/// Merged mirrors for one source registry reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub mirrors: Vec<MirrorEndpoint>,
    /// Set when any contributing rule forbids falling back to the source.
    pub never_contact_source: bool,
}

impl RegistryEntry {
    pub fn locations(&self) -> Vec<&str> {
        self.mirrors.iter().map(|m| m.location.as_str()).collect()
    }
}

/// The single merged artifact applied to every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRegistryConfig {
    /// Source reference → merged entry, sorted by reference.
    pub registries: BTreeMap<String, RegistryEntry>,
    pub hash: ConfigHash,
    /// Incremented by the reconciler on semantic change; excluded from `hash`.
    pub generation: u64,
}

impl CanonicalRegistryConfig {
    pub fn new(registries: BTreeMap<String, RegistryEntry>) -> Self {
        let hash = content_hash(&registries);
        Self {
            registries,
            hash,
            generation: 0,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Recompute the content hash and compare with the stored one.
    pub fn verify_hash(&self) -> bool {
        content_hash(&self.registries) == self.hash
    }

    /// Ordered mirror locations for a source reference.
    pub fn mirrors_for(&self, reference: &str) -> Option<Vec<&str>> {
        self.registries.get(reference).map(RegistryEntry::locations)
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

/// Hash the mapping with length-prefixed fields so no two distinct mappings
/// share a byte stream.
fn content_hash(registries: &BTreeMap<String, RegistryEntry>) -> ConfigHash {
    fn put(hasher: &mut Sha256, bytes: &[u8]) {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }

    let mut hasher = Sha256::new();
    hasher.update((registries.len() as u64).to_le_bytes());
    for (reference, entry) in registries {
        put(&mut hasher, reference.as_bytes());
        hasher.update([entry.never_contact_source as u8]);
        hasher.update((entry.mirrors.len() as u64).to_le_bytes());
        for mirror in &entry.mirrors {
            put(&mut hasher, mirror.location.as_bytes());
            hasher.update([mirror.pull_by_digest as u8, mirror.pull_by_tag as u8]);
        }
    }
    ConfigHash(hex::encode(hasher.finalize()))
}
