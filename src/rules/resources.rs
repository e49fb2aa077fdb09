//! Cluster resource shapes for the two mirror-set kinds.
//!
//! Field names follow the cluster API (`imageDigestMirrors`, `mirrorSourcePolicy`)
//! so manifests can be read verbatim. Unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DIGEST_MIRROR_SET_KIND: &str = "ImageDigestMirrorSet";
pub const TAG_MIRROR_SET_KIND: &str = "ImageTagMirrorSet";

/// Subset of object metadata the reconciler reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Changes on every write; never used for diffing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            creation_timestamp: Some(created),
            resource_version: None,
        }
    }

    /// Creation time, or the epoch for objects that never had one (local manifests).
    pub fn created(&self) -> DateTime<Utc> {
        self.creation_timestamp.unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Whether pulls may fall back to the source registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorSourcePolicy {
    #[default]
    AllowContactingSource,
    NeverContactSource,
}

/// One source registry and its ordered mirrors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMirrors {
    pub source: String,

    #[serde(default)]
    pub mirrors: Vec<String>,

    #[serde(default)]
    pub mirror_source_policy: MirrorSourcePolicy,
}

impl ImageMirrors {
    pub fn new<I, S>(source: impl Into<String>, mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: source.into(),
            mirrors: mirrors.into_iter().map(Into::into).collect(),
            mirror_source_policy: MirrorSourcePolicy::AllowContactingSource,
        }
    }

    pub fn never_contact_source(mut self) -> Self {
        self.mirror_source_policy = MirrorSourcePolicy::NeverContactSource;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDigestMirrorSetSpec {
    #[serde(default)]
    pub image_digest_mirrors: Vec<ImageMirrors>,
}

/// Digest-pinned mirror rules (`config.openshift.io/v1`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDigestMirrorSet {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ImageDigestMirrorSetSpec,
}

impl ImageDigestMirrorSet {
    pub fn new(metadata: ObjectMeta, mirrors: Vec<ImageMirrors>) -> Self {
        Self {
            metadata,
            spec: ImageDigestMirrorSetSpec {
                image_digest_mirrors: mirrors,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTagMirrorSetSpec {
    #[serde(default)]
    pub image_tag_mirrors: Vec<ImageMirrors>,
}

/// Tag-based mirror rules (`config.openshift.io/v1`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTagMirrorSet {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ImageTagMirrorSetSpec,
}

impl ImageTagMirrorSet {
    pub fn new(metadata: ObjectMeta, mirrors: Vec<ImageMirrors>) -> Self {
        Self {
            metadata,
            spec: ImageTagMirrorSetSpec {
                image_tag_mirrors: mirrors,
            },
        }
    }
}
