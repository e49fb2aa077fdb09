//! Mirror rule sources.
//!
//! # Data Flow
//! ```text
//! ClusterStore (manifests.rs or any cluster client)
//!     → list ImageDigestMirrorSet + ImageTagMirrorSet (resources.rs)
//!     → source.rs converts both lists into one MirrorRuleSet (types.rs)
//!     → handed to the merge subsystem
//! ```
//!
//! # Design Decisions
//! - Both lists are read in the same call; a failure on either returns nothing
//! - Rules are immutable values, rebuilt from scratch every pass
//! - Each rule remembers the resource it came from for conflict reporting

pub mod manifests;
pub mod resources;
pub mod source;
pub mod types;

pub use manifests::ManifestStore;
pub use resources::{ImageDigestMirrorSet, ImageMirrors, ImageTagMirrorSet, MirrorSourcePolicy, ObjectMeta};
pub use source::{ClusterStore, MirrorRuleSource, MirrorSets, SourceError};
pub use types::{MirrorRule, MirrorRuleSet, RuleKind, RuleOrigin};
