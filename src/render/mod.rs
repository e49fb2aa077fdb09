//! On-node artifact rendering.
//!
//! A pure transform of [`CanonicalRegistryConfig`] into containerd registry
//! host files, one `hosts.toml` per source registry host:
//!
//! ```text
//! <config_dir>/<source host>/hosts.toml
//!
//! server = "https://registry.example.com"      (omitted for NeverContactSource)
//!
//! [host."https://m1.example.com"]
//! capabilities = ["pull"]                      (digest mirrors)
//!
//! [host."https://m2.example.com"]
//! capabilities = ["pull", "resolve"]           (tag mirrors)
//! ```
//!
//! Host sections appear in merge order, which containerd treats as priority.
//! Sources that share a host (`r.io/a`, `r.io/b`) share one file; their
//! mirrors are concatenated in reference order and de-duplicated.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use toml::Value;

use crate::merge::normalize::{host_of, path_of};
use crate::merge::{CanonicalRegistryConfig, ConfigHash, MirrorEndpoint};

pub const HOSTS_FILE_NAME: &str = "hosts.toml";

/// Rendered files for one configuration, identical for every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeArtifact {
    pub hash: ConfigHash,
    pub generation: u64,
    /// Path relative to the node's configuration root → file content.
    pub files: BTreeMap<PathBuf, String>,
}

#[derive(Default)]
struct HostFile {
    never_contact_source: bool,
    mirrors: Vec<MirrorEndpoint>,
}

/// Render a configuration into containerd host files under `config_dir`.
pub fn render(config: &CanonicalRegistryConfig, config_dir: &str) -> NodeArtifact {
    let mut hosts: BTreeMap<&str, HostFile> = BTreeMap::new();
    for (reference, entry) in &config.registries {
        let file = hosts.entry(host_of(reference)).or_default();
        file.never_contact_source |= entry.never_contact_source;
        for mirror in &entry.mirrors {
            match file.mirrors.iter_mut().find(|m| m.location == mirror.location) {
                Some(existing) => {
                    existing.pull_by_digest |= mirror.pull_by_digest;
                    existing.pull_by_tag |= mirror.pull_by_tag;
                }
                None => file.mirrors.push(mirror.clone()),
            }
        }
    }

    let files = hosts
        .into_iter()
        .map(|(host, file)| {
            let path = PathBuf::from(config_dir).join(host).join(HOSTS_FILE_NAME);
            (path, render_hosts_file(host, &file))
        })
        .collect();

    NodeArtifact {
        hash: config.hash.clone(),
        generation: config.generation,
        files,
    }
}

fn render_hosts_file(host: &str, file: &HostFile) -> String {
    let mut out = String::new();
    if !file.never_contact_source {
        out.push_str(&format!("server = {}\n", quoted(&format!("https://{host}"))));
    }

    for mirror in &file.mirrors {
        let mut capabilities = vec![Value::from("pull")];
        if mirror.pull_by_tag {
            capabilities.push(Value::from("resolve"));
        }

        out.push('\n');
        out.push_str(&format!("[host.{}]\n", quoted(&format!("https://{}", mirror.location))));
        out.push_str(&format!("capabilities = {}\n", Value::Array(capabilities)));
        if path_of(&mirror.location).is_some() {
            out.push_str("override_path = true\n");
        }
    }
    out
}

/// TOML basic string with escaping.
fn quoted(s: &str) -> String {
    Value::from(s).to_string()
}
