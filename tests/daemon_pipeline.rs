//! The shipped collaborators wired the way the daemon wires them.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mirror_reconciler::config::{parse_config, WatchEvent};
use mirror_reconciler::distribute::ApplyState;
use mirror_reconciler::lifecycle::startup;
use mirror_reconciler::reconcile::Reconcile;
use mirror_reconciler::{Controller, Shutdown};

const MANIFESTS: &str = r#"
apiVersion: config.openshift.io/v1
kind: ImageDigestMirrorSet
metadata:
  name: release-digests
  creationTimestamp: "2024-01-01T00:00:00Z"
spec:
  imageDigestMirrors:
    - source: quay.io/openshift-release-dev
      mirrors: ["mirror.corp.example/release"]
---
apiVersion: config.openshift.io/v1
kind: ImageTagMirrorSet
metadata:
  name: release-tags
  creationTimestamp: "2024-01-02T00:00:00Z"
spec:
  imageTagMirrors:
    - source: quay.io/openshift-release-dev
      mirrors: ["backup.corp.example"]
      mirrorSourcePolicy: NeverContactSource
"#;

fn daemon_config(root: &std::path::Path) -> String {
    format!(
        r#"
[sources]
manifests_dir = "{manifests}"

[[fleet.nodes]]
name = "win-a"

[[fleet.nodes]]
name = "win-b"

[distribution]
output_root = "{output}"

[state]
records_path = "{records}"
"#,
        manifests = root.join("manifests").display(),
        output = root.join("nodes").display(),
        records = root.join("records.json").display(),
    )
}

#[tokio::test]
async fn test_manifests_are_written_to_every_node() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("manifests")).unwrap();
    std::fs::write(dir.path().join("manifests/mirrors.yaml"), MANIFESTS).unwrap();
    let config = parse_config(&daemon_config(dir.path())).unwrap();

    let mut components = startup::build(&config).unwrap();
    let outcome = components
        .reconciler
        .reconcile_once(&CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.requeue);
    assert_eq!(outcome.report.applied, 2);

    for node in ["win-a", "win-b"] {
        let live = dir.path().join("nodes").join(node).join("registry");
        let hosts = std::fs::read_to_string(live.join("certs.d/quay.io/hosts.toml")).unwrap();
        let table: toml::Table = hosts.parse().unwrap();
        assert!(table.get("server").is_none(), "source must not be contacted:\n{hosts}");

        let host = table["host"].as_table().unwrap();
        let release = host["https://mirror.corp.example/release"].as_table().unwrap();
        assert_eq!(release["override_path"].as_bool(), Some(true));
        let backup = host["https://backup.corp.example"].as_table().unwrap();
        assert_eq!(backup["capabilities"].as_array().unwrap().len(), 2);

        let written_hash = std::fs::read_to_string(live.join(".hash")).unwrap();
        assert_eq!(written_hash, outcome.report.hash.as_str());
    }

    let records = components.reconciler.distributor().records();
    assert_eq!(records.count_in(ApplyState::Applied), 2);
    assert!(dir.path().join("records.json").exists());
}

#[tokio::test]
async fn test_missing_manifest_dir_is_transient() {
    let dir = tempfile::tempdir().unwrap();
    let config = parse_config(&daemon_config(dir.path())).unwrap();

    let mut components = startup::build(&config).unwrap();
    let err = components
        .reconciler
        .reconcile_once(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.requeue());
    assert!(!dir.path().join("nodes").exists());
}

#[tokio::test]
async fn test_controller_picks_up_new_manifests() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("manifests")).unwrap();
    let config = parse_config(&daemon_config(dir.path())).unwrap();
    let components = startup::build(&config).unwrap();

    let shutdown = Shutdown::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = Controller::new(components.reconciler, &config.controller).with_fleet(components.fleet);
    let handle = tokio::spawn(controller.run(rx, shutdown.token()));

    let written = |node: &str| {
        dir.path()
            .join("nodes")
            .join(node)
            .join("registry/certs.d/quay.io/hosts.toml")
            .exists()
    };
    std::fs::write(dir.path().join("manifests/mirrors.yaml"), MANIFESTS).unwrap();
    tx.send(WatchEvent::SourcesChanged).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !(written("win-a") && written("win-b")) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("hosts.toml was never written");

    shutdown.trigger();
    let reconciler = handle.await.unwrap();
    assert!(reconciler.generation() >= 1);
}
