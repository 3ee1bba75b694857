//! ---
//! rg_section: "01-core-functionality"
//! rg_subsection: "integration-tests"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Configuration loading tests against files on disk."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::time::Duration;

use rollgate_common::config::AppConfig;

#[test]
fn first_existing_candidate_wins() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("rollgate.toml");
    fs::write(
        &present,
        "[kube]\ncontext = \"staging\"\n[health]\npoll_interval = 3\n",
    )
    .unwrap();

    let loaded = AppConfig::load_with_source(&[missing, present.clone()]).unwrap();
    assert_eq!(loaded.source.as_deref(), Some(present.as_path()));
    assert_eq!(loaded.config.kube.context, "staging");
    assert_eq!(loaded.config.health.poll_interval, Duration::from_secs(3));
}

#[test]
fn no_candidates_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = AppConfig::load_with_source(&[dir.path().join("nope.toml")]).unwrap();
    assert!(loaded.source.is_none());
    assert!(loaded.config.restart.dry_run);
}

#[test]
fn invalid_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[kube\ncontext = ").unwrap();
    let err = AppConfig::from_path(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.toml"));
}

#[test]
fn shipped_example_matches_defaults() {
    let example = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/rollgate.example.toml");
    let config = AppConfig::from_path(&example).unwrap();
    let defaults = AppConfig::default();
    assert_eq!(config.kube.context, defaults.kube.context);
    assert_eq!(config.health.poll_interval, defaults.health.poll_interval);
    assert_eq!(config.health.gate_timeout(), defaults.health.gate_timeout());
    assert_eq!(config.retry.max_delay, defaults.retry.max_delay);
    assert_eq!(config.restart.dry_run, defaults.restart.dry_run);
    assert_eq!(config.resolver.legacy_prefix, None);
    assert_eq!(config.orchestrator.run_deadline, None);
}
