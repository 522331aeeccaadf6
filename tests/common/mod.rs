//! Shared test utilities for integration and E2E tests.
//!
//! Provides a `TestFixture` that owns a temp directory holding a registry
//! file, a cache tree, and a deployment target, plus helpers for seeding
//! cache content and local git repositories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use tempfile::TempDir;

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::TestFixture;
}

/// A self-contained skillsync environment in a temp directory.
pub struct TestFixture {
    pub temp: TempDir,
    sources_yaml: Vec<String>,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        TestFixture {
            temp: TempDir::new().expect("create temp dir"),
            sources_yaml: Vec::new(),
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.temp.path().join("sources.yaml")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.temp.path().join("cache")
    }

    pub fn target(&self) -> PathBuf {
        self.temp.path().join("target")
    }

    /// Declare a source in the registry file.
    pub fn with_source(mut self, id: &str, url: &str, priority: i64) -> Self {
        self.sources_yaml.push(format!(
            "  - id: {}\n    url: \"{}\"\n    priority: {}\n",
            id, url, priority
        ));
        let body = format!(
            "disable_defaults: true\nsources:\n{}",
            self.sources_yaml.join("")
        );
        fs::write(self.registry_path(), body).expect("write registry");
        self
    }

    /// Seed a definition directory straight into a source's cache slot, as
    /// if a sync had already fetched it.
    pub fn seed_definition(&self, source_id: &str, rel_dir: &str, version: Option<&str>, body: &str) {
        let dir = self
            .cache_root()
            .join("sources")
            .join(source_id)
            .join(rel_dir);
        fs::create_dir_all(&dir).expect("create definition dir");
        let front = version
            .map(|v| format!("---\nversion: {}\n---\n", v))
            .unwrap_or_default();
        fs::write(dir.join("DEFINITION.md"), format!("{}{}", front, body))
            .expect("write definition");
    }

    /// Create a local git repository with the given files committed on
    /// `main`, returning its path for use as a source URL.
    pub fn git_repo(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let repo = self.temp.path().join(name);
        fs::create_dir_all(&repo).expect("create repo dir");
        for (path, content) in files {
            let file = repo.join(path);
            fs::create_dir_all(file.parent().unwrap()).expect("create repo subdir");
            fs::write(file, content).expect("write repo file");
        }
        git(&repo, &["init", "-q", "-b", "main"]);
        git(&repo, &["config", "user.email", "test@example.com"]);
        git(&repo, &["config", "user.name", "Test"]);
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "-q", "-m", "seed"]);
        repo
    }

    /// A `skillsync` command wired to this fixture's registry and cache.
    pub fn cmd(&self) -> Command {
        let mut cmd: Command = cargo_bin_cmd!("skillsync");
        cmd.env("SKILLSYNC_REGISTRY", self.registry_path())
            .env("SKILLSYNC_CACHE", self.cache_root());
        cmd
    }
}

#[allow(dead_code)]
fn git(dir: &Path, args: &[&str]) {
    let status = ProcessCommand::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("run git");
    assert!(status.success(), "git {:?} failed", args);
}
