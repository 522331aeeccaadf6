//! # Git Transport
//!
//! The [`GitTransport`] trait is the seam between the sync engine and the
//! actual git binary, so tests can substitute a mock that simulates network
//! failures, timeouts, and unchanged remotes without touching the network.
//!
//! [`SystemGit`] is the production implementation. It shells out to the
//! system `git` command, which automatically handles:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig
//!
//! Every subprocess runs under an independent timeout; a timed-out command
//! surfaces as [`Error::GitTimeout`], which the sync engine treats exactly
//! like a network failure.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::error::{Error, Result};

/// Remote operations required by the sync engine.
pub trait GitTransport: Send + Sync {
    /// The current commit hash at the tip of `branch` on the remote.
    ///
    /// This is the conditional-fetch token: when it matches the stored
    /// token for a source, the remote is unchanged and no clone happens.
    fn remote_head(&self, url: &str, branch: &str) -> Result<String>;

    /// Shallow-clone `branch` of `url` into `target_dir`.
    fn clone_shallow(&self, url: &str, branch: &str, target_dir: &Path) -> Result<()>;
}

/// Production transport shelling out to the system `git`.
pub struct SystemGit {
    timeout: Duration,
}

impl SystemGit {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a git subprocess under the configured timeout, capturing output.
    ///
    /// Both pipes are drained on background threads while the parent waits,
    /// so a subprocess emitting more than a pipe buffer's worth of output
    /// cannot stall against a full pipe and get misreported as a timeout.
    fn run_git(&self, args: &[&str], url: &str) -> Result<(Vec<u8>, Vec<u8>, bool)> {
        let mut child = Command::new("git")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::GitCommand {
                command: args.join(" "),
                url: url.to_string(),
                stderr: e.to_string(),
            })?;

        let stdout_reader = child.stdout.take().map(drain_pipe);
        let stderr_reader = child.stderr.take().map(drain_pipe);

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::GitTimeout {
                    url: url.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let stdout = stdout_reader
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();
        let stderr = stderr_reader
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();

        Ok((stdout, stderr, status.success()))
    }
}

/// Read a child pipe to EOF on a background thread.
fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new(Duration::from_secs(
            crate::defaults::DEFAULT_GIT_TIMEOUT_SECS,
        ))
    }
}

impl GitTransport for SystemGit {
    fn remote_head(&self, url: &str, branch: &str) -> Result<String> {
        let refspec = format!("refs/heads/{}", branch);
        let (stdout, stderr, success) = self.run_git(&["ls-remote", url, &refspec], url)?;

        if !success {
            return Err(Error::GitCommand {
                command: "ls-remote".to_string(),
                url: url.to_string(),
                stderr: String::from_utf8_lossy(&stderr).to_string(),
            });
        }

        // ls-remote output format: <hash>\t<ref>
        let stdout = String::from_utf8_lossy(&stdout);
        stdout
            .lines()
            .filter_map(|line| line.split('\t').next())
            .find(|hash| !hash.is_empty())
            .map(|hash| hash.to_string())
            .ok_or_else(|| Error::BranchNotFound {
                url: url.to_string(),
                branch: branch.to_string(),
            })
    }

    fn clone_shallow(&self, url: &str, branch: &str, target_dir: &Path) -> Result<()> {
        // git won't clone into an existing non-empty directory
        if target_dir.exists() {
            fs::remove_dir_all(target_dir)?;
        }
        if let Some(parent) = target_dir.parent() {
            fs::create_dir_all(parent)?;
        }

        let target = target_dir.to_string_lossy();
        let (_stdout, stderr, success) = self.run_git(
            &[
                "clone", "--quiet", "--depth=1", "--branch", branch, url, &target,
            ],
            url,
        )?;

        if !success {
            let stderr = String::from_utf8_lossy(&stderr);

            // Provide helpful error message for common auth failures
            let message = if stderr.contains("Authentication failed")
                || stderr.contains("Permission denied")
                || stderr.contains("Could not read from remote repository")
            {
                format!(
                    "Authentication failed. Make sure you have access to the repository.\n\
                    For private repos, ensure you have:\n\
                    - SSH key added to ssh-agent\n\
                    - Git credentials configured\n\
                    - Personal access token set up\n\
                    Error: {}",
                    stderr
                )
            } else {
                stderr.to_string()
            };

            return Err(Error::GitClone {
                url: url.to_string(),
                branch: branch.to_string(),
                message,
            });
        }

        Ok(())
    }
}
