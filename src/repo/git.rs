//! Thin wrapper over the `git` command line.
//!
//! Each method runs one git command in the repository root. Failures are
//! returned as `GitError` carrying git's stderr; nothing is retried.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Git command errors.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git executable could not be started.
    #[error("Failed to run git: {0}")]
    Spawn(#[from] io::Error),

    /// Git exited with a non-zero status.
    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },
}

/// A commit on a branch, with its tag if one points at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub tag: Option<String>,
}

/// Branch listing entry for `iterate_branches`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHistory {
    pub branch: String,
    pub commits: Vec<CommitInfo>,
}

/// Repository handle.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Creates a handle for the repository at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        assert!(!root.as_os_str().is_empty(), "Repository root must not be empty");
        Self { root }
    }

    /// Returns the repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if the root holds a git repository.
    #[must_use]
    pub fn is_repository(&self) -> bool {
        self.root.join(".git").exists()
    }

    /// Initializes a new repository.
    ///
    /// Does nothing if the root directory already exists.
    pub fn init(&self) -> Result<bool, GitError> {
        if self.root.exists() {
            debug!("[GIT] {} exists, skipping init", self.root.display());
            return Ok(false);
        }
        fs::create_dir_all(&self.root)?;
        self.run(&["init"])?;
        info!("[GIT] New repository initialized at {}", self.root.display());
        Ok(true)
    }

    /// Creates a branch at the current HEAD.
    pub fn create_branch(&self, branch_name: &str) -> Result<(), GitError> {
        assert!(!branch_name.is_empty(), "Branch name must not be empty");
        self.run(&["branch", branch_name])?;
        info!("[GIT] Created branch {}", branch_name);
        Ok(())
    }

    /// Checks out a branch.
    pub fn switch_branch(&self, branch_name: &str) -> Result<(), GitError> {
        assert!(!branch_name.is_empty(), "Branch name must not be empty");
        self.run(&["checkout", branch_name])?;
        info!("[GIT] Switched to branch {}", branch_name);
        Ok(())
    }

    /// Stages everything and commits it.
    pub fn create_commit(&self, message: &str) -> Result<(), GitError> {
        assert!(!message.is_empty(), "Commit message must not be empty");
        self.run(&["add", "."])?;
        self.run(&["commit", "-m", message])?;
        info!("[GIT] Created commit: {}", message);
        Ok(())
    }

    /// Returns true if the working tree has uncommitted changes.
    pub fn has_changes(&self) -> Result<bool, GitError> {
        let status = self.run(&["status", "--porcelain"])?;
        Ok(!status.trim().is_empty())
    }

    /// Adds an annotated tag on a commit.
    pub fn add_tag(&self, tag_name: &str, commit_hash: &str) -> Result<(), GitError> {
        assert!(!tag_name.is_empty(), "Tag name must not be empty");
        let message = format!("Tag for commit {}", commit_hash);
        self.run(&["tag", "-a", tag_name, commit_hash, "-m", &message])?;
        info!("[GIT] Added tag {} on commit {}", tag_name, commit_hash);
        Ok(())
    }

    /// Merges a branch into the current one.
    pub fn merge_branch(&self, branch_name: &str) -> Result<(), GitError> {
        self.run(&["merge", branch_name])?;
        info!("[GIT] Merged {} into current branch", branch_name);
        Ok(())
    }

    /// Pushes the current branch.
    pub fn push(&self) -> Result<(), GitError> {
        self.run(&["push"])?;
        info!("[GIT] Changes pushed");
        Ok(())
    }

    /// Returns the diff between two revisions or paths.
    pub fn show_diff(&self, first: &str, second: &str) -> Result<String, GitError> {
        self.run(&["diff", first, second])
    }

    /// Returns the current HEAD commit hash.
    pub fn head(&self) -> Result<String, GitError> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Lists local branch names.
    pub fn branches(&self) -> Result<Vec<String>, GitError> {
        let out = self.run(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])?;
        Ok(out.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
    }

    /// Lists commits reachable from a branch, newest first, with tags.
    pub fn commits(&self, branch_name: &str) -> Result<Vec<CommitInfo>, GitError> {
        let out = self.run(&["log", "--format=%H%x09%D", branch_name])?;
        Ok(out.lines().filter_map(parse_log_line).collect())
    }

    /// Collects every branch with its commits and tags.
    pub fn iterate_branches(&self) -> Result<Vec<BranchHistory>, GitError> {
        self.branches()?
            .into_iter()
            .map(|branch| {
                let commits = self.commits(&branch)?;
                Ok(BranchHistory { branch, commits })
            })
            .collect()
    }

    /// Runs git with the given arguments and returns stdout.
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        debug!("[GIT] git {}", args.join(" "));
        let output: Output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("[GIT] git {} failed: {}", args.join(" "), stderr);
            return Err(GitError::Command {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parses one `%H<TAB>%D` log line.
fn parse_log_line(line: &str) -> Option<CommitInfo> {
    let (hash, refs) = line.split_once('\t').unwrap_or((line, ""));
    let hash = hash.trim();
    if hash.is_empty() {
        return None;
    }
    let tag = refs
        .split(',')
        .map(str::trim)
        .find_map(|r| r.strip_prefix("tag: "))
        .map(String::from);
    Some(CommitInfo {
        hash: hash.to_string(),
        tag,
    })
}

/// Returns true if a git executable is on the PATH.
#[must_use]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
