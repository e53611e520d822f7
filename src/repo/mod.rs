//! Git-tracked settings repository.
//!
//! - **git**: `GitRepo`, pass-through wrapper over the `git` command
//! - **store**: `SettingsStore`, studio/project JSON files inside the repository

mod git;
mod store;

pub use git::{BranchHistory, CommitInfo, GitError, GitRepo, git_available};
pub use store::{
    ADDON_LIST_FILE, REPO_ROOT_ENV, STUDIO_FILE, SettingsStore, StoreError, StudioConfig,
};
