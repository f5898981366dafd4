//! Shared typed models used across indexing, storage, and query layers.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

pub type UserId = u32;
pub type RepoId = u32;

/// Sentinel repository id meaning "no repository" (e.g. an absent parent).
pub const NO_REPO: RepoId = 0;

/// Number of recommendations produced per user.
pub const RECOMMENDATIONS_PER_USER: usize = 10;

// ---------------------------------------------------------------------------
// Parsed records
// ---------------------------------------------------------------------------

/// One `user:repo` line of the watch stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchRecord {
    pub user: UserId,
    pub repo: RepoId,
}

/// One line of the lineage stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoRecord {
    pub id: RepoId,
    pub author: String,
    pub name: String,
    /// Ordinal day number (0001-01-01 is day 1), when the third field is a date.
    pub created: Option<i64>,
    /// `NO_REPO` when the repository is not a fork.
    pub parent: RepoId,
}

/// One line of the language stream, with language names already lower-cased.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LangRecord {
    pub repo: RepoId,
    pub languages: Vec<(String, u64)>,
}

// ---------------------------------------------------------------------------
// Derived repository metadata
// ---------------------------------------------------------------------------

/// Author, project name and creation day of a repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub author: String,
    pub name: String,
    pub created: Option<i64>,
}

impl From<&RepoRecord> for RepoInfo {
    fn from(record: &RepoRecord) -> Self {
        Self {
            author: record.author.clone(),
            name: record.name.clone(),
            created: record.created,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Cardinalities of a built index set, reported by `stats`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub users: usize,
    pub repos_watched: usize,
    pub repos_described: usize,
    pub watch_edges: usize,
    pub forked_repos: usize,
    pub grandchildren: usize,
    pub authors: usize,
    pub project_names: usize,
    pub name_prefixes: usize,
    pub languages: usize,
    pub test_users: usize,
    pub repo_matrix_entries: usize,
    pub user_matrix_entries: usize,
    pub top_repos: usize,
}
