//! Collaborative-signal collaborators: "top-N neighbors of X by shared weight".

use crate::errors::MatchResult;
use crate::indexer::pipeline::IndexSet;
use crate::models::{RepoId, UserId};

/// A source of nearest neighbors by co-occurrence weight, heaviest first.
///
/// Implementations may do blocking I/O; the engine treats an error as an
/// empty neighbor list and keeps scoring.
pub trait NeighborSource: Sync {
    fn user_neighbors(&self, user: UserId, limit: usize) -> MatchResult<Vec<(UserId, u32)>>;
    fn repo_neighbors(&self, repo: RepoId, limit: usize) -> MatchResult<Vec<(RepoId, u32)>>;
}

/// Serves neighbors from the matrices held by the index set.
pub struct IndexNeighbors<'a> {
    index: &'a IndexSet,
}

impl<'a> IndexNeighbors<'a> {
    pub fn new(index: &'a IndexSet) -> Self {
        Self { index }
    }
}

impl NeighborSource for IndexNeighbors<'_> {
    fn user_neighbors(&self, user: UserId, limit: usize) -> MatchResult<Vec<(UserId, u32)>> {
        Ok(self.index.user_matrix().top_neighbors(user, limit).to_vec())
    }

    fn repo_neighbors(&self, repo: RepoId, limit: usize) -> MatchResult<Vec<(RepoId, u32)>> {
        Ok(self.index.repo_matrix().top_neighbors(repo, limit).to_vec())
    }
}

/// Disables the collaborative signal.
pub struct NoNeighbors;

impl NeighborSource for NoNeighbors {
    fn user_neighbors(&self, _user: UserId, _limit: usize) -> MatchResult<Vec<(UserId, u32)>> {
        Ok(Vec::new())
    }

    fn repo_neighbors(&self, _repo: RepoId, _limit: usize) -> MatchResult<Vec<(RepoId, u32)>> {
        Ok(Vec::new())
    }
}
