//! Popularity ranking and the user-id locality heuristic used for fallbacks.

use std::collections::BTreeMap;

use crate::models::{RepoId, UserId, NO_REPO};

/// Repositories by watcher count descending (id ascending on ties), first `k`.
pub fn build_popularity(watchers_of_repo: &BTreeMap<RepoId, Vec<UserId>>, k: usize) -> Vec<RepoId> {
    let mut ranked: Vec<(usize, RepoId)> = watchers_of_repo
        .iter()
        .map(|(&repo, watchers)| (watchers.len(), repo))
        .collect();
    ranked.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked.into_iter().take(k).map(|(_, repo)| repo).collect()
}

/// Repositories ranked by how many of their watchers have an id within
/// `radius` of `user`. Repositories with no such watcher, and the sentinel
/// id, are left out.
///
/// Ties fall back to total watcher count, then id ascending.
pub fn locality_ranking(
    watchers_of_repo: &BTreeMap<RepoId, Vec<UserId>>,
    user: UserId,
    radius: u32,
    limit: usize,
) -> Vec<RepoId> {
    let low = user.saturating_sub(radius.saturating_sub(1));
    let high = user.saturating_add(radius.saturating_sub(1));
    let mut ranked: Vec<(usize, usize, RepoId)> = watchers_of_repo
        .iter()
        .filter(|&(&repo, _)| repo != NO_REPO)
        .filter_map(|(&repo, watchers)| {
            // Watcher lists are sorted ascending.
            let start = watchers.partition_point(|&w| w < low);
            let end = watchers.partition_point(|&w| w <= high);
            let near = end - start;
            (near > 0).then_some((near, watchers.len(), repo))
        })
        .collect();
    ranked.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(limit).map(|(_, _, repo)| repo).collect()
}
