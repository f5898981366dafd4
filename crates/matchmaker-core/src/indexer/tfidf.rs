//! tf-idf weighting over the watch bi-index.
//!
//! For a repository `r` and one of its watchers `u`:
//! `tf = 1 / |watched(u)|`, `idf = ln(users / (1 + |watchers(r)|))`.
//! `idf_avg(r)` is the mean of `tf * idf` over the watchers of `r`; a high
//! value means the repository is watched by focused users.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{RepoId, UserId};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TfIdf {
    pub idf: BTreeMap<RepoId, f64>,
    /// Aligned with the ascending watcher list of each repository.
    pub edge_weights: BTreeMap<RepoId, Vec<f64>>,
    pub idf_avg: BTreeMap<RepoId, f64>,
}

pub fn compute_tfidf(
    watchers_of_repo: &BTreeMap<RepoId, Vec<UserId>>,
    repos_of_user: &BTreeMap<UserId, Vec<RepoId>>,
) -> TfIdf {
    let total_users = repos_of_user.len() as f64;
    let mut out = TfIdf::default();
    if total_users == 0.0 {
        return out;
    }

    for (&repo, watchers) in watchers_of_repo {
        let idf = (total_users / (1.0 + watchers.len() as f64)).ln();
        // Watcher lists are sorted, so the summation order is fixed.
        let weights: Vec<f64> = watchers
            .iter()
            .map(|user| {
                let watched = repos_of_user.get(user).map_or(0, Vec::len).max(1);
                idf / watched as f64
            })
            .collect();
        let avg = if weights.is_empty() {
            0.0
        } else {
            weights.iter().sum::<f64>() / weights.len() as f64
        };
        out.idf.insert(repo, idf);
        out.idf_avg.insert(repo, avg);
        out.edge_weights.insert(repo, weights);
    }
    out
}
