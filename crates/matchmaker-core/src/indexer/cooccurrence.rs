//! Sparse symmetric co-occurrence matrices.
//!
//! `weight(i, j)` counts the lists that contain both `i` and `j`. Built from
//! users' watch lists it is the repo-repo matrix; from repositories' watcher
//! lists it is the user-user matrix. Counting is quadratic in list length, so
//! lists longer than the configured cap are skipped.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoMatrix {
    /// Row per id, neighbors ordered by weight descending then id ascending.
    rows: BTreeMap<u32, Vec<(u32, u32)>>,
    pairs: usize,
}

impl CoMatrix {
    /// Count every unordered pair in each list once. Lists must hold unique ids.
    pub fn from_lists<'a, I>(lists: I, cap: usize) -> Self
    where
        I: IntoParallelIterator<Item = &'a Vec<u32>>,
    {
        let counts: HashMap<(u32, u32), u32> = lists
            .into_par_iter()
            .filter(|list| list.len() >= 2 && list.len() <= cap)
            .fold(HashMap::new, |mut acc, list| {
                let mut sorted = list.clone();
                sorted.sort_unstable();
                for (i, &a) in sorted.iter().enumerate() {
                    for &b in &sorted[i + 1..] {
                        *acc.entry((a, b)).or_insert(0) += 1;
                    }
                }
                acc
            })
            .reduce(HashMap::new, |mut left, right| {
                for (pair, count) in right {
                    *left.entry(pair).or_insert(0) += count;
                }
                left
            });

        let pairs = counts.len();
        let mut rows: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
        for ((a, b), count) in counts {
            rows.entry(a).or_default().push((b, count));
            rows.entry(b).or_default().push((a, count));
        }
        for row in rows.values_mut() {
            row.sort_unstable_by(|x, y| y.1.cmp(&x.1).then(x.0.cmp(&y.0)));
        }
        Self { rows, pairs }
    }

    /// Up to `limit` neighbors of `id`, heaviest first.
    pub fn top_neighbors(&self, id: u32, limit: usize) -> &[(u32, u32)] {
        match self.rows.get(&id) {
            Some(row) => &row[..row.len().min(limit)],
            None => &[],
        }
    }

    pub fn weight(&self, a: u32, b: u32) -> u32 {
        self.rows
            .get(&a)
            .and_then(|row| row.iter().find(|&&(id, _)| id == b))
            .map_or(0, |&(_, w)| w)
    }

    /// Number of distinct unordered pairs with a non-zero weight.
    pub fn pair_count(&self) -> usize {
        self.pairs
    }

    /// Every pair once, as `(low, high, weight)` in ascending order.
    pub fn pairs(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        self.rows.iter().flat_map(|(&a, row)| {
            row.iter()
                .filter(move |&&(b, _)| a < b)
                .map(move |&(b, w)| (a, b, w))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }
}
