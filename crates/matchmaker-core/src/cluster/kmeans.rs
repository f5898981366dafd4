//! K-Means clustering (Lloyd's algorithm) over points carrying a reference.
//!
//! Initial centroids are `k` distinct points sampled with the caller's RNG.
//! Each round assigns every point to its nearest centroid (first cluster wins
//! ties) and moves each centroid to the mean of its points. Iteration stops
//! once the largest centroid shift drops below the cutoff, or when no point
//! changed cluster.

use rand::Rng;

use crate::errors::{MatchError, MatchResult};
use crate::indexer::language::language_vector;
use crate::indexer::pipeline::IndexSet;
use crate::models::RepoId;

#[derive(Clone, Debug, PartialEq)]
pub struct Point<R> {
    pub coords: Vec<f64>,
    pub reference: R,
}

impl<R> Point<R> {
    pub fn new(coords: Vec<f64>, reference: R) -> Self {
        Self { coords, reference }
    }

    pub fn dim(&self) -> usize {
        self.coords.len()
    }
}

/// A non-empty group of points and their component-wise mean.
#[derive(Clone, Debug)]
pub struct Cluster<R> {
    points: Vec<Point<R>>,
    centroid: Vec<f64>,
}

impl<R> Cluster<R> {
    pub fn new(points: Vec<Point<R>>) -> MatchResult<Self> {
        let centroid = centroid_of(points.iter().map(|p| p.coords.as_slice()))?;
        Ok(Self { points, centroid })
    }

    pub fn points(&self) -> &[Point<R>] {
        &self.points
    }

    pub fn centroid(&self) -> &[f64] {
        &self.centroid
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KMeansOptions {
    pub k: usize,
    pub cutoff: f64,
    pub max_iterations: usize,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            k: 3,
            cutoff: 0.5,
            max_iterations: 300,
        }
    }
}

#[derive(Debug)]
pub struct KMeansResult<R> {
    pub clusters: Vec<Cluster<R>>,
    pub iterations: usize,
}

pub fn euclidean(a: &[f64], b: &[f64]) -> MatchResult<f64> {
    if a.len() != b.len() {
        return Err(MatchError::Cluster(format!(
            "cannot compare {}-d and {}-d points",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt())
}

fn centroid_of<'p>(coords: impl Iterator<Item = &'p [f64]>) -> MatchResult<Vec<f64>> {
    let mut sum: Option<Vec<f64>> = None;
    let mut count = 0usize;
    for c in coords {
        match sum.as_mut() {
            None => sum = Some(c.to_vec()),
            Some(acc) => {
                if acc.len() != c.len() {
                    return Err(MatchError::Cluster("points of differing dimensionality".into()));
                }
                acc.iter_mut().zip(c).for_each(|(a, x)| *a += x);
            }
        }
        count += 1;
    }
    let mut sum = sum.ok_or_else(|| MatchError::Cluster("empty cluster".into()))?;
    sum.iter_mut().for_each(|a| *a /= count as f64);
    Ok(sum)
}

/// Index of the nearest centroid; earlier clusters win ties.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> MatchResult<usize> {
    let mut best = 0;
    let mut best_distance = euclidean(point, &centroids[0])?;
    for (i, c) in centroids.iter().enumerate().skip(1) {
        let d = euclidean(point, c)?;
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }
    Ok(best)
}

pub fn kmeans<R, G: Rng + ?Sized>(
    points: Vec<Point<R>>,
    options: KMeansOptions,
    rng: &mut G,
) -> MatchResult<KMeansResult<R>> {
    let KMeansOptions {
        k,
        cutoff,
        max_iterations,
    } = options;
    if k == 0 || k > points.len() {
        return Err(MatchError::Cluster(format!(
            "k must be in 1..={}, got {k}",
            points.len()
        )));
    }
    let dim = points[0].dim();
    if points.iter().any(|p| p.dim() != dim) {
        return Err(MatchError::Cluster("points of differing dimensionality".into()));
    }

    let mut centroids: Vec<Vec<f64>> = rand::seq::index::sample(rng, points.len(), k)
        .into_iter()
        .map(|i| points[i].coords.clone())
        .collect();
    let mut assignment: Vec<usize> = vec![usize::MAX; points.len()];
    let mut iterations = 0;

    loop {
        iterations += 1;
        let mut changed = false;
        for (slot, p) in assignment.iter_mut().zip(&points) {
            let idx = nearest(&p.coords, &centroids)?;
            if *slot != idx {
                *slot = idx;
                changed = true;
            }
        }

        let mut biggest_shift: f64 = 0.0;
        for (ci, centroid) in centroids.iter_mut().enumerate() {
            let members = points
                .iter()
                .zip(&assignment)
                .filter(|&(_, &a)| a == ci)
                .map(|(p, _)| p.coords.as_slice());
            let updated = centroid_of(members)
                .map_err(|_| MatchError::Cluster(format!("cluster {ci} became empty")))?;
            biggest_shift = biggest_shift.max(euclidean(centroid, &updated)?);
            *centroid = updated;
        }

        if biggest_shift < cutoff || !changed || iterations >= max_iterations {
            break;
        }
    }

    let mut grouped: Vec<Vec<Point<R>>> = (0..k).map(|_| Vec::new()).collect();
    for (p, a) in points.into_iter().zip(assignment) {
        grouped[a].push(p);
    }
    let clusters = grouped
        .into_iter()
        .zip(centroids)
        .map(|(points, centroid)| Cluster { points, centroid })
        .collect();
    Ok(KMeansResult {
        clusters,
        iterations,
    })
}

/// One point per repository with language data, one coordinate per known
/// language (ascending name order) valued by that language's size bucket.
pub fn language_points(index: &IndexSet) -> (Vec<String>, Vec<Point<RepoId>>) {
    let languages: Vec<String> = index.language_names().map(str::to_string).collect();
    let points = index
        .languages_by_repo()
        .map(|(repo, langs)| Point::new(language_vector(langs, &languages), repo))
        .collect();
    (languages, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn blobs() -> Vec<Point<usize>> {
        let mut points = Vec::new();
        for (i, &(cx, cy)) in [(0.0, 0.0), (100.0, 100.0)].iter().enumerate() {
            for j in 0..10 {
                let dx = (j % 3) as f64;
                let dy = (j / 3) as f64;
                points.push(Point::new(vec![cx + dx, cy + dy], i * 100 + j));
            }
        }
        points
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let mut rng = StdRng::seed_from_u64(7);
        let options = KMeansOptions { k: 2, cutoff: 1e-9, max_iterations: 100 };
        let result = kmeans(blobs(), options, &mut rng).unwrap();
        assert_eq!(result.clusters.len(), 2);
        for cluster in &result.clusters {
            assert_eq!(cluster.len(), 10);
            let group = cluster.points()[0].reference / 100;
            assert!(cluster.points().iter().all(|p| p.reference / 100 == group));
        }
    }

    #[test]
    fn centroid_is_member_mean_and_partition_is_stable() {
        let mut rng = StdRng::seed_from_u64(42);
        let options = KMeansOptions { k: 2, cutoff: 1e-9, max_iterations: 100 };
        let result = kmeans(blobs(), options, &mut rng).unwrap();
        let centroids: Vec<Vec<f64>> = result.clusters.iter().map(|c| c.centroid().to_vec()).collect();
        for (ci, cluster) in result.clusters.iter().enumerate() {
            assert!(!cluster.is_empty());
            let n = cluster.len() as f64;
            for d in 0..2 {
                let mean = cluster.points().iter().map(|p| p.coords[d]).sum::<f64>() / n;
                assert!((mean - cluster.centroid()[d]).abs() < 1e-9);
            }
            for p in cluster.points() {
                assert_eq!(nearest(&p.coords, &centroids).unwrap(), ci);
            }
        }
    }

    #[test]
    fn same_seed_same_partition() {
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let options = KMeansOptions { k: 2, ..Default::default() };
            kmeans(blobs(), options, &mut rng)
                .unwrap()
                .clusters
                .iter()
                .map(|c| c.points().iter().map(|p| p.reference).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn rejects_mixed_dimensions_and_bad_k() {
        let mut rng = StdRng::seed_from_u64(1);
        let mixed = vec![Point::new(vec![1.0], 0), Point::new(vec![1.0, 2.0], 1)];
        assert!(matches!(
            kmeans(mixed, KMeansOptions { k: 1, ..Default::default() }, &mut rng),
            Err(MatchError::Cluster(_))
        ));
        let few = vec![Point::new(vec![1.0], 0)];
        assert!(kmeans(few, KMeansOptions { k: 2, ..Default::default() }, &mut rng).is_err());
        assert!(Cluster::<u8>::new(vec![]).is_err());
    }

    #[test]
    fn empty_cluster_is_an_error() {
        // Duplicate points: two initial centroids coincide and the second never wins a tie.
        let mut rng = StdRng::seed_from_u64(0);
        let same = vec![Point::new(vec![1.0], 0), Point::new(vec![1.0], 1)];
        assert!(matches!(
            kmeans(same, KMeansOptions { k: 2, ..Default::default() }, &mut rng),
            Err(MatchError::Cluster(_))
        ));
    }
}
