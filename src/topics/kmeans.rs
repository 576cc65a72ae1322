// K-means clustering over article embeddings.
//
// Partitions the batch into k topic clusters by minimizing within-cluster
// squared distance. Centres are seeded with k-means++ from a fixed-seed
// ChaCha RNG so re-running on the same batch gives the same ids; the ids
// themselves are arbitrary labels, not a ranking.
//
// When more clusters are requested than there are articles, k is clamped
// to the article count instead of failing.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use super::error::{check_dimensions, TopicError};

/// Seed shared by the clusterer and the projector.
pub const DEFAULT_SEED: u64 = 42;

/// K-means configuration.
#[derive(Debug, Clone)]
pub struct KMeans {
    /// Requested number of clusters (must be at least 1)
    pub k: usize,
    pub seed: u64,
    /// Hard cap on Lloyd iterations per run
    pub max_iter: usize,
    /// Convergence threshold, relative to the mean per-feature variance
    pub tol: f64,
    /// Independent seeded runs; the lowest-inertia run wins
    pub n_init: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            k: 3,
            seed: DEFAULT_SEED,
            max_iter: 300,
            tol: 1e-4,
            n_init: 1,
        }
    }
}

/// Result of a k-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster id per input vector, each in `[0, k)`
    pub assignment: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from each vector to its centroid
    pub inertia: f64,
    pub iterations: usize,
    /// Effective cluster count after clamping
    pub k: usize,
}

impl KMeansFit {
    /// Number of members in each cluster, indexed by cluster id.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &c in &self.assignment {
            sizes[c] += 1;
        }
        sizes
    }
}

/// The cluster count actually used for `samples` vectors.
pub fn effective_k(requested: usize, samples: usize) -> usize {
    requested.min(samples)
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Cluster the vectors. An empty batch gives an empty assignment.
    pub fn fit(&self, vectors: &[Vec<f64>]) -> Result<KMeansFit, TopicError> {
        let n = vectors.len();
        if self.k == 0 {
            return Err(TopicError::InvalidClusterCount {
                requested: 0,
                samples: n,
            });
        }
        let dim = check_dimensions(vectors)?;

        if n == 0 {
            return Ok(KMeansFit {
                assignment: Vec::new(),
                centroids: Vec::new(),
                inertia: 0.0,
                iterations: 0,
                k: 0,
            });
        }

        let k = effective_k(self.k, n);
        if k < self.k {
            warn!(
                requested = self.k,
                samples = n,
                "More clusters requested than articles, clamping"
            );
        }

        let tol = self.tol * mean_feature_variance(vectors, dim);

        let mut best = self.run(vectors, k, tol, 0);
        for run in 1..self.n_init.max(1) {
            let fit = self.run(vectors, k, tol, run);
            if fit.inertia < best.inertia {
                best = fit;
            }
        }
        Ok(best)
    }

    /// One seeded k-means++ start followed by Lloyd iterations.
    fn run(&self, vectors: &[Vec<f64>], k: usize, tol: f64, run: usize) -> KMeansFit {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(run as u64));
        let seeds = kmeans_plus_plus(vectors, k, &mut rng);
        let fit = lloyd(vectors, seeds, self.max_iter, tol);

        debug!(
            run,
            inertia = fit.inertia,
            iterations = fit.iterations,
            "k-means run finished"
        );
        fit
    }
}

/// k-means++ seeding: each new centre is drawn with probability
/// proportional to its squared distance from the nearest existing centre.
fn kmeans_plus_plus(vectors: &[Vec<f64>], k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let n = vectors.len();
    let first = rng.random_range(0..n);
    let mut centroids = vec![vectors[first].clone()];
    let mut closest: Vec<f64> = vectors
        .iter()
        .map(|v| squared_distance(v, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            // Float round-off can leave target just above the last weight
            let mut chosen = closest.iter().rposition(|&d| d > 0.0).unwrap_or(0);
            for (i, &d) in closest.iter().enumerate() {
                if target < d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            // Every point coincides with a centre already
            rng.random_range(0..n)
        };

        centroids.push(vectors[next].clone());
        let newest = &centroids[centroids.len() - 1];
        for (c, v) in closest.iter_mut().zip(vectors) {
            *c = c.min(squared_distance(v, newest));
        }
    }

    centroids
}

/// Lloyd iterations from the given starting centres.
///
/// Stops when the labels repeat, when the centres move less than `tol`, or
/// when a labelling pass no longer lowers the inertia. The last of these
/// catches batches of identical vectors, where rounding in the recomputed
/// means keeps the centres jittering forever.
fn lloyd(vectors: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, max_iter: usize, tol: f64) -> KMeansFit {
    let n = vectors.len();

    let mut assignment = vec![0usize; n];
    let mut previous: Option<Vec<usize>> = None;
    let mut previous_inertia = f64::INFINITY;
    let mut iterations = 0;

    while iterations < max_iter {
        iterations += 1;

        let inertia = assign_all(vectors, &centroids, &mut assignment);
        if previous.as_ref() == Some(&assignment) || inertia >= previous_inertia {
            break;
        }
        previous_inertia = inertia;

        let updated = update_centroids(vectors, &mut assignment, &centroids);
        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| squared_distance(old, new))
            .sum();
        centroids = updated;
        previous = Some(assignment.clone());

        if shift <= tol {
            break;
        }
    }

    // Final pass so the labels belong to the returned centres. It can empty
    // a cluster again, so the update reseeds as in the loop.
    assign_all(vectors, &centroids, &mut assignment);
    let centroids = update_centroids(vectors, &mut assignment, &centroids);

    let inertia = vectors
        .iter()
        .zip(&assignment)
        .map(|(v, &c)| squared_distance(v, &centroids[c]))
        .sum();

    KMeansFit {
        assignment,
        k: centroids.len(),
        centroids,
        inertia,
        iterations,
    }
}

/// Label every vector with its nearest centre. Returns the inertia of that
/// labelling.
fn assign_all(vectors: &[Vec<f64>], centroids: &[Vec<f64>], assignment: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (label, v) in assignment.iter_mut().zip(vectors) {
        *label = nearest_centroid(v, centroids);
        inertia += squared_distance(v, &centroids[*label]);
    }
    inertia
}

/// Move each centre to the mean of its members, then reseed empty clusters.
/// A cluster with no members keeps its old centre until it is reseeded.
fn update_centroids(
    vectors: &[Vec<f64>],
    assignment: &mut [usize],
    centroids: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let k = centroids.len();
    let dim = vectors.first().map_or(0, Vec::len);

    let mut sums = vec![vec![0.0_f64; dim]; k];
    let mut counts = vec![0usize; k];
    for (v, &c) in vectors.iter().zip(assignment.iter()) {
        counts[c] += 1;
        for (s, x) in sums[c].iter_mut().zip(v) {
            *s += x;
        }
    }

    let mut updated: Vec<Vec<f64>> = (0..k)
        .map(|c| {
            if counts[c] == 0 {
                centroids[c].clone()
            } else {
                sums[c].iter().map(|s| s / counts[c] as f64).collect()
            }
        })
        .collect();

    relocate_empty_clusters(vectors, assignment, &mut sums, &mut counts, &mut updated);
    updated
}

/// Give each empty cluster the point farthest from its own centre, taken
/// from a cluster that can spare it.
fn relocate_empty_clusters(
    vectors: &[Vec<f64>],
    assignment: &mut [usize],
    sums: &mut [Vec<f64>],
    counts: &mut [usize],
    centroids: &mut [Vec<f64>],
) {
    for empty in 0..counts.len() {
        if counts[empty] != 0 {
            continue;
        }

        let mut farthest: Option<(usize, f64)> = None;
        for (i, v) in vectors.iter().enumerate() {
            let owner = assignment[i];
            if counts[owner] < 2 {
                continue;
            }
            let d = squared_distance(v, &centroids[owner]);
            if farthest.map_or(true, |(_, best)| d > best) {
                farthest = Some((i, d));
            }
        }

        let Some((point, _)) = farthest else {
            return;
        };
        let donor = assignment[point];

        counts[donor] -= 1;
        for (s, x) in sums[donor].iter_mut().zip(&vectors[point]) {
            *s -= x;
        }
        centroids[donor] = sums[donor]
            .iter()
            .map(|s| s / counts[donor] as f64)
            .collect();

        assignment[point] = empty;
        counts[empty] = 1;
        sums[empty] = vectors[point].clone();
        centroids[empty] = vectors[point].clone();
    }
}

/// Index of the closest centre; ties go to the lowest index.
fn nearest_centroid(v: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centre) in centroids.iter().enumerate() {
        let d = squared_distance(v, centre);
        if d < best_dist {
            best = c;
            best_dist = d;
        }
    }
    best
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn mean_feature_variance(vectors: &[Vec<f64>], dim: usize) -> f64 {
    if vectors.is_empty() || dim == 0 {
        return 0.0;
    }
    let n = vectors.len() as f64;
    let mut mean = vec![0.0_f64; dim];
    for v in vectors {
        for (m, x) in mean.iter_mut().zip(v) {
            *m += x / n;
        }
    }
    let total: f64 = vectors
        .iter()
        .map(|v| squared_distance(v, &mean))
        .sum();
    total / (n * dim as f64)
}
