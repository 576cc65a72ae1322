// t-SNE projection of article embeddings onto a 2-D topic map.
//
// Headline batches are small (NewsAPI returns at most 100 articles), so this
// is the exact O(n²) formulation: Gaussian affinities in embedding space
// calibrated per point to a target perplexity, a Student-t kernel in the
// plane, and gradient descent with early exaggeration, momentum and
// per-coordinate gains.
//
// The perplexity is clamped to the batch size: a point cannot have more
// effective neighbours than there are other points.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::error::{check_dimensions, TopicError};
use super::kmeans::{squared_distance, DEFAULT_SEED};

pub const DEFAULT_PERPLEXITY: f64 = 30.0;

const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const PERPLEXITY_STEPS: usize = 100;
const MIN_GAIN: f64 = 0.01;
const MIN_GRAD_NORM: f64 = 1e-7;
const INIT_STD: f64 = 1e-4;
const MACHINE_EPSILON: f64 = f64::EPSILON;
/// Smallest joint probability; keeps far pairs from vanishing entirely.
const MIN_JOINT_P: f64 = 1e-12;

/// Neighbourhood size actually used for `samples` points:
/// `min(requested, max(2, samples - 1))`.
pub fn effective_perplexity(requested: f64, samples: usize) -> f64 {
    let cap = samples.saturating_sub(1).max(2) as f64;
    requested.min(cap)
}

/// t-SNE configuration.
#[derive(Debug, Clone)]
pub struct Tsne {
    pub perplexity: f64,
    pub seed: u64,
    pub max_iter: usize,
    pub early_exaggeration: f64,
    /// Iterations spent with exaggerated attraction and low momentum
    pub exaggeration_iter: usize,
}

impl Default for Tsne {
    fn default() -> Self {
        Self {
            perplexity: DEFAULT_PERPLEXITY,
            seed: DEFAULT_SEED,
            max_iter: 1000,
            early_exaggeration: 12.0,
            exaggeration_iter: 250,
        }
    }
}

impl Tsne {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Project vectors to 2-D, one point per vector, in input order.
    ///
    /// An empty batch projects to nothing. A single vector has no
    /// neighbourhood to preserve and is placed at the origin.
    pub fn project(&self, vectors: &[Vec<f64>]) -> Result<Vec<(f64, f64)>, TopicError> {
        check_dimensions(vectors)?;
        match vectors.len() {
            0 => Ok(Vec::new()),
            1 => Ok(vec![(0.0, 0.0)]),
            _ => self.fit(vectors),
        }
    }

    /// Run t-SNE. Needs at least two vectors.
    pub fn fit(&self, vectors: &[Vec<f64>]) -> Result<Vec<(f64, f64)>, TopicError> {
        let n = vectors.len();
        if n < 2 {
            return Err(TopicError::InsufficientSamples { needed: 2, got: n });
        }
        check_dimensions(vectors)?;

        let perplexity = effective_perplexity(self.perplexity, n);
        let p = joint_probabilities(&pairwise_distances(vectors), n, perplexity);
        let learning_rate = (n as f64 / self.early_exaggeration / 4.0).max(50.0);

        debug!(n, perplexity, learning_rate, "Running t-SNE");

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut y: Vec<[f64; 2]> = (0..n)
            .map(|_| [gaussian(&mut rng) * INIT_STD, gaussian(&mut rng) * INIT_STD])
            .collect();
        let mut update = vec![[0.0_f64; 2]; n];
        let mut gains = vec![[1.0_f64; 2]; n];
        let mut num = vec![0.0_f64; n * n];
        let mut grad = vec![[0.0_f64; 2]; n];

        for iter in 0..self.max_iter {
            let exaggerating = iter < self.exaggeration_iter;
            let momentum = if exaggerating { 0.5 } else { 0.8 };
            let exaggeration = if exaggerating {
                self.early_exaggeration
            } else {
                1.0
            };

            // Student-t kernel between every pair of map points
            let mut sum_num = 0.0;
            for i in 0..n {
                for j in (i + 1)..n {
                    let dx = y[i][0] - y[j][0];
                    let dy = y[i][1] - y[j][1];
                    let q = 1.0 / (1.0 + dx * dx + dy * dy);
                    num[i * n + j] = q;
                    num[j * n + i] = q;
                    sum_num += 2.0 * q;
                }
            }
            let sum_num = sum_num.max(MACHINE_EPSILON);

            let mut grad_norm_sq = 0.0;
            for i in 0..n {
                let mut g = [0.0_f64; 2];
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let kernel = num[i * n + j];
                    let q = (kernel / sum_num).max(MACHINE_EPSILON);
                    let force = (exaggeration * p[i * n + j] - q) * kernel;
                    g[0] += force * (y[i][0] - y[j][0]);
                    g[1] += force * (y[i][1] - y[j][1]);
                }
                grad[i] = [4.0 * g[0], 4.0 * g[1]];
                grad_norm_sq += grad[i][0] * grad[i][0] + grad[i][1] * grad[i][1];
            }

            for i in 0..n {
                for d in 0..2 {
                    let g = grad[i][d];
                    if update[i][d] * g < 0.0 {
                        gains[i][d] += 0.2;
                    } else {
                        gains[i][d] *= 0.8;
                    }
                    gains[i][d] = gains[i][d].max(MIN_GAIN);
                    update[i][d] = momentum * update[i][d] - learning_rate * gains[i][d] * g;
                    y[i][d] += update[i][d];
                }
            }

            if !exaggerating && grad_norm_sq.sqrt() < MIN_GRAD_NORM {
                debug!(iter, "t-SNE gradient vanished, stopping early");
                break;
            }
        }

        let mean_x = y.iter().map(|p| p[0]).sum::<f64>() / n as f64;
        let mean_y = y.iter().map(|p| p[1]).sum::<f64>() / n as f64;

        Ok(y.into_iter()
            .map(|p| (p[0] - mean_x, p[1] - mean_y))
            .collect())
    }
}

/// Flat n×n matrix of squared Euclidean distances.
fn pairwise_distances(vectors: &[Vec<f64>]) -> Vec<f64> {
    let n = vectors.len();
    let mut d = vec![0.0_f64; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dist = squared_distance(&vectors[i], &vectors[j]);
            d[i * n + j] = dist;
            d[j * n + i] = dist;
        }
    }
    d
}

/// Symmetric joint probabilities P from per-point conditionals calibrated
/// to the given perplexity.
fn joint_probabilities(distances: &[f64], n: usize, perplexity: f64) -> Vec<f64> {
    let mut p = vec![0.0_f64; n * n];
    for i in 0..n {
        let row = conditional_row(&distances[i * n..(i + 1) * n], i, perplexity);
        p[i * n..(i + 1) * n].copy_from_slice(&row);
    }

    let mut joint = vec![0.0_f64; n * n];
    let mut total = 0.0;
    for i in 0..n {
        for j in 0..n {
            let v = p[i * n + j] + p[j * n + i];
            joint[i * n + j] = v;
            total += v;
        }
    }
    let total = total.max(MACHINE_EPSILON);
    for v in &mut joint {
        *v = (*v / total).max(MIN_JOINT_P);
    }
    joint
}

/// Binary-search the Gaussian precision for point `i` so that the entropy
/// of its neighbour distribution equals `ln(perplexity)`.
fn conditional_row(distances: &[f64], i: usize, perplexity: f64) -> Vec<f64> {
    let target = perplexity.ln();
    // Entropy is shift-invariant; subtracting the nearest distance keeps
    // exp() away from underflow on widely spread inputs.
    let nearest = distances
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, &d)| d)
        .fold(f64::INFINITY, f64::min);

    let mut beta = 1.0_f64;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut row = vec![0.0_f64; distances.len()];

    for _ in 0..PERPLEXITY_STEPS {
        let mut sum_p = 0.0;
        for (j, &d) in distances.iter().enumerate() {
            row[j] = if j == i {
                0.0
            } else {
                (-(d - nearest) * beta).exp()
            };
            sum_p += row[j];
        }
        let sum_p = if sum_p == 0.0 { 1e-8 } else { sum_p };

        let mut weighted = 0.0;
        for (j, &d) in distances.iter().enumerate() {
            row[j] /= sum_p;
            weighted += (d - nearest) * row[j];
        }
        let entropy = sum_p.ln() + beta * weighted;
        let diff = entropy - target;

        if diff.abs() <= PERPLEXITY_TOLERANCE {
            break;
        }
        if diff > 0.0 {
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = if beta_min.is_infinite() {
                beta / 2.0
            } else {
                (beta + beta_min) / 2.0
            };
        }
    }

    row
}

/// Standard normal sample via Box-Muller.
fn gaussian(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditional_row_sums_to_one() {
        let d = [0.0, 1.0, 4.0, 9.0];
        let row = conditional_row(&d, 0, 2.0);
        assert_eq!(row[0], 0.0);
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_conditional_row_hits_target_perplexity() {
        let d = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let row = conditional_row(&d, 0, 3.0);
        let entropy: f64 = row
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.ln())
            .sum();
        assert!((entropy.exp() - 3.0).abs() < 1e-3, "perplexity {}", entropy.exp());
    }

    #[test]
    fn test_conditional_row_prefers_closer_points() {
        let d = [0.0, 1.0, 4.0, 9.0];
        let row = conditional_row(&d, 0, 2.0);
        assert!(row[1] > row[2] && row[2] > row[3]);
    }

    #[test]
    fn test_joint_probabilities_symmetric_and_normalized() {
        let v = vec![vec![0.0], vec![1.0], vec![3.0]];
        let p = joint_probabilities(&pairwise_distances(&v), 3, 2.0);
        for i in 0..3 {
            for j in 0..3 {
                assert!((p[i * 3 + j] - p[j * 3 + i]).abs() < 1e-12);
            }
        }
        let off_diagonal: f64 = (0..3)
            .flat_map(|i| (0..3).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| p[i * 3 + j])
            .sum();
        assert!((off_diagonal - 1.0).abs() < 1e-9);
        assert!(p.iter().all(|&x| x >= MIN_JOINT_P));
    }

    #[test]
    fn test_joint_probabilities_diagonal_sits_at_floor() {
        let v = vec![vec![0.0], vec![0.5], vec![2.0], vec![4.0]];
        let p = joint_probabilities(&pairwise_distances(&v), 4, 2.0);
        for i in 0..4 {
            assert_eq!(p[i * 4 + i], MIN_JOINT_P);
        }
    }

    #[test]
    fn test_gaussian_is_finite() {
        let mut rng = ChaCha8Rng::seed_from_u64(DEFAULT_SEED);
        for _ in 0..1000 {
            assert!(gaussian(&mut rng).is_finite());
        }
    }
}
