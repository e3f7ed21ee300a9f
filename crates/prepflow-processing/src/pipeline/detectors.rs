//! Model-based outlier detectors for a single numeric column.
//!
//! Both return one flag per input value. The contamination rate fixes the
//! decision threshold: a value is flagged when its outlier score is above
//! the `1 - contamination` percentile of all scores.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;

use crate::utils::percentile;

pub const CONTAMINATION: f64 = 0.1;
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
/// Added to mean reachability distances so duplicated points stay finite.
const LRD_EPSILON: f64 = 1e-10;

/// Isolation forest over one-dimensional data.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_trees: usize,
    max_samples: usize,
    seed: u64,
}

#[derive(Debug)]
enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: Box<Node>, right: Box<Node> },
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

impl IsolationForest {
    /// Anomaly score in (0, 1] per value; higher is more isolated.
    pub fn scores(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        if n < 2 {
            return vec![0.0; n];
        }
        let psi = self.max_samples.min(n);
        let depth_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees: Vec<Node> = (0..self.n_trees)
            .map(|_| {
                let sample: Vec<f64> = index::sample(&mut rng, n, psi)
                    .into_iter()
                    .map(|i| values[i])
                    .collect();
                grow(&sample, 0, depth_limit, &mut rng)
            })
            .collect();

        let norm = average_path_length(psi);
        values
            .iter()
            .map(|&v| {
                let mean_depth =
                    trees.iter().map(|t| path_length(t, v, 0)).sum::<f64>() / trees.len() as f64;
                2f64.powf(-mean_depth / norm)
            })
            .collect()
    }

    pub fn detect(&self, values: &[f64]) -> Vec<bool> {
        flag_top(&self.scores(values))
    }
}

fn grow(sample: &[f64], depth: usize, limit: usize, rng: &mut StdRng) -> Node {
    let (min, max) = sample
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if depth >= limit || sample.len() <= 1 || min == max {
        return Node::Leaf { size: sample.len() };
    }
    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<f64>, Vec<f64>) = sample.iter().partition(|&&v| v < threshold);
    Node::Split {
        threshold,
        left: Box::new(grow(&left, depth + 1, limit, rng)),
        right: Box::new(grow(&right, depth + 1, limit, rng)),
    }
}

fn path_length(node: &Node, value: f64, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split { threshold, left, right } => {
            let next = if value < *threshold { left } else { right };
            path_length(next, value, depth + 1)
        }
    }
}

/// Expected path length of an unsuccessful BST search among `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Local outlier factor over one-dimensional data.
#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    n_neighbors: usize,
}

impl Default for LocalOutlierFactor {
    fn default() -> Self {
        Self { n_neighbors: 20 }
    }
}

impl LocalOutlierFactor {
    /// LOF per value; around 1 for inliers, larger for outliers.
    pub fn scores(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        if n < 2 {
            return vec![1.0; n];
        }
        let k = self.n_neighbors.min(n - 1);

        // k nearest neighbours (excluding self) and the k-distance of each point.
        let neighbours: Vec<Vec<(usize, f64)>> = (0..n)
            .map(|i| {
                let mut d: Vec<(usize, f64)> = (0..n)
                    .filter(|&j| j != i)
                    .map(|j| (j, (values[i] - values[j]).abs()))
                    .collect();
                d.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                d.truncate(k);
                d
            })
            .collect();
        let k_distance: Vec<f64> = neighbours
            .iter()
            .map(|nb| nb.last().map_or(0.0, |&(_, d)| d))
            .collect();

        let lrd: Vec<f64> = neighbours
            .iter()
            .map(|nb| {
                let reach = nb.iter().map(|&(j, d)| d.max(k_distance[j])).sum::<f64>() / k as f64;
                1.0 / (reach + LRD_EPSILON)
            })
            .collect();

        neighbours
            .iter()
            .enumerate()
            .map(|(i, nb)| nb.iter().map(|&(j, _)| lrd[j]).sum::<f64>() / (k as f64 * lrd[i]))
            .collect()
    }

    pub fn detect(&self, values: &[f64]) -> Vec<bool> {
        flag_top(&self.scores(values))
    }
}

/// Flag scores strictly above the `1 - CONTAMINATION` percentile.
fn flag_top(scores: &[f64]) -> Vec<bool> {
    let Some(cutoff) = percentile(scores, 1.0 - CONTAMINATION) else {
        return Vec::new();
    };
    scores.iter().map(|&s| s > cutoff).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn with_spike() -> Vec<f64> {
        let mut values: Vec<f64> = (0..40).map(|i| 10.0 + (i % 7) as f64 * 0.5).collect();
        values.push(250.0);
        values
    }

    #[test]
    fn test_isolation_forest_flags_spike() {
        let values = with_spike();
        let flags = IsolationForest::default().detect(&values);
        assert_eq!(flags.len(), values.len());
        assert!(flags[40]);
        assert!(flags.iter().filter(|f| **f).count() <= 5);
    }

    #[test]
    fn test_isolation_forest_is_deterministic() {
        let values = with_spike();
        let forest = IsolationForest::default();
        assert_eq!(forest.scores(&values), forest.scores(&values));
    }

    #[test]
    fn test_lof_flags_spike() {
        let values = with_spike();
        let scores = LocalOutlierFactor::default().scores(&values);
        let spike = scores[40];
        assert!(scores[..40].iter().all(|&s| s < spike));
        assert!(LocalOutlierFactor::default().detect(&values)[40]);
    }

    #[test]
    fn test_tiny_inputs() {
        assert_eq!(IsolationForest::default().detect(&[1.0]), vec![false]);
        assert_eq!(LocalOutlierFactor::default().detect(&[]), Vec::<bool>::new());
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.244).abs() < 1e-2);
    }
}
