//! CART decision trees stored as a flat node arena.
//!
//! Classification trees split on Gini impurity and keep class distributions
//! in their leaves; regression trees split on squared error and keep the
//! leaf mean. The same builder backs the forests (bootstrap rows, feature
//! subsampling, random thresholds for extra trees) and gradient boosting.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::{Estimator, argmax_rows, check_fit_input, class_count};
use crate::error::{LearningError, Result};

/// How many features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxFeatures {
    #[default]
    All,
    Sqrt,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).max(1),
        }
    }
}

/// Growth parameters shared by every tree-based model.
#[derive(Debug, Clone)]
pub struct TreeParams {
    /// `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw one uniform threshold per feature instead of scanning all cut points.
    pub random_splits: bool,
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            random_splits: false,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TreeKind {
    Classifier,
    Regressor,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree. Shared by the public tree, forest and boosting models.
#[derive(Debug, Clone)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
    importances: Array1<f64>,
}

impl Tree {
    /// Grow a tree on the rows listed in `rows` (duplicates allowed).
    pub(crate) fn grow(
        kind: TreeKind,
        params: &TreeParams,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: Vec<usize>,
        n_classes: usize,
    ) -> Self {
        let mut builder = Builder {
            x,
            y,
            kind,
            n_classes,
            params,
            rng: StdRng::seed_from_u64(params.seed),
            nodes: Vec::new(),
            importances: vec![0.0; x.ncols()],
        };
        builder.grow(rows, 0);

        let total: f64 = builder.importances.iter().sum();
        let importances = if total > 0.0 {
            Array1::from_iter(builder.importances.iter().map(|v| v / total))
        } else {
            Array1::zeros(x.ncols())
        };

        Self {
            nodes: builder.nodes,
            importances,
        }
    }

    fn leaf_for(&self, x: &Array2<f64>, row: usize) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if x[[row, *feature]] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Leaf value for regression trees.
    pub(crate) fn predict_values(&self, x: &Array2<f64>) -> Array1<f64> {
        (0..x.nrows()).map(|r| self.leaf_for(x, r)[0]).collect()
    }

    /// Leaf class distribution for classification trees.
    pub(crate) fn predict_distribution(&self, x: &Array2<f64>, n_classes: usize) -> Array2<f64> {
        let mut out = Array2::zeros((x.nrows(), n_classes));
        for r in 0..x.nrows() {
            for (c, &p) in self.leaf_for(x, r).iter().enumerate() {
                out[[r, c]] = p;
            }
        }
        out
    }

    pub(crate) fn importances(&self) -> &Array1<f64> {
        &self.importances
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    kind: TreeKind,
    n_classes: usize,
    params: &'a TreeParams,
    rng: StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl Builder<'_> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(&rows),
        });

        let impurity = self.impurity(&rows);
        let depth_ok = self.params.max_depth.is_none_or(|d| depth < d);
        if !depth_ok
            || rows.len() < self.params.min_samples_split
            || rows.len() < 2 * self.params.min_samples_leaf
            || impurity <= 1e-12
        {
            return id;
        }

        let Some(split) = self.best_split(&rows, impurity) else {
            return id;
        };
        self.importances[split.feature] += split.gain;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| self.x[[r, split.feature]] <= split.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);

        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn leaf_value(&self, rows: &[usize]) -> Vec<f64> {
        let n = rows.len().max(1) as f64;
        match self.kind {
            TreeKind::Classifier => {
                let mut counts = vec![0.0; self.n_classes];
                for &r in rows {
                    counts[self.y[r] as usize] += 1.0;
                }
                counts.iter().map(|c| c / n).collect()
            }
            TreeKind::Regressor => {
                vec![rows.iter().map(|&r| self.y[r]).sum::<f64>() / n]
            }
        }
    }

    /// Node impurity (Gini or variance).
    fn impurity(&self, rows: &[usize]) -> f64 {
        let n = rows.len() as f64;
        if n == 0.0 {
            return 0.0;
        }
        match self.kind {
            TreeKind::Classifier => {
                let mut counts = vec![0.0; self.n_classes];
                for &r in rows {
                    counts[self.y[r] as usize] += 1.0;
                }
                weighted_gini(&counts, n) / n
            }
            TreeKind::Regressor => {
                let (sum, sq) = rows.iter().fold((0.0, 0.0), |(s, q), &r| {
                    (s + self.y[r], q + self.y[r] * self.y[r])
                });
                weighted_variance(sum, sq, n) / n
            }
        }
    }

    fn best_split(&mut self, rows: &[usize], parent_impurity: f64) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let k = self.params.max_features.resolve(n_features);
        let features: Vec<usize> = if k >= n_features {
            (0..n_features).collect()
        } else {
            index::sample(&mut self.rng, n_features, k).into_vec()
        };

        let parent = rows.len() as f64 * parent_impurity;
        let mut best: Option<SplitCandidate> = None;
        for feature in features {
            let candidate = if self.params.random_splits {
                self.random_split(rows, feature)
            } else {
                self.exhaustive_split(rows, feature)
            };
            if let Some((threshold, children)) = candidate {
                let gain = parent - children;
                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }

    /// Scan every cut point between distinct sorted values.
    ///
    /// Returns the threshold and the summed weighted child impurity.
    fn exhaustive_split(&self, rows: &[usize], feature: usize) -> Option<(f64, f64)> {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
        let n = sorted.len();
        if n < 2 {
            return None;
        }
        let min_leaf = self.params.min_samples_leaf;
        let mut stats = SplitStats::new(self, &sorted);

        let mut best: Option<(f64, f64)> = None;
        for p in 0..n - 1 {
            stats.move_left(self, sorted[p]);
            let (nl, nr) = (p + 1, n - p - 1);
            if nl < min_leaf || nr < min_leaf {
                continue;
            }
            let here = self.x[[sorted[p], feature]];
            let next = self.x[[sorted[p + 1], feature]];
            if here == next {
                continue;
            }
            let children = stats.children_impurity(nl as f64, nr as f64);
            if best.is_none_or(|(_, b)| children < b) {
                let mid = here + (next - here) / 2.0;
                let threshold = if mid >= next { here } else { mid };
                best = Some((threshold, children));
            }
        }
        best
    }

    /// One uniform random threshold in `(min, max)` of the node's values.
    fn random_split(&mut self, rows: &[usize], feature: usize) -> Option<(f64, f64)> {
        let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
            let v = self.x[[r, feature]];
            (lo.min(v), hi.max(v))
        });
        if !(hi > lo) {
            return None;
        }
        let threshold = self.rng.gen_range(lo..hi);

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| self.x[[r, feature]] <= threshold);
        let min_leaf = self.params.min_samples_leaf;
        if left.len() < min_leaf || right.len() < min_leaf || left.is_empty() || right.is_empty() {
            return None;
        }
        let children = self.impurity(&left) * left.len() as f64
            + self.impurity(&right) * right.len() as f64;
        Some((threshold, children))
    }
}

/// Running left/right sufficient statistics for the exhaustive scan.
enum SplitStats {
    Counts { left: Vec<f64>, right: Vec<f64> },
    Moments { left: (f64, f64), right: (f64, f64) },
}

impl SplitStats {
    fn new(b: &Builder<'_>, rows: &[usize]) -> Self {
        match b.kind {
            TreeKind::Classifier => {
                let mut right = vec![0.0; b.n_classes];
                for &r in rows {
                    right[b.y[r] as usize] += 1.0;
                }
                SplitStats::Counts {
                    left: vec![0.0; b.n_classes],
                    right,
                }
            }
            TreeKind::Regressor => {
                let right = rows
                    .iter()
                    .fold((0.0, 0.0), |(s, q), &r| (s + b.y[r], q + b.y[r] * b.y[r]));
                SplitStats::Moments {
                    left: (0.0, 0.0),
                    right,
                }
            }
        }
    }

    fn move_left(&mut self, b: &Builder<'_>, row: usize) {
        let v = b.y[row];
        match self {
            SplitStats::Counts { left, right } => {
                left[v as usize] += 1.0;
                right[v as usize] -= 1.0;
            }
            SplitStats::Moments { left, right } => {
                left.0 += v;
                left.1 += v * v;
                right.0 -= v;
                right.1 -= v * v;
            }
        }
    }

    fn children_impurity(&self, nl: f64, nr: f64) -> f64 {
        match self {
            SplitStats::Counts { left, right } => weighted_gini(left, nl) + weighted_gini(right, nr),
            SplitStats::Moments { left, right } => {
                weighted_variance(left.0, left.1, nl) + weighted_variance(right.0, right.1, nr)
            }
        }
    }
}

/// `n · gini`.
fn weighted_gini(counts: &[f64], n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    n - counts.iter().map(|c| c * c).sum::<f64>() / n
}

/// `n · variance`, clamped at zero against cancellation error.
fn weighted_variance(sum: f64, sq: f64, n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    (sq - sum * sum / n).max(0.0)
}

/// Single CART classifier.
#[derive(Debug, Clone, Default)]
pub struct DecisionTreeClassifier {
    params: TreeParams,
    fitted: Option<(Tree, usize)>,
}

impl DecisionTreeClassifier {
    #[must_use]
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// Number of nodes in the fitted tree.
    pub fn node_count(&self) -> usize {
        self.fitted.as_ref().map_or(0, |(t, _)| t.node_count())
    }
}

impl Estimator for DecisionTreeClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input("Decision Tree Classifier", x, y)?;
        let n_classes = class_count(y);
        let tree = Tree::grow(
            TreeKind::Classifier,
            &self.params,
            x,
            y,
            (0..x.nrows()).collect(),
            n_classes,
        );
        self.fitted = Some((tree, n_classes));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (tree, n_classes) = self
            .fitted
            .as_ref()
            .ok_or_else(|| LearningError::NotFitted("Decision Tree Classifier".into()))?;
        Ok(argmax_rows(&tree.predict_distribution(x, *n_classes)))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        Some(
            self.fitted
                .as_ref()
                .map(|(tree, n)| tree.predict_distribution(x, *n))
                .ok_or_else(|| LearningError::NotFitted("Decision Tree Classifier".into())),
        )
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.fitted.as_ref().map(|(t, _)| t.importances().clone())
    }
}

/// Single CART regressor.
#[derive(Debug, Clone, Default)]
pub struct DecisionTreeRegressor {
    params: TreeParams,
    fitted: Option<Tree>,
}

impl DecisionTreeRegressor {
    #[must_use]
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }
}

impl Estimator for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input("Decision Tree", x, y)?;
        self.fitted = Some(Tree::grow(
            TreeKind::Regressor,
            &self.params,
            x,
            y,
            (0..x.nrows()).collect(),
            0,
        ));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted
            .as_ref()
            .map(|t| t.predict_values(x))
            .ok_or_else(|| LearningError::NotFitted("Decision Tree".into()))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.fitted.as_ref().map(|t| t.importances().clone())
    }
}
