//! Seeded random forest of CART classification trees.
//!
//! Trees are grown on bootstrap samples with Gini impurity and a random
//! subset of features per split. A flight's delay probability is the mean of
//! the leaf probabilities it lands in. Same data + same params = same forest.

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::encoding::{FeatureVector, N_FEATURES};
use crate::error::ModelError;
use crate::model::Classifier;

type Row = [f64; N_FEATURES];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features tried per split; `None` means floor(sqrt(n_features)).
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            max_features: None,
            seed: 42,
        }
    }
}

impl ForestParams {
    fn features_per_split(&self) -> usize {
        let k = self
            .max_features
            .unwrap_or_else(|| (N_FEATURES as f64).sqrt().floor() as usize);
        k.clamp(1, N_FEATURES)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Go left if `x[feature] <= threshold`.
    Split {
        feature: usize,
        threshold: f64,
        left: u32,
        right: u32,
    },
    Leaf { p_delayed: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// `None` if the node graph is broken (bad index, cycle).
    pub fn predict(&self, x: &Row) -> Option<f64> {
        let mut idx = 0usize;
        // A well-formed tree reaches a leaf in fewer hops than it has nodes.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx)? {
                Node::Leaf { p_delayed } => return Some(*p_delayed),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = *x.get(*feature)?;
                    let next = if v <= *threshold { *left } else { *right };
                    idx = next as usize;
                }
            }
        }
        None
    }

    /// Longest root-to-leaf path. `None` if the walk would exceed the node
    /// count, which only happens for a cyclic node graph.
    pub fn depth(&self) -> Option<usize> {
        fn walk(nodes: &[Node], idx: usize, budget: usize) -> Option<usize> {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    let budget = budget.checked_sub(1)?;
                    let l = walk(nodes, *left as usize, budget)?;
                    let r = walk(nodes, *right as usize, budget)?;
                    Some(1 + l.max(r))
                }
                _ => Some(0),
            }
        }
        walk(&self.nodes, 0, self.nodes.len())
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Row],
    y: &'a [bool],
    params: &'a ForestParams,
    rng: Xoshiro256PlusPlus,
    nodes: Vec<Node>,
}

fn gini(pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = pos as f64 / n as f64;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

impl<'a> TreeBuilder<'a> {
    fn grow(mut self, rows: Vec<usize>) -> Tree {
        self.build(rows, 0);
        Tree { nodes: self.nodes }
    }

    fn build(&mut self, rows: Vec<usize>, depth: usize) -> u32 {
        let n = rows.len();
        let pos = rows.iter().filter(|&&i| self.y[i]).count();
        let id = self.nodes.len() as u32;
        let p_delayed = if n == 0 { 0.0 } else { pos as f64 / n as f64 };
        self.nodes.push(Node::Leaf { p_delayed });

        if depth >= self.params.max_depth
            || n < self.params.min_samples_split.max(2)
            || pos == 0
            || pos == n
        {
            return id;
        }
        let Some(split) = self.best_split(&rows, pos) else {
            return id;
        };

        let (l, r): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);
        let left = self.build(l, depth + 1);
        let right = self.build(r, depth + 1);
        self.nodes[id as usize] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&mut self, rows: &[usize], pos: usize) -> Option<BestSplit> {
        let n = rows.len();
        let k = self.params.features_per_split();
        let features = rand::seq::index::sample(&mut self.rng, N_FEATURES, k);

        let mut best: Option<BestSplit> = None;
        let mut best_impurity = gini(pos, n);
        let mut vals: Vec<(f64, bool)> = Vec::with_capacity(n);

        for f in features.iter() {
            vals.clear();
            vals.extend(rows.iter().map(|&i| (self.x[i][f], self.y[i])));
            vals.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0usize;
            for j in 0..n - 1 {
                if vals[j].1 {
                    left_pos += 1;
                }
                let (lo, hi) = (vals[j].0, vals[j + 1].0);
                if lo == hi {
                    continue;
                }
                let nl = j + 1;
                let nr = n - nl;
                let impurity = (nl as f64 * gini(left_pos, nl)
                    + nr as f64 * gini(pos - left_pos, nr))
                    / n as f64;
                if impurity < best_impurity - 1e-12 {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best_impurity = impurity;
                    best = Some(BestSplit {
                        feature: f,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best.filter(|b| b.impurity.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<Tree>,
}

impl RandomForest {
    /// Fits the forest. Trees are grown in parallel; each tree's RNG is
    /// derived from `params.seed` and its index, so the result does not
    /// depend on scheduling.
    pub fn fit(features: &[FeatureVector], labels: &[bool], params: ForestParams) -> Self {
        assert_eq!(features.len(), labels.len(), "features/labels length mismatch");
        let x: Vec<Row> = features.iter().map(FeatureVector::to_array).collect();
        let n = x.len();
        if n == 0 {
            return Self {
                params,
                trees: Vec::new(),
            };
        }

        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed.wrapping_add(t as u64));
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                TreeBuilder {
                    x: &x,
                    y: labels,
                    params: &params,
                    rng,
                    nodes: Vec::new(),
                }
                .grow(rows)
            })
            .collect();

        Self { params, trees }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn predict_row(&self, x: &Row) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Empty);
        }
        if let Some((index, &value)) = x.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::NonFinite { index, value });
        }
        let mut sum = 0.0;
        for (t, tree) in self.trees.iter().enumerate() {
            sum += tree.predict(x).ok_or(ModelError::Corrupt(t))?;
        }
        Ok(sum / self.trees.len() as f64)
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        self.predict_row(&features.to_array())
    }
}
