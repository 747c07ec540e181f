use log::debug;
use rand::Rng;
use rand::SeedableRng;
use rand::seq::index::sample;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::models::traits::{check_row_width, validate_training_data, Regressor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    /// Features considered per split; `None` considers all of them
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 15,
            min_samples_split: 5,
            min_samples_leaf: 2,
            bootstrap: true,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// CART regression tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split { feature, threshold, left, right }) => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

struct Best {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// Builds one tree over column-major data. Each node holds, per feature, the
/// node's sample rows sorted by that feature (rows repeat for bootstrap
/// duplicates), so split search is a linear scan.
struct TreeBuilder<'a> {
    columns: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a ForestParams,
    rng: Pcg64,
    goes_left: Vec<bool>,
    nodes: Vec<TreeNode>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, sorted: Vec<Vec<usize>>, depth: usize) -> usize {
        let rows = &sorted[0];
        let n = rows.len();
        let sum: f64 = rows.iter().map(|r| self.y[*r]).sum();
        let mean = sum / n as f64;

        let idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: mean });

        let pure = rows.iter().all(|r| (self.y[*r] - mean).abs() < 1e-12);
        if depth >= self.params.max_depth || n < self.params.min_samples_split || pure {
            return idx;
        }

        let best = match self.find_split(&sorted, sum) {
            Some(best) => best,
            None => return idx,
        };

        for r in &sorted[0] {
            self.goes_left[*r] = self.columns[best.feature][*r] <= best.threshold;
        }
        let mut left_sorted = Vec::with_capacity(sorted.len());
        let mut right_sorted = Vec::with_capacity(sorted.len());
        for list in sorted {
            let (l, r): (Vec<usize>, Vec<usize>) = list.into_iter().partition(|row| self.goes_left[*row]);
            left_sorted.push(l);
            right_sorted.push(r);
        }

        let left = self.build(left_sorted, depth + 1);
        let right = self.build(right_sorted, depth + 1);
        self.nodes[idx] = TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    fn find_split(&mut self, sorted: &[Vec<usize>], total: f64) -> Option<Best> {
        let n_features = self.columns.len();
        let candidates: Vec<usize> = match self.params.max_features {
            Some(m) if m > 0 && m < n_features => sample(&mut self.rng, n_features, m).into_vec(),
            _ => (0..n_features).collect(),
        };

        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<Best> = None;

        for feature in candidates {
            let list = &sorted[feature];
            let n = list.len();
            let column = &self.columns[feature];
            let mut left_sum = 0.0;

            for pos in 0..n.saturating_sub(1) {
                left_sum += self.y[list[pos]];
                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf {
                    continue;
                }
                if n_right < min_leaf {
                    break;
                }
                let here = column[list[pos]];
                let next = column[list[pos + 1]];
                if next <= here {
                    continue;
                }

                let right_sum = total - left_sum;
                // maximizing this minimizes the children's squared error
                let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
                if best.as_ref().map_or(true, |b| score > b.score) {
                    let mid = here + (next - here) / 2.0;
                    let threshold = if mid < next { mid } else { here };
                    best = Some(Best { feature, threshold, score });
                }
            }
        }
        best
    }
}

/// Bagged ensemble of CART regression trees.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let width = validate_training_data(x, y)?;
        if self.params.n_trees == 0 || self.params.max_depth == 0 {
            return Err(ForecastError::invalid_parameter("forest needs at least one tree of depth >= 1"));
        }
        let n = x.len();

        let columns: Vec<Vec<f64>> = (0..width).map(|j| x.iter().map(|row| row[j]).collect()).collect();
        let order: Vec<Vec<usize>> = columns
            .iter()
            .map(|col| {
                let mut idx: Vec<usize> = (0..n).collect();
                idx.sort_by(|a, b| col[*a].total_cmp(&col[*b]));
                idx
            })
            .collect();

        let mut trees = Vec::with_capacity(self.params.n_trees);
        for t in 0..self.params.n_trees {
            let mut rng = Pcg64::seed_from_u64(self.params.seed.wrapping_add(t as u64));

            let mut counts = vec![1usize; n];
            if self.params.bootstrap {
                counts.iter_mut().for_each(|c| *c = 0);
                for _ in 0..n {
                    counts[rng.gen_range(0..n)] += 1;
                }
            }

            let sorted: Vec<Vec<usize>> = order
                .iter()
                .map(|idx| {
                    let mut list = Vec::with_capacity(n);
                    for r in idx {
                        for _ in 0..counts[*r] {
                            list.push(*r);
                        }
                    }
                    list
                })
                .collect();

            let mut builder = TreeBuilder {
                columns: &columns,
                y,
                params: &self.params,
                rng,
                goes_left: vec![false; n],
                nodes: Vec::new(),
            };
            builder.build(sorted, 0);
            trees.push(RegressionTree { nodes: builder.nodes });
        }

        debug!(
            "Random forest fitted: {} trees on {} rows x {} features",
            trees.len(),
            n,
            width
        );
        self.n_features = width;
        self.trees = trees;
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if !self.is_fitted() {
            return Err(ForecastError::NotFitted);
        }
        check_row_width(row, self.n_features)?;
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        Ok(total / self.trees.len() as f64)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}
