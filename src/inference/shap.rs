//! Tree Explainer - exact path-dependent TreeSHAP
//!
//! Attributions are computed in margin space and use node cover as the
//! background distribution, so for any input
//! `expected_value + sum(shap_values) == predict_margin`.

use super::ensemble::{Node, Tree, TreeEnsemble};
use super::ModelError;

/// One entry of the unique feature path from the root to the current node.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` for the root sentinel
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// Explainer bound to one ensemble; immutable after construction.
#[derive(Debug, Clone)]
pub struct TreeExplainer {
    expected_value: f64,
    num_features: usize,
}

impl TreeExplainer {
    pub fn new(model: &TreeEnsemble) -> Self {
        let expected_value = model.base_margin()
            + model.trees().iter().map(Tree::expected_value).sum::<f64>();

        Self {
            expected_value,
            num_features: model.num_features(),
        }
    }

    /// Mean margin over the training distribution
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    /// One contribution per feature for the margin of `x`.
    pub fn shap_values(&self, model: &TreeEnsemble, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        if model.num_features() != self.num_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.num_features,
                actual: model.num_features(),
            });
        }
        model.check_width(x)?;

        let mut phi = vec![0.0; self.num_features];
        for tree in model.trees() {
            tree_shap(tree, x, &mut phi, 0, &[], 1.0, 1.0, None);
        }
        Ok(phi)
    }
}

#[allow(clippy::too_many_arguments)]
fn tree_shap(
    tree: &Tree,
    x: &[f64],
    phi: &mut [f64],
    node: usize,
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut path = parent_path.to_vec();
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match *tree.node(node) {
        Node::Leaf { value, .. } => {
            let depth = path.len() - 1;
            for i in 1..=depth {
                let weight = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += weight * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        Node::Split { feature: split, left, right, cover, .. } => {
            let hot = tree.next_child(node, x).unwrap_or(left);
            let cold = if hot == left { right } else { left };
            let hot_zero = tree.node(hot).cover() / cover;
            let cold_zero = tree.node(cold).cover() / cover;

            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;

            // A feature seen earlier on the path is folded into this split.
            if let Some(k) = path.iter().position(|e| e.feature == Some(split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            tree_shap(tree, x, phi, hot, &path, hot_zero * incoming_zero, incoming_one, Some(split));
            tree_shap(tree, x, phi, cold, &path, cold_zero * incoming_zero, 0.0, Some(split));
        }
    }
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let d = depth as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - i as f64) / (d + 1.0);
    }
}

/// Remove `path[index]`, undoing its `extend_path`.
fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (d - i as f64) / (d + 1.0);
        } else if zero_fraction != 0.0 {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero_fraction * (d - i as f64));
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.truncate(depth);
}

/// Total permutation weight of the path with `path[index]` removed.
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((d - i as f64) / (d + 1.0));
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((d - i as f64) / (d + 1.0));
        }
    }
    total
}
