//! Tree Ensemble - gradient boosted regression trees
//!
//! Reads the XGBoost JSON model layout (`Booster.save_model("*.json")`)
//! and evaluates it the way the XGBoost predictor does: features are
//! compared as `f32`, `x < split_condition` goes left, missing values
//! follow `default_left`.

use serde::{Deserialize, Serialize};

use super::ModelError;

// ============================================================================
// SERIALIZED LAYOUT
// ============================================================================

/// Top level of an XGBoost JSON model file
#[derive(Debug, Clone, Deserialize)]
pub struct XgbModelFile {
    pub learner: XgbLearner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbLearner {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub gradient_booster: XgbGradientBooster,
    pub learner_model_param: XgbLearnerParam,
    pub objective: XgbObjective,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbGradientBooster {
    pub name: String,
    #[serde(default)]
    pub model: Option<XgbGbtreeModel>,
}

/// `trees` is absent for linear boosters, which are rejected by name.
#[derive(Debug, Clone, Deserialize)]
pub struct XgbGbtreeModel {
    #[serde(default)]
    pub trees: Vec<XgbTree>,
    /// Output group of each tree
    #[serde(default)]
    pub tree_info: Vec<i64>,
}

/// XGBoost stores numeric learner params as strings ("5E-1", "[3.1E1]").
#[derive(Debug, Clone, Deserialize)]
pub struct XgbLearnerParam {
    pub base_score: String,
    pub num_feature: String,
    #[serde(default)]
    pub num_class: Option<String>,
    #[serde(default)]
    pub num_target: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbObjective {
    pub name: String,
}

/// Older writers emit `default_left` as 0/1, newer ones as booleans.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum XgbFlag {
    Bool(bool),
    Int(u8),
}

impl XgbFlag {
    fn is_set(self) -> bool {
        match self {
            XgbFlag::Bool(b) => b,
            XgbFlag::Int(i) => i != 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbTree {
    pub left_children: Vec<i64>,
    pub right_children: Vec<i64>,
    pub split_indices: Vec<i64>,
    pub split_conditions: Vec<f64>,
    pub default_left: Vec<XgbFlag>,
    pub sum_hessian: Vec<f64>,
    /// 0 for numerical splits, 1 for categorical ones
    #[serde(default)]
    pub split_type: Vec<u8>,
}

// ============================================================================
// IN-MEMORY MODEL
// ============================================================================

/// Output link applied to the raw margin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// `reg:squarederror`, `reg:absoluteerror`, ... - margin is the prediction
    Identity,
    /// `reg:logistic`, `binary:logistic` - sigmoid of the margin
    Logistic,
}

impl Objective {
    pub fn from_name(name: &str) -> Result<Self, ModelError> {
        match name {
            "reg:logistic" | "binary:logistic" => Ok(Objective::Logistic),
            n if n.starts_with("reg:") && n != "reg:gamma" && n != "reg:tweedie" => {
                Ok(Objective::Identity)
            }
            other => Err(ModelError::Unsupported(format!("objective {}", other))),
        }
    }

    /// Convert a stored base score to margin space.
    fn base_margin(self, base_score: f64) -> Result<f64, ModelError> {
        match self {
            Objective::Identity => Ok(base_score),
            Objective::Logistic => {
                if base_score <= 0.0 || base_score >= 1.0 {
                    return Err(ModelError::Unsupported(format!(
                        "logistic base_score {} outside (0, 1)",
                        base_score
                    )));
                }
                Ok((base_score / (1.0 - base_score)).ln())
            }
        }
    }

    pub fn apply(self, margin: f64) -> f64 {
        match self {
            Objective::Identity => margin,
            Objective::Logistic => 1.0 / (1.0 + (-margin).exp()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// One regression tree; node 0 is the root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Children must have larger indices than their parent, so every
    /// accepted tree is acyclic and traversal terminates.
    pub fn new(nodes: Vec<Node>, num_features: usize) -> Result<Self, ModelError> {
        if nodes.is_empty() {
            return Err(ModelError::InvalidTree("tree has no nodes".to_string()));
        }

        for (id, node) in nodes.iter().enumerate() {
            if let Node::Split { feature, left, right, cover, threshold, .. } = *node {
                if left <= id || right <= id || left >= nodes.len() || right >= nodes.len() {
                    return Err(ModelError::InvalidTree(format!(
                        "node {} has invalid children ({}, {})",
                        id, left, right
                    )));
                }
                if feature >= num_features {
                    return Err(ModelError::InvalidTree(format!(
                        "node {} splits on feature {} but model has {}",
                        id, feature, num_features
                    )));
                }
                if !(cover > 0.0) || !threshold.is_finite() {
                    return Err(ModelError::InvalidTree(format!(
                        "node {} has cover {} and threshold {}",
                        id, cover, threshold
                    )));
                }
            }
            if let Node::Leaf { value, cover } = *node {
                if !(cover >= 0.0) || !cover.is_finite() || !value.is_finite() {
                    return Err(ModelError::InvalidTree(format!(
                        "leaf {} has cover {} and value {}",
                        id, cover, value
                    )));
                }
            }
        }

        Ok(Self { nodes })
    }

    fn from_xgb(raw: &XgbTree, num_features: usize) -> Result<Self, ModelError> {
        let n = raw.left_children.len();
        let lengths = [
            raw.right_children.len(),
            raw.split_indices.len(),
            raw.split_conditions.len(),
            raw.default_left.len(),
            raw.sum_hessian.len(),
        ];
        if lengths.iter().any(|&l| l != n) {
            return Err(ModelError::InvalidTree(format!(
                "node arrays disagree in length ({} vs {:?})",
                n, lengths
            )));
        }

        if let Some(i) = raw.split_type.iter().position(|&t| t != 0) {
            return Err(ModelError::Unsupported(format!("categorical split at node {}", i)));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let cover = raw.sum_hessian[i];
            if raw.left_children[i] < 0 {
                nodes.push(Node::Leaf {
                    value: raw.split_conditions[i],
                    cover,
                });
                continue;
            }

            let to_index = |v: i64| {
                usize::try_from(v).map_err(|_| {
                    ModelError::InvalidTree(format!("node {} has negative index {}", i, v))
                })
            };
            nodes.push(Node::Split {
                feature: to_index(raw.split_indices[i])?,
                threshold: raw.split_conditions[i] as f32,
                left: to_index(raw.left_children[i])?,
                right: to_index(raw.right_children[i])?,
                default_left: raw.default_left[i].is_set(),
                cover,
            });
        }

        Self::new(nodes, num_features)
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    /// Which child `x` descends into from a split node.
    pub fn next_child(&self, id: usize, x: &[f64]) -> Option<usize> {
        match self.nodes[id] {
            Node::Leaf { .. } => None,
            Node::Split { feature, threshold, left, right, default_left, .. } => {
                let value = x[feature];
                if value.is_nan() {
                    Some(if default_left { left } else { right })
                } else if (value as f32) < threshold {
                    Some(left)
                } else {
                    Some(right)
                }
            }
        }
    }

    /// Leaf value reached by `x`.
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut id = 0;
        while let Some(next) = self.next_child(id, x) {
            id = next;
        }
        match self.nodes[id] {
            Node::Leaf { value, .. } => value,
            Node::Split { .. } => unreachable!("traversal stops at leaves"),
        }
    }

    /// Cover-weighted mean leaf value.
    pub fn expected_value(&self) -> f64 {
        self.subtree_mean(0)
    }

    fn subtree_mean(&self, id: usize) -> f64 {
        match self.nodes[id] {
            Node::Leaf { value, .. } => value,
            Node::Split { left, right, cover, .. } => {
                let l = self.nodes[left].cover() * self.subtree_mean(left);
                let r = self.nodes[right].cover() * self.subtree_mean(right);
                (l + r) / cover
            }
        }
    }

    pub fn max_depth(&self) -> usize {
        fn depth(tree: &Tree, id: usize) -> usize {
            match tree.nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + depth(tree, left).max(depth(tree, right)),
            }
        }
        depth(self, 0)
    }
}

/// Gradient boosted tree ensemble
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
    base_margin: f64,
    base_score: f64,
    objective: Objective,
    num_features: usize,
    feature_names: Vec<String>,
}

impl TreeEnsemble {
    pub fn new(
        trees: Vec<Tree>,
        base_score: f64,
        objective: Objective,
        num_features: usize,
    ) -> Result<Self, ModelError> {
        let base_margin = objective.base_margin(base_score)?;
        Ok(Self {
            trees,
            base_margin,
            base_score,
            objective,
            num_features,
            feature_names: Vec::new(),
        })
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self, ModelError> {
        if !names.is_empty() && names.len() != self.num_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.num_features,
                actual: names.len(),
            });
        }
        self.feature_names = names;
        Ok(self)
    }

    /// Build from a parsed XGBoost JSON model.
    pub fn from_xgboost(file: XgbModelFile) -> Result<Self, ModelError> {
        let learner = file.learner;

        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelError::Unsupported(format!(
                "booster {}",
                learner.gradient_booster.name
            )));
        }
        let model = learner
            .gradient_booster
            .model
            .ok_or_else(|| ModelError::Unsupported("gbtree without model".to_string()))?;

        let num_features = parse_xgb_number(&learner.learner_model_param.num_feature)?;
        if num_features < 0.0 || num_features.fract() != 0.0 {
            return Err(ModelError::Unsupported(format!(
                "num_feature {}",
                learner.learner_model_param.num_feature
            )));
        }
        let num_features = num_features as usize;

        // Only single-output models: one target, one class, every tree in group 0.
        for (name, value) in [
            ("num_target", &learner.learner_model_param.num_target),
            ("num_class", &learner.learner_model_param.num_class),
        ] {
            if let Some(value) = value {
                if parse_xgb_number(value)? > 1.0 {
                    return Err(ModelError::Unsupported(format!("{} {}", name, value)));
                }
            }
        }
        if model.tree_info.iter().any(|&group| group != 0) {
            return Err(ModelError::Unsupported("multiple output groups".to_string()));
        }

        let base_score = parse_xgb_number(&learner.learner_model_param.base_score)?;
        let objective = Objective::from_name(&learner.objective.name)?;

        let trees = model
            .trees
            .iter()
            .map(|t| Tree::from_xgb(t, num_features))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(trees, base_score, objective, num_features)?
            .with_feature_names(learner.feature_names)
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Base score in margin space
    pub fn base_margin(&self) -> f64 {
        self.base_margin
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn check_width(&self, x: &[f64]) -> Result<(), ModelError> {
        if x.len() != self.num_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.num_features,
                actual: x.len(),
            });
        }
        Ok(())
    }

    /// Raw ensemble output before the objective's link
    pub fn predict_margin(&self, x: &[f64]) -> Result<f64, ModelError> {
        self.check_width(x)?;
        Ok(self.base_margin + self.trees.iter().map(|t| t.predict(x)).sum::<f64>())
    }

}

/// Parse "5E-1" or "[5E-1]".
fn parse_xgb_number(raw: &str) -> Result<f64, ModelError> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let first = trimmed.split(',').next().unwrap_or_default().trim();
    first
        .parse::<f64>()
        .map_err(|_| ModelError::Unsupported(format!("numeric parameter {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::fixtures;

    #[test]
    fn test_parse_xgb_number_variants() {
        assert_eq!(parse_xgb_number("5E-1").unwrap(), 0.5);
        assert_eq!(parse_xgb_number("[3.1E1]").unwrap(), 31.0);
        assert_eq!(parse_xgb_number("8").unwrap(), 8.0);
        assert!(parse_xgb_number("abc").is_err());
    }

    #[test]
    fn test_load_fixture_model() {
        let model = fixtures::model();
        assert_eq!(model.num_features(), 5);
        assert_eq!(model.trees().len(), 3);
        assert_eq!(model.base_score(), 150.0);
        assert_eq!(model.objective(), Objective::Identity);
        assert_eq!(model.feature_names().unwrap()[4], "a_d");
        assert_eq!(model.trees()[2].max_depth(), 3);
    }

    #[test]
    fn test_predict_fixture() {
        let model = fixtures::model();
        let margin = model.predict_margin(&fixtures::scaled_sample()).unwrap();
        assert!((margin - 219.0).abs() < 1e-9);
        assert_eq!(model.objective().apply(margin), margin);
    }

    #[test]
    fn test_expected_value_is_cover_weighted() {
        let model = fixtures::model();
        let trees = model.trees();
        assert!((trees[0].expected_value() - 2.25).abs() < 1e-9);
        assert!((trees[1].expected_value() - 2.2).abs() < 1e-9);
        assert!((trees[2].expected_value() - 2.3).abs() < 1e-9);
    }

    #[test]
    fn test_split_compares_as_f32_and_routes_missing() {
        let nodes = vec![
            Node::Split {
                feature: 0,
                threshold: 0.1,
                left: 1,
                right: 2,
                default_left: false,
                cover: 2.0,
            },
            Node::Leaf { value: -1.0, cover: 1.0 },
            Node::Leaf { value: 1.0, cover: 1.0 },
        ];
        let tree = Tree::new(nodes, 1).unwrap();

        // 0.1f64 rounds to the same f32 as the threshold, so it is not "less than".
        assert_eq!(tree.predict(&[0.1]), 1.0);
        assert_eq!(tree.predict(&[0.09]), -1.0);
        assert_eq!(tree.predict(&[f64::NAN]), 1.0);
    }

    #[test]
    fn test_rejects_cyclic_and_out_of_range_trees() {
        let cyclic = vec![
            Node::Split { feature: 0, threshold: 0.0, left: 0, right: 1, default_left: true, cover: 1.0 },
            Node::Leaf { value: 0.0, cover: 1.0 },
        ];
        assert!(Tree::new(cyclic, 1).is_err());

        let bad_feature = vec![
            Node::Split { feature: 3, threshold: 0.0, left: 1, right: 2, default_left: true, cover: 1.0 },
            Node::Leaf { value: 0.0, cover: 0.5 },
            Node::Leaf { value: 0.0, cover: 0.5 },
        ];
        assert!(Tree::new(bad_feature, 2).is_err());
        assert!(Tree::new(Vec::new(), 1).is_err());
    }

    #[test]
    fn test_width_mismatch_is_an_error() {
        let model = fixtures::model();
        assert!(matches!(
            model.predict_margin(&[0.0; 4]),
            Err(ModelError::FeatureCountMismatch { expected: 5, actual: 4 })
        ));
    }

    #[test]
    fn test_logistic_objective() {
        let json = r#"{
            "learner": {
                "gradient_booster": {"name": "gbtree", "model": {"trees": [{
                    "left_children": [1, -1, -1],
                    "right_children": [2, -1, -1],
                    "split_indices": [0, 0, 0],
                    "split_conditions": [0.5, -1.0, 1.0],
                    "default_left": [true, false, false],
                    "sum_hessian": [2.0, 1.0, 1.0]
                }]}},
                "learner_model_param": {"base_score": "5E-1", "num_feature": "1"},
                "objective": {"name": "binary:logistic"}
            }
        }"#;
        let file: XgbModelFile = serde_json::from_str(json).unwrap();
        let model = TreeEnsemble::from_xgboost(file).unwrap();
        assert_eq!(model.objective(), Objective::Logistic);
        assert_eq!(model.base_margin(), 0.0);
        let p = model.objective().apply(model.predict_margin(&[1.0]).unwrap());
        assert!((p - 1.0 / (1.0 + (-1.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_unsupported_boosters() {
        let json = r#"{
            "learner": {
                "gradient_booster": {"name": "gblinear"},
                "learner_model_param": {"base_score": "0", "num_feature": "1"},
                "objective": {"name": "reg:squarederror"}
            }
        }"#;
        let file: XgbModelFile = serde_json::from_str(json).unwrap();
        assert!(matches!(
            TreeEnsemble::from_xgboost(file),
            Err(ModelError::Unsupported(_))
        ));
        assert!(Objective::from_name("multi:softprob").is_err());
    }

    fn one_split_model(tree_extra: &str, param_extra: &str, tree_info: &str) -> String {
        format!(
            r#"{{
            "learner": {{
                "gradient_booster": {{"name": "gbtree", "model": {{
                    "tree_info": {tree_info},
                    "trees": [{{
                        "left_children": [1, -1, -1],
                        "right_children": [2, -1, -1],
                        "split_indices": [0, 0, 0],
                        "split_conditions": [2.0, -1.0, 1.0],
                        "default_left": [0, 0, 0],
                        "sum_hessian": [2.0, 1.0, 1.0]{tree_extra}
                    }}]
                }}}},
                "learner_model_param": {{"base_score": "0", "num_feature": "1"{param_extra}}},
                "objective": {{"name": "reg:squarederror"}}
            }}
        }}"#
        )
    }

    fn load(json: &str) -> Result<TreeEnsemble, ModelError> {
        let file: XgbModelFile = serde_json::from_str(json).unwrap();
        TreeEnsemble::from_xgboost(file)
    }

    #[test]
    fn test_numerical_split_type_loads() {
        let json = one_split_model(r#", "split_type": [0, 0, 0]"#, r#", "num_target": "1""#, "[0]");
        let model = load(&json).unwrap();
        assert_eq!(model.predict_margin(&[1.0]).unwrap(), -1.0);
    }

    #[test]
    fn test_rejects_categorical_splits() {
        let json = one_split_model(
            r#", "split_type": [1, 0, 0], "categories": [3], "categories_nodes": [0]"#,
            "",
            "[0]",
        );
        assert!(matches!(load(&json), Err(ModelError::Unsupported(_))));
    }

    #[test]
    fn test_rejects_multiple_targets() {
        let json = one_split_model("", r#", "num_target": "2""#, "[0]");
        assert!(matches!(load(&json), Err(ModelError::Unsupported(_))));

        let json = one_split_model("", r#", "num_class": "3""#, "[0]");
        assert!(matches!(load(&json), Err(ModelError::Unsupported(_))));

        let json = one_split_model("", "", "[1]");
        assert!(matches!(load(&json), Err(ModelError::Unsupported(_))));
    }
}
