//! JSON artifact layout.
//!
//! A versioned envelope around the model metadata, the training
//! configuration, and raw tree arrays. Trees are re-validated on load.

use serde::{Deserialize, Serialize};

use crate::model::{ModelMeta, RankerConfig, RankingModel};
use crate::repr::{Forest, Tree, TreeArrays};

use super::PersistError;

/// Bumped whenever the layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSchema {
    pub format_version: u32,
    pub meta: ModelMeta,
    pub config: RankerConfig,
    pub base_score: f64,
    pub trees: Vec<TreeArrays>,
}

impl From<&RankingModel> for ModelSchema {
    fn from(model: &RankingModel) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            meta: model.meta().clone(),
            config: model.config().clone(),
            base_score: model.forest().base_score(),
            trees: model
                .forest()
                .trees()
                .iter()
                .map(|t| t.arrays().clone())
                .collect(),
        }
    }
}

impl TryFrom<ModelSchema> for RankingModel {
    type Error = PersistError;

    fn try_from(schema: ModelSchema) -> Result<Self, Self::Error> {
        if schema.format_version != FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion(schema.format_version));
        }
        let mut forest = Forest::new(schema.base_score);
        for (tree_idx, arrays) in schema.trees.into_iter().enumerate() {
            let tree = Tree::from_arrays(arrays)
                .map_err(|error| crate::repr::ForestError::InvalidTree { tree_idx, error })?;
            forest.push_tree(tree);
        }
        Ok(RankingModel::from_parts(forest, schema.meta, schema.config)?)
    }
}
