//! Model representation: trees and the ensemble.

mod forest;
mod tree;

pub use forest::{Forest, ForestError};
pub use tree::{NodeStats, Tree, TreeArrays, TreeError};
