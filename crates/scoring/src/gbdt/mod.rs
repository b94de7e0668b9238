//! Gradient Boosted Decision Tree inference
//!
//! Trees are serialized as flat node lists inside the pipeline artifact:
//!
//! ```json
//! {
//!   "base_margin": -1.02,
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"feature_idx":3,"id":0,"leaf":null,"left":1,"right":2,"threshold":-0.41},
//!         {"feature_idx":-1,"id":1,"leaf":0.031,"left":-1,"right":-1,"threshold":0.0},
//!         {"feature_idx":-1,"id":2,"leaf":-0.018,"left":-1,"right":-1,"threshold":0.0}
//!       ]
//!     }
//!   ],
//!   "version": 1
//! }
//! ```

pub mod model;
pub mod tree;

pub use model::{logit, sigmoid, Model, MODEL_VERSION};
pub use tree::{Node, Tree};
