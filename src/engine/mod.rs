//! Engine - the Node Store.
//!
//! Nodes are NOT referenced by pointer. They live in slots of one arena and
//! point at each other by [`NodeId`](crate::types::NodeId):
//!
//! ```text
//! Slot 0: Root (parent=None, children=[1, 2])
//! Slot 1: Text (parent=0,    key="title")
//! Slot 2: Box  (parent=0,    key=#1, children=[3])
//! Slot 3: Text (parent=2,    STAGED)   <- allocated by an in-flight pass
//! ```
//!
//! An interrupted render pass discards its staged slots without touching
//! anything committed, and ids of released slots never dangle because the
//! slot generation moves on.

mod node_store;

pub use node_store::*;
