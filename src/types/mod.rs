//! Core types for the risk kernel.

pub mod node;
pub mod edge;
pub mod graph;
pub mod data;

pub use node::{Node, NodeId, NodeKind, Tag, Logic, LogicSlot, FICTIVE_PREFIX};
pub use edge::{Edge, EdgeTag};
pub use graph::{
    SystemGraph, GraphId, ModelValidationError,
    GraphDocument, NodeDocument, EdgeDocument,
};
pub use data::{RiskData, NodeData, EdgeData, DataValidationError};
