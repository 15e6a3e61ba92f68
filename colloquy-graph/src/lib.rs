#![deny(missing_docs)]
//! Pipeline graph construction for colloquy.
//!
//! [`GraphBuilder::build`] turns the registered [`ServiceDescriptor`]s into
//! one [`PipelineGraph`] per domain (domain-agnostic services are part of
//! every domain's graph) and a [`ConsistencyReport`] describing structural
//! defects. The check runs once, before any turn; an inconsistent report
//! does not prevent execution, it has to be surfaced to the operator.
//!
//! [`GraphDescription`] is the read-only introspection view used for
//! drawing the system graph.
//!
//! [`ServiceDescriptor`]: colloquy_core::ServiceDescriptor

mod builder;
mod render;
mod report;

pub use builder::{GraphBuilder, GraphScope, PipelineGraph, PipelineGraphs};
pub use render::{EdgeDescription, EdgeKind, GraphDescription, NodeDescription, NodeKind, ScopedGraph};
pub use report::{ConsistencyReport, Defect, Note};
