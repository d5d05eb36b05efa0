//! Learnpath DAG: the knowledge graph behind a learning path
//!
//! This crate is the pure, I/O-free core of the learning-path pipeline. It owns
//! the data model and every deterministic check applied to the (untrusted)
//! graph proposed by the text-generation oracle.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     ORACLE GRAPH → KNOWLEDGE DAG                     │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  oracle JSON ──► ingest ──► normalize ──► validate ──► flatten       │
//! │  {"nodes":[..]}   ids        legacy/typed   cycles      edges[]      │
//! │                   defaults   → canonical    dangling    metadata     │
//! │                              edges          depth                    │
//! │                                             ratios                   │
//! │                                             reasoning                │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - Node ids are unique within a [`NodeSet`].
//! - Prerequisites are carried on the *dependent* node and point at the
//!   prerequisite's id; after ingestion every edge is a [`PrerequisiteEdge`].
//! - Graph-quality problems never fail ingestion: they surface as warnings in
//!   [`ValidationReport`].

pub mod error;
pub mod graph;
pub mod ids;
pub mod model;
pub mod normalize;
pub mod validate;

pub use error::DagError;
pub use graph::{
    build_edges, ingest_oracle_graph, DagMetadata, FlatEdge, IngestedGraph, KnowledgeDag,
    NodeSet,
};
pub use ids::{IdGenerator, RandomNodeIds, SequentialNodeIds};
pub use model::{
    BatchSummary, ConceptNode, KnowledgeClaim, Material, MaterialType, PrerequisiteEdge,
    Relationship,
};
pub use normalize::{
    normalize_prerequisites, value_text, RawPrerequisite, TypedPrerequisite, DEFAULT_REASONING,
    LEGACY_REASONING,
};
pub use validate::{validate, ValidationReport};
