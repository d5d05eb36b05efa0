//! Learnpath Pipeline: from a session's materials to a stored learning path
//!
//! ```text
//! ┌───────────┐   ┌────────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ materials │──►│ batch summaries│──►│ meta-summary │──►│ decomposition │
//! │ (repo)    │   │ 1 call / batch │   │ (compressed) │   │ 1 call        │
//! └───────────┘   └────────────────┘   └──────────────┘   └───────┬───────┘
//!                                                                 │
//!                 ┌────────────────┐   ┌──────────────┐           │
//!                 │  document +    │◄──│ validation + │◄──────────┘
//!                 │  rows stored   │   │ edge flatten │
//!                 └────────────────┘   └──────────────┘
//! ```
//!
//! Stages run strictly one after another and oracle calls are never
//! concurrent within a run. Independent runs share nothing but the injected
//! collaborators.

pub mod batch;
pub mod config;
pub mod decompose;
pub mod document;
pub mod error;
pub mod meta;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod rate_limit;

pub use batch::{create_batches, BatchSummarizer};
pub use config::PipelineConfig;
pub use decompose::KnowledgeDecomposer;
pub use document::{BatchDigest, LearningPathDocument, LearningPathResult, DOCUMENT_VERSION};
pub use error::PipelineError;
pub use meta::MetaSummarizer;
pub use oracle::ask_json;
pub use orchestrator::{LearningPathPipeline, ProgressEvent, ProgressHandler};
pub use rate_limit::{FixedDelay, RateLimiter};
