//! The run state machine.
//!
//! ```text
//! batch_processing ──► summarizing ──► decomposing ──► storing ──► completed
//!        │                  │               │             │
//!        └──────────────────┴───────────────┴─────────────┴──────► failed
//! ```
//!
//! Every transition is written to the job status sink and reported to the
//! progress handlers. Stages return errors; only [`LearningPathPipeline`]
//! turns them into a failed [`LearningPathResult`].

use crate::batch::{create_batches, BatchSummarizer};
use crate::config::PipelineConfig;
use crate::decompose::KnowledgeDecomposer;
use crate::document::{LearningPathDocument, LearningPathResult};
use crate::error::{PipelineError, Result};
use crate::meta::MetaSummarizer;
use crate::rate_limit::{FixedDelay, RateLimiter};
use learnpath_dag::{BatchSummary, IdGenerator, KnowledgeDag, Material, RandomNodeIds};
use learnpath_llm::{CompressionAdapter, NoopCompressor, TextOracle};
use learnpath_storage::{
    JobProgress, JobStatus, JobStatusSink, KnowledgeNodeRow, LearningPathRow, MaterialRepository,
    PrerequisiteRow, ResultPersister,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// One status transition, as seen by progress handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: Option<JobProgress>,
}

pub type ProgressHandler = Box<dyn Fn(ProgressEvent) + Send + Sync>;

pub struct LearningPathPipeline {
    config: PipelineConfig,
    materials: Arc<dyn MaterialRepository>,
    oracle: Arc<dyn TextOracle>,
    compressor: Arc<dyn CompressionAdapter>,
    persister: Arc<dyn ResultPersister>,
    jobs: Arc<dyn JobStatusSink>,
    ids: Arc<dyn IdGenerator>,
    rate_limiter: Arc<dyn RateLimiter>,
    progress_handlers: Vec<ProgressHandler>,
}

impl LearningPathPipeline {
    /// Without further configuration the pipeline generates random node ids,
    /// never compresses, and sleeps `config.rate_limit_delay` between batches.
    pub fn new(
        config: PipelineConfig,
        materials: Arc<dyn MaterialRepository>,
        oracle: Arc<dyn TextOracle>,
        persister: Arc<dyn ResultPersister>,
        jobs: Arc<dyn JobStatusSink>,
    ) -> Self {
        let rate_limiter = Arc::new(FixedDelay::new(config.rate_limit_delay));
        Self {
            config,
            materials,
            oracle,
            compressor: Arc::new(NoopCompressor),
            persister,
            jobs,
            ids: Arc::new(RandomNodeIds),
            rate_limiter,
            progress_handlers: Vec::new(),
        }
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn CompressionAdapter>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Add a progress handler
    pub fn on_progress(&mut self, handler: ProgressHandler) {
        self.progress_handlers.push(handler);
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn create_learning_path(
        &self,
        user_id: &str,
        session_id: &str,
        job_id: &str,
    ) -> LearningPathResult {
        self.create_learning_path_with_cancellation(
            user_id,
            session_id,
            job_id,
            &CancellationToken::new(),
        )
        .await
    }

    /// Run the whole pipeline. Cancellation is checked before each batch and
    /// each stage, and interrupts the pause between batches; an oracle call
    /// already in flight runs to completion.
    pub async fn create_learning_path_with_cancellation(
        &self,
        user_id: &str,
        session_id: &str,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> LearningPathResult {
        let span = tracing::info_span!("learning_path", user_id, session_id, job_id);
        async {
            match self.run(user_id, session_id, job_id, cancel).await {
                Ok(result) => result,
                Err(PipelineError::NoMaterials) => {
                    tracing::warn!("no materials found, nothing to do");
                    LearningPathResult::failed(PipelineError::NoMaterials.to_string())
                }
                Err(err) => {
                    let message = err.to_string();
                    tracing::error!(error = %message, "learning path failed");
                    if let Err(status_err) = self
                        .set_status(job_id, JobStatus::Failed, None, Some(&message))
                        .await
                    {
                        tracing::warn!(error = %status_err, "could not record failed job status");
                    }
                    LearningPathResult::failed(message)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<LearningPathResult> {
        ensure_active(cancel)?;
        let materials = self.materials.fetch_materials(user_id, session_id).await?;
        if materials.is_empty() {
            return Err(PipelineError::NoMaterials);
        }

        let summaries = self.summarize_batches(&materials, job_id, cancel).await?;

        ensure_active(cancel)?;
        self.set_status(job_id, JobStatus::Summarizing, None, None).await?;
        let meta_summary = MetaSummarizer::new(self.compressor.as_ref(), &self.config)
            .condense(&summaries)
            .await?;

        ensure_active(cancel)?;
        self.set_status(job_id, JobStatus::Decomposing, None, None).await?;
        let graph = KnowledgeDecomposer::new(self.oracle.as_ref(), self.ids.as_ref(), &self.config)
            .decompose(&meta_summary, &summaries)
            .await?;
        let dag = KnowledgeDag::assemble(graph);
        for warning in &dag.metadata.validation.warnings {
            tracing::warn!(warning = %warning, "learning path validation");
        }

        ensure_active(cancel)?;
        self.set_status(job_id, JobStatus::Storing, None, None).await?;
        let result = self.store_results(user_id, session_id, dag, &summaries).await?;

        self.set_status(job_id, JobStatus::Completed, None, None).await?;
        tracing::info!(
            learning_path_id = result.learning_path_id.as_deref().unwrap_or_default(),
            total_nodes = result.total_nodes,
            max_depth = result.max_depth,
            "learning path completed"
        );
        Ok(result)
    }

    async fn summarize_batches(
        &self,
        materials: &[Material],
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<BatchSummary>> {
        let batches = create_batches(materials, self.config.batch_size);
        let total_batches = batches.len();
        tracing::info!(materials = materials.len(), total_batches, "summarizing materials");

        self.set_status(
            job_id,
            JobStatus::BatchProcessing,
            Some(JobProgress {
                batches_processed: 0,
                total_batches,
            }),
            None,
        )
        .await?;

        let summarizer = BatchSummarizer::new(self.oracle.as_ref(), &self.config);
        let mut summaries = Vec::with_capacity(total_batches);
        for (index, batch) in batches.iter().enumerate() {
            ensure_active(cancel)?;
            tracing::info!(batch = index + 1, total_batches, "processing batch");
            summaries.push(summarizer.summarize_batch(batch, index).await?);

            self.set_status(
                job_id,
                JobStatus::BatchProcessing,
                Some(JobProgress {
                    batches_processed: index + 1,
                    total_batches,
                }),
                None,
            )
            .await?;

            if index + 1 < total_batches {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    _ = self.rate_limiter.pause() => {}
                }
            }
        }
        Ok(summaries)
    }

    async fn store_results(
        &self,
        user_id: &str,
        session_id: &str,
        dag: KnowledgeDag,
        summaries: &[BatchSummary],
    ) -> Result<LearningPathResult> {
        let learning_path_id = Uuid::new_v4().to_string();
        let storage_path = self.config.storage_path(user_id, session_id);
        let document = LearningPathDocument::new(&learning_path_id, user_id, session_id, dag, summaries);
        let bytes = document.to_json_bytes()?;

        match self.persister.store_document(&storage_path, &bytes).await {
            Ok(()) => {}
            Err(err) if err.is_conflict() => {
                tracing::warn!(path = %storage_path, "document exists, replacing it");
                self.persister.delete_document(&storage_path).await?;
                self.persister.store_document(&storage_path, &bytes).await?;
            }
            Err(err) => return Err(err.into()),
        }

        self.persister
            .insert_learning_path(&LearningPathRow {
                id: learning_path_id.clone(),
                session_id: session_id.to_string(),
                user_id: user_id.to_string(),
                storage_path: storage_path.clone(),
                total_nodes: document.metadata.total_nodes,
                max_depth: document.metadata.max_depth,
            })
            .await?;

        let node_rows: Vec<KnowledgeNodeRow> = document
            .nodes
            .iter()
            .map(|node| KnowledgeNodeRow::from_node(node, session_id, &learning_path_id))
            .collect();
        self.persister.insert_knowledge_nodes(&node_rows).await?;

        let edge_rows: Vec<PrerequisiteRow> = document
            .edges
            .iter()
            .map(|edge| PrerequisiteRow::from_edge(edge, &learning_path_id))
            .collect();
        self.persister.insert_prerequisites(&edge_rows).await?;

        tracing::info!(
            path = %storage_path,
            nodes = node_rows.len(),
            edges = edge_rows.len(),
            "stored learning path"
        );
        Ok(LearningPathResult::completed(&document, &storage_path))
    }

    async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: Option<JobProgress>,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.jobs
            .update_job_status(job_id, status, progress, error_message)
            .await?;
        self.emit(ProgressEvent {
            job_id: job_id.to_string(),
            status,
            progress,
        });
        Ok(())
    }

    fn emit(&self, event: ProgressEvent) {
        for handler in &self.progress_handlers {
            handler(event.clone());
        }
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}
