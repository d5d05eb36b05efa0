//! Meta-summary: all batch summaries in one document, compressed when large.

use crate::config::PipelineConfig;
use learnpath_dag::{BatchSummary, KnowledgeClaim};
use learnpath_llm::CompressionAdapter;
use serde::Serialize;

#[derive(Serialize)]
struct MetaDocument<'a> {
    batch_count: usize,
    summaries: Vec<MetaEntry<'a>>,
}

#[derive(Serialize)]
struct MetaEntry<'a> {
    batch: usize,
    summary: &'a str,
    knowledge: &'a [KnowledgeClaim],
    domains: &'a [String],
}

pub struct MetaSummarizer<'a> {
    compressor: &'a dyn CompressionAdapter,
    threshold: usize,
    aggressiveness: f64,
}

impl<'a> MetaSummarizer<'a> {
    pub fn new(compressor: &'a dyn CompressionAdapter, config: &PipelineConfig) -> Self {
        Self {
            compressor,
            threshold: config.meta_compression_threshold,
            aggressiveness: config.meta_compression_aggressiveness,
        }
    }

    /// Pretty-printed JSON of every batch summary, in batch order.
    pub fn serialize(summaries: &[BatchSummary]) -> Result<String, serde_json::Error> {
        let document = MetaDocument {
            batch_count: summaries.len(),
            summaries: summaries
                .iter()
                .map(|s| MetaEntry {
                    batch: s.batch_index,
                    summary: &s.summary,
                    knowledge: &s.demonstrated_knowledge,
                    domains: &s.domain_expertise,
                })
                .collect(),
        };
        serde_json::to_string_pretty(&document)
    }

    /// Serialize and, above the threshold, compress. A failed compression
    /// keeps the uncompressed text.
    pub async fn condense(&self, summaries: &[BatchSummary]) -> Result<String, serde_json::Error> {
        let combined = Self::serialize(summaries)?;
        let chars = combined.chars().count();
        if chars <= self.threshold {
            tracing::debug!(chars, threshold = self.threshold, "meta-summary below compression threshold");
            return Ok(combined);
        }

        let outcome = self.compressor.compress(&combined, self.aggressiveness).await;
        if outcome.success {
            tracing::info!(
                chars,
                ratio = outcome.ratio,
                original_tokens = outcome.original_tokens,
                compressed_tokens = outcome.compressed_tokens,
                "compressed meta-summary"
            );
            Ok(outcome.compressed_text)
        } else {
            tracing::warn!(
                chars,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "meta-summary compression failed, using uncompressed text"
            );
            Ok(combined)
        }
    }
}
