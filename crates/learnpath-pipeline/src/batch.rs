//! Batch summarization: one oracle call per fixed-size slice of materials.

use crate::config::PipelineConfig;
use crate::oracle::ask_json;
use crate::prompts;
use learnpath_dag::{value_text, BatchSummary, KnowledgeClaim, Material};
use learnpath_llm::{OracleError, TextOracle};
use serde_json::{json, Value};
use std::time::Duration;

/// Consecutive slices of at most `batch_size` materials, in input order.
pub fn create_batches(materials: &[Material], batch_size: usize) -> Vec<&[Material]> {
    materials.chunks(batch_size.max(1)).collect()
}

/// Elements of a list-valued reply field; a lone value counts as one element.
fn reply_list(reply: &mut Value, key: &str) -> Vec<Value> {
    match reply.get_mut(key).map(Value::take) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
    }
}

pub struct BatchSummarizer<'a> {
    oracle: &'a dyn TextOracle,
    content_prefix_chars: usize,
    timeout: Duration,
}

impl<'a> BatchSummarizer<'a> {
    pub fn new(oracle: &'a dyn TextOracle, config: &PipelineConfig) -> Self {
        Self {
            oracle,
            content_prefix_chars: config.content_prefix_chars,
            timeout: config.batch_call_timeout,
        }
    }

    /// Prompt for one batch. Each material's content is cut to its first
    /// `content_prefix_chars` characters.
    pub fn prompt(&self, batch: &[Material]) -> String {
        let documents: Vec<Value> = batch
            .iter()
            .map(|m| {
                json!({
                    "id": m.id,
                    "title": m.title,
                    "type": m.material_type.as_str(),
                    "content": m.content.chars().take(self.content_prefix_chars).collect::<String>(),
                })
            })
            .collect();
        let documents = format!("{:#}", json!({ "documents": documents }));
        prompts::batch_prompt(&documents)
    }

    pub async fn summarize_batch(
        &self,
        batch: &[Material],
        batch_index: usize,
    ) -> Result<BatchSummary, OracleError> {
        let mut reply: Value = ask_json(self.oracle, self.prompt(batch), self.timeout).await?;

        let summary = reply
            .get("summary")
            .and_then(|v| value_text(v, "\n\n"))
            .unwrap_or_default();
        let demonstrated_knowledge =
            KnowledgeClaim::from_values(reply_list(&mut reply, "demonstrated_knowledge"));
        let domain_expertise = reply_list(&mut reply, "domain_expertise")
            .into_iter()
            .filter_map(|domain| match domain {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect();

        Ok(BatchSummary {
            batch_index,
            material_ids: batch.iter().map(|m| m.id.clone()).collect(),
            summary,
            demonstrated_knowledge,
            domain_expertise,
        })
    }
}
