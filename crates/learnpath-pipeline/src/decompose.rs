//! Knowledge decomposition: one oracle call that proposes the concept graph.
//!
//! Nothing the prompt asks for (acyclicity, node count, edge mix) is enforced
//! here. The reply is ingested as-is and judged by the validator.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::oracle::ask_json;
use crate::prompts::{decomposition_prompt, DecompositionPromptParts};
use learnpath_dag::{ingest_oracle_graph, BatchSummary, IdGenerator, IngestedGraph, KnowledgeClaim};
use learnpath_llm::TextOracle;
use serde_json::Value;
use std::time::Duration;

pub struct KnowledgeDecomposer<'a> {
    oracle: &'a dyn TextOracle,
    ids: &'a dyn IdGenerator,
    knowledge_cap: usize,
    min_nodes: usize,
    max_nodes: usize,
    timeout: Duration,
}

impl<'a> KnowledgeDecomposer<'a> {
    pub fn new(oracle: &'a dyn TextOracle, ids: &'a dyn IdGenerator, config: &PipelineConfig) -> Self {
        Self {
            oracle,
            ids,
            knowledge_cap: config.demonstrated_knowledge_prompt_cap,
            min_nodes: config.min_nodes,
            max_nodes: config.max_nodes,
            timeout: config.decomposition_call_timeout,
        }
    }

    /// Only the first `knowledge_cap` claims across all batches are quoted;
    /// every material id is listed.
    pub fn prompt(&self, meta_summary: &str, summaries: &[BatchSummary]) -> Result<String> {
        let claims: Vec<&KnowledgeClaim> = summaries
            .iter()
            .flat_map(|s| s.demonstrated_knowledge.iter())
            .take(self.knowledge_cap)
            .collect();
        let material_ids: Vec<&str> = summaries
            .iter()
            .flat_map(|s| s.material_ids.iter().map(String::as_str))
            .collect();

        let demonstrated_knowledge_json = serde_json::to_string_pretty(&claims)?;
        let material_ids_json = serde_json::to_string(&material_ids)?;

        Ok(decomposition_prompt(&DecompositionPromptParts {
            meta_summary,
            demonstrated_knowledge_json: &demonstrated_knowledge_json,
            material_ids_json: &material_ids_json,
            min_nodes: self.min_nodes,
            max_nodes: self.max_nodes,
        }))
    }

    pub async fn decompose(
        &self,
        meta_summary: &str,
        summaries: &[BatchSummary],
    ) -> Result<IngestedGraph> {
        let prompt = self.prompt(meta_summary, summaries)?;
        let payload: Value = ask_json(self.oracle, prompt, self.timeout).await?;
        let graph = ingest_oracle_graph(&payload, self.ids)?;
        tracing::info!(
            nodes = graph.nodes.len(),
            duplicate_ids = graph.duplicate_ids.len(),
            skipped_entries = graph.skipped_entries,
            skipped_prerequisites = graph.skipped_prerequisites,
            "ingested oracle graph"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use learnpath_dag::SequentialNodeIds;
    use learnpath_llm::{OracleError, ScriptedOracle};

    fn summaries(batches: usize, claims_per_batch: usize) -> Vec<BatchSummary> {
        (0..batches)
            .map(|b| BatchSummary {
                batch_index: b,
                material_ids: vec![format!("mat-{b}")],
                summary: String::new(),
                demonstrated_knowledge: (0..claims_per_batch)
                    .map(|c| KnowledgeClaim::new(format!("concept-{b}-{c}"), ""))
                    .collect(),
                domain_expertise: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn prompt_caps_quoted_knowledge() {
        let oracle = ScriptedOracle::default();
        let ids = SequentialNodeIds::default();
        let config = PipelineConfig::default();
        let prompt = KnowledgeDecomposer::new(&oracle, &ids, &config)
            .prompt("META", &summaries(3, 10))
            .unwrap();

        assert!(prompt.contains("META"));
        assert!(prompt.contains("concept-1-9"));
        assert!(!prompt.contains("concept-2-0"));
        assert!(prompt.contains(r#"["mat-0","mat-1","mat-2"]"#));
        assert!(prompt.contains("Generate 40-80 nodes"));
    }

    #[tokio::test]
    async fn ids_are_generated_and_prerequisites_normalized() {
        let oracle = ScriptedOracle::new([r#"Here is the graph:
            {"nodes": [
                {"id": "a", "label": "Limits", "depth": 0},
                {"label": "Derivatives", "depth": 1, "prerequisites": ["a"]}
            ]}"#]);
        let ids = SequentialNodeIds::default();
        let config = PipelineConfig::default();

        let graph = KnowledgeDecomposer::new(&oracle, &ids, &config)
            .decompose("meta", &summaries(1, 1))
            .await
            .unwrap();

        assert_eq!(graph.nodes.len(), 2);
        let derived = &graph.nodes.as_slice()[1];
        assert!(derived.id.starts_with("node_"));
        assert!(derived.source_material_ids.is_empty());
        assert_eq!(derived.prerequisites[0].node_id, "a");
        assert!(derived.prerequisites[0].relationship.is_requires());
    }

    #[tokio::test]
    async fn missing_nodes_key_is_an_empty_graph() {
        let oracle = ScriptedOracle::new([r#"{"concepts": []}"#]);
        let ids = SequentialNodeIds::default();
        let config = PipelineConfig::default();
        let graph = KnowledgeDecomposer::new(&oracle, &ids, &config)
            .decompose("meta", &[])
            .await
            .unwrap();
        assert!(graph.nodes.is_empty());
    }

    #[tokio::test]
    async fn garbage_reply_is_fatal() {
        let oracle = ScriptedOracle::new(["I'd rather not."]);
        let ids = SequentialNodeIds::default();
        let config = PipelineConfig::default();
        let err = KnowledgeDecomposer::new(&oracle, &ids, &config)
            .decompose("meta", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Oracle(OracleError::MalformedPayload(_))
        ));
    }
}
