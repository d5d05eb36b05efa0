//! Prompt templates.
//!
//! The instruction bodies live in `prompts/*.md` so they can be edited
//! without touching code.

const BATCH_SUMMARY_INSTRUCTIONS: &str = include_str!("../prompts/batch_summary.md");
const DECOMPOSITION_INSTRUCTIONS: &str = include_str!("../prompts/knowledge_decomposition.md");

const JSON_ONLY: &str = "Return ONLY valid JSON with no markdown formatting or code blocks.";

pub fn batch_prompt(documents_json: &str) -> String {
    format!(
        "You are analyzing a batch of academic documents. Follow these instructions:\n\n\
         {BATCH_SUMMARY_INSTRUCTIONS}\n\n\
         Here are the documents to analyze:\n\n\
         {documents_json}\n\n\
         {JSON_ONLY}"
    )
}

/// Inputs of the decomposition prompt, already serialized.
pub struct DecompositionPromptParts<'a> {
    pub meta_summary: &'a str,
    pub demonstrated_knowledge_json: &'a str,
    pub material_ids_json: &'a str,
    pub min_nodes: usize,
    pub max_nodes: usize,
}

pub fn decomposition_prompt(parts: &DecompositionPromptParts<'_>) -> String {
    format!(
        "You are decomposing a researcher's knowledge into a prerequisite DAG with TRUE \
         PEDAGOGICAL prerequisites. Follow these instructions:\n\n\
         {DECOMPOSITION_INSTRUCTIONS}\n\n\
         Here is the meta-summary of their academic work:\n\n\
         {meta}\n\n\
         Demonstrated knowledge from their materials:\n\
         {knowledge}\n\n\
         Available source material IDs for reference: {ids}\n\n\
         CRITICAL REQUIREMENTS:\n\
         1. Prerequisites must be TRUE pedagogical dependencies (Calculus before Gradient Descent)\n\
         2. Every prerequisite relationship needs a 'reasoning' field explaining WHY\n\
         3. Use relationship types: 'requires' (strict), 'builds_on' (soft), 'related' (no dependency)\n\
         4. Ensure the graph is ACYCLIC - no circular dependencies\n\
         5. Generate {min}-{max} nodes with >50% 'requires' relationships\n\n\
         {JSON_ONLY}",
        meta = parts.meta_summary,
        knowledge = parts.demonstrated_knowledge_json,
        ids = parts.material_ids_json,
        min = parts.min_nodes,
        max = parts.max_nodes,
    )
}
