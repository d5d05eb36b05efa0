//! Integration tests for the complete learning-path pipeline
//!
//! These tests drive full runs across crates:
//! - materials → batch summaries → meta-summary → decomposition → stored DAG
//! - in-memory and directory-backed stores
//! - oracle failures surfacing as failed jobs
//!
//! Run with: cargo test --test integration_tests

use approx::assert_relative_eq;
use learnpath_dag::{validate, Relationship, SequentialNodeIds};
use learnpath_llm::{OracleError, ScriptedOracle, StaticCompressor};
use learnpath_pipeline::{LearningPathDocument, LearningPathPipeline, PipelineConfig};
use learnpath_storage::{
    FsStore, GoogleDocRecord, InMemoryStore, JobStatus, KnowledgeNodeRow, LearningPathRow,
    MaterialRecord, PrerequisiteRow, KNOWLEDGE_NODES_TABLE, LEARNING_PATHS_TABLE,
    PREREQUISITES_TABLE,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const USER: &str = "7";
const SESSION: &str = "fall-2024";
const DOCUMENT_PATH: &str = "7/fall-2024/learning_path.json";
const DECOMPOSITION_MARKER: &str = "decomposing a researcher's knowledge";

fn config(batch_size: usize) -> PipelineConfig {
    PipelineConfig {
        batch_size,
        rate_limit_delay: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

fn material(i: usize) -> MaterialRecord {
    MaterialRecord {
        id: format!("mat-{i:02}"),
        title: Some(format!("Lecture notes {i}")),
        material_type: Some("course".into()),
        compressed_text: Some(format!("Compressed notes on spectral graph theory, part {i}.")),
        original_text: Some(format!("Full notes on spectral graph theory, part {i}.")),
        notes: None,
    }
}

fn batch_reply() -> String {
    json!({
        "summary": "Coursework on graph spectra and linear algebra.",
        "demonstrated_knowledge": [
            {"concept": "Eigenvalues", "evidence": "computes Laplacian spectra"},
            {"concept": "Graph Laplacian", "evidence": "derives Cheeger bounds"}
        ],
        "domain_expertise": ["Spectral graph theory", "Linear algebra"]
    })
    .to_string()
}

/// A chain where node `k` depends on node `k - 1` for the first `edges`
/// nodes; the first `requires` of those edges are `requires`.
fn chain_graph(total_nodes: usize, edges: usize, requires: usize) -> String {
    let nodes: Vec<Value> = (0..total_nodes)
        .map(|k| {
            let prerequisites: Vec<Value> = if (1..=edges).contains(&k) {
                let relationship = if k <= requires { "requires" } else { "builds_on" };
                vec![json!({
                    "node_id": format!("k{}", k - 1),
                    "relationship": relationship,
                    "reasoning": "uses the previous result directly",
                })]
            } else {
                Vec::new()
            };
            json!({
                "id": format!("k{k}"),
                "label": format!("Topic {k}"),
                "type": "concept",
                "depth": k,
                "mastery_likelihood": 0.3,
                "source_material_ids": ["mat-00"],
                "prerequisites": prerequisites,
            })
        })
        .collect();
    json!({ "nodes": nodes }).to_string()
}

fn routing_oracle<F>(decomposition: F) -> Arc<ScriptedOracle>
where
    F: Fn() -> Result<String, OracleError> + Send + Sync + 'static,
{
    let batch = batch_reply();
    Arc::new(ScriptedOracle::responder(move |prompt| {
        if prompt.contains(DECOMPOSITION_MARKER) {
            decomposition()
        } else {
            Ok(batch.clone())
        }
    }))
}

// ============================================================================
// In-memory runs
// ============================================================================

#[tokio::test]
async fn test_twelve_materials_end_to_end() {
    let store = Arc::new(InMemoryStore::new());
    for i in 0..12 {
        store.add_material(USER, SESSION, material(i));
    }
    let oracle = routing_oracle(move || Ok(chain_graph(45, 40, 24)));
    let compressor = Arc::new(StaticCompressor::replacing("unused", 0.5));

    let result = LearningPathPipeline::new(
        config(5),
        store.clone(),
        oracle.clone(),
        store.clone(),
        store.clone(),
    )
    .with_compressor(compressor.clone())
    .with_id_generator(Arc::new(SequentialNodeIds::new()))
    .create_learning_path(USER, SESSION, "job-e2e")
    .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.total_nodes, 45);
    assert_eq!(result.storage_path.as_deref(), Some(DOCUMENT_PATH));

    // 3 batches (5, 5, 2) plus one decomposition call; the meta-summary is
    // far below the compression threshold
    assert_eq!(oracle.call_count(), 4);
    assert_eq!(compressor.call_count(), 0);

    let document = LearningPathDocument::from_json_bytes(&store.document(DOCUMENT_PATH).unwrap())
        .unwrap();
    let sizes: Vec<usize> = document
        .batch_summaries
        .iter()
        .map(|b| b.material_ids.len())
        .collect();
    assert_eq!(sizes, vec![5, 5, 2]);
    assert!(document.metadata.validation.valid);
    assert!(document.metadata.validation.warnings.is_empty());

    let requires = document
        .edges
        .iter()
        .filter(|e| e.relationship == Relationship::Requires)
        .count();
    assert_relative_eq!(
        requires as f64 / document.edges.len() as f64,
        0.6,
        epsilon = 1e-9
    );
    assert_eq!(result.relationship_distribution["requires"], requires);

    // batch prompts carry the compressed text, never the original
    let prompts = oracle.prompts();
    assert!(prompts[0].contains("Compressed notes on spectral graph theory, part 0."));
    assert!(!prompts[0].contains("Full notes"));

    let job = store.job("job-e2e").unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error_message.is_none());
}

#[tokio::test]
async fn test_decomposition_timeout_fails_job() {
    let store = Arc::new(InMemoryStore::new());
    for i in 0..4 {
        store.add_material(USER, SESSION, material(i));
    }
    let oracle = routing_oracle(|| {
        Err(OracleError::Timeout {
            after: Duration::from_secs(120),
        })
    });

    let result = LearningPathPipeline::new(config(5), store.clone(), oracle, store.clone(), store.clone())
        .create_learning_path(USER, SESSION, "job-timeout")
        .await;

    assert!(!result.success);
    assert!(result.learning_path_id.is_none());
    let error = result.error.unwrap();
    assert!(error.contains("timed out"), "{error}");

    let job = store.job("job-timeout").unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(error.as_str()));
    assert!(job.completed_at.is_none());
    assert!(store.document(DOCUMENT_PATH).is_none());
}

#[tokio::test]
async fn test_google_docs_join_the_material_list() {
    let store = Arc::new(InMemoryStore::new());
    store.add_material(USER, SESSION, material(0));
    store.add_google_doc(
        USER,
        SESSION,
        GoogleDocRecord {
            id: "gdoc-1".into(),
            title: None,
            content_snippet: Some("Draft of a survey on expander graphs.".into()),
        },
    );
    let oracle = routing_oracle(move || Ok(chain_graph(3, 2, 1)));

    let result = LearningPathPipeline::new(config(5), store.clone(), oracle.clone(), store.clone(), store.clone())
        .create_learning_path(USER, SESSION, "job-gdoc")
        .await;

    assert!(result.success, "{:?}", result.error);
    let batch_prompt = &oracle.prompts()[0];
    assert!(batch_prompt.contains("Draft of a survey on expander graphs."));
    assert!(batch_prompt.contains("Google Doc"));
}

// ============================================================================
// Directory-backed runs
// ============================================================================

#[tokio::test]
async fn test_fs_store_run_writes_document_tables_and_job() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FsStore::new(dir.path()));

    let materials_dir = store.materials_dir(USER, SESSION).unwrap();
    std::fs::create_dir_all(&materials_dir).unwrap();
    for i in 0..6 {
        std::fs::write(
            materials_dir.join(format!("{i:02}.json")),
            serde_json::to_vec(&material(i)).unwrap(),
        )
        .unwrap();
    }

    let oracle = routing_oracle(move || Ok(chain_graph(8, 7, 4)));
    let pipeline = LearningPathPipeline::new(
        config(4),
        store.clone(),
        oracle,
        store.clone(),
        store.clone(),
    )
    .with_id_generator(Arc::new(SequentialNodeIds::new()));

    let first = pipeline.create_learning_path(USER, SESSION, "job-fs").await;
    assert!(first.success, "{:?}", first.error);

    // a second run replaces the write-once document
    let second = pipeline.create_learning_path(USER, SESSION, "job-fs-2").await;
    assert!(second.success, "{:?}", second.error);
    assert_ne!(first.learning_path_id, second.learning_path_id);

    let bytes = store.read_document(DOCUMENT_PATH).await.unwrap();
    let document = LearningPathDocument::from_json_bytes(&bytes).unwrap();
    assert_eq!(Some(document.learning_path_id.clone()), second.learning_path_id);
    assert_eq!(document.nodes.len(), 8);
    assert!(validate(&document.nodes).valid);

    let paths: Vec<LearningPathRow> = store.read_table(LEARNING_PATHS_TABLE).await.unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[1].storage_path, DOCUMENT_PATH);

    let nodes: Vec<KnowledgeNodeRow> = store.read_table(KNOWLEDGE_NODES_TABLE).await.unwrap();
    assert_eq!(nodes.len(), 16);
    let prerequisites: Vec<PrerequisiteRow> =
        store.read_table(PREREQUISITES_TABLE).await.unwrap();
    assert_eq!(prerequisites.len(), 14);

    let job = store.job("job-fs").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let progress = job.progress.unwrap();
    assert_eq!((progress.batches_processed, progress.total_batches), (2, 2));
}

#[tokio::test]
async fn test_fs_store_without_materials_reports_failure() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FsStore::new(dir.path()));
    let oracle = routing_oracle(move || Ok(chain_graph(2, 1, 1)));

    let result = LearningPathPipeline::new(config(5), store.clone(), oracle.clone(), store.clone(), store.clone())
        .create_learning_path(USER, SESSION, "job-empty")
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("No materials found for this session"));
    assert_eq!(oracle.call_count(), 0);
    assert!(store.job("job-empty").await.unwrap().is_none());
}
