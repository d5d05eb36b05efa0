//! Node id generation for nodes the oracle left unnamed.

use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Source of fresh node ids.
///
/// Ids are content-free: they never depend on the node they are assigned to.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random `node_<hex>` ids backed by UUIDv4.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNodeIds;

impl IdGenerator for RandomNodeIds {
    fn next_id(&self) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("node_{}", &hex[..16])
    }
}

/// Deterministic `node_gen_<n>` ids, for tests and reproducible runs.
#[derive(Debug, Default)]
pub struct SequentialNodeIds {
    next: AtomicUsize,
}

impl SequentialNodeIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialNodeIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("node_gen_{n}")
    }
}
