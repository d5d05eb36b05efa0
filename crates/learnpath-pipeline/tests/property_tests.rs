//! Property-based tests for batching.

use learnpath_dag::{Material, MaterialType};
use learnpath_pipeline::create_batches;
use proptest::prelude::*;

fn materials(count: usize) -> Vec<Material> {
    (0..count)
        .map(|i| Material {
            id: format!("m{i}"),
            title: String::new(),
            material_type: MaterialType::Other,
            content: i.to_string(),
            notes: None,
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_batch_count_is_ceiling(count in 0usize..200, batch_size in 1usize..20) {
        let materials = materials(count);
        let batches = create_batches(&materials, batch_size);
        prop_assert_eq!(batches.len(), count.div_ceil(batch_size));
    }

    #[test]
    fn prop_batches_are_bounded_and_reconstruct_input(count in 0usize..200, batch_size in 1usize..20) {
        let materials = materials(count);
        let batches = create_batches(&materials, batch_size);

        prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= batch_size));
        // only the last batch may be short
        if let Some((_, full)) = batches.split_last() {
            prop_assert!(full.iter().all(|b| b.len() == batch_size));
        }

        let rebuilt: Vec<&str> = batches.iter().flat_map(|b| b.iter().map(|m| m.id.as_str())).collect();
        let original: Vec<&str> = materials.iter().map(|m| m.id.as_str()).collect();
        prop_assert_eq!(rebuilt, original);
    }
}
