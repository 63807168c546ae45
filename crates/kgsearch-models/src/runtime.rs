//! Per-call runtime records that live only for the duration of one
//! `search` invocation (§3.3, §3.5).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An entity retained at some point in the Recall/Expand pipeline, carrying
/// the accumulated weight and the hop indices at which it was touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedEntity {
    pub entity_id: Uuid,
    pub name: String,
    pub entity_type: String,
    /// Always `> 0` for an entity retained at any stage exit (§3.4.3).
    pub weight: f32,
    /// Hop indices at which this entity was first/last touched, e.g. `[1]`
    /// for pure recall, `[1, 2]` for recall-then-expanded, `[2]` for an
    /// entity discovered only during expansion.
    pub steps: Vec<u32>,
}

impl WeightedEntity {
    pub fn new_from_recall(entity_id: Uuid, name: String, entity_type: String, weight: f32) -> Self {
        Self {
            entity_id,
            name,
            entity_type,
            weight,
            steps: vec![1],
        }
    }

    /// Mean hop index, used by the PageRank initial-weight formula (§4.7
    /// step 2) to damp entities discovered in later hops.
    pub fn avg_step(&self) -> f32 {
        if self.steps.is_empty() {
            return 1.0;
        }
        self.steps.iter().sum::<u32>() as f32 / self.steps.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_step_damps_later_hop_discoveries() {
        let recall_only = WeightedEntity::new_from_recall(Uuid::new_v4(), "a".into(), "t".into(), 1.0);
        assert!((recall_only.avg_step() - 1.0).abs() < f32::EPSILON);

        let mut touched_twice = recall_only.clone();
        touched_twice.steps.push(2);
        assert!((touched_twice.avg_step() - 1.5).abs() < f32::EPSILON);
    }
}
