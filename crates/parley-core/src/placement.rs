//! All-or-nothing accelerator placement of model parameters.
//!
//! The whole parameter set moves to the accelerator only when its total size
//! fits the memory budget. There is no tensor-by-tensor packing: either every
//! leaf is relocated or none is. A relocation failure after the size check
//! passed leaves the model split across devices and is reported as
//! [`PlacementError::PartialRelocation`], which callers treat as fatal.

use std::collections::BTreeMap;

use parley_types::error::PlacementError;
use parley_types::model::{Device, ParamPath, ParamTree};

use crate::model::ParameterHost;

/// Final location of every parameter tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementMap {
    pub placements: BTreeMap<ParamPath, Device>,
    pub total_bytes: u64,
    pub budget: u64,
    /// Whether the parameter set was moved to the accelerator.
    pub relocated: bool,
}

impl PlacementMap {
    pub fn count_on(&self, device: Device) -> usize {
        self.placements.values().filter(|d| **d == device).count()
    }
}

/// Place `tree` on the accelerator if the entire set fits `budget`.
///
/// Without an accelerator nothing moves regardless of budget.
pub async fn assign<H: ParameterHost>(
    host: &H,
    tree: &ParamTree,
    budget: u64,
    accelerator_present: bool,
) -> Result<PlacementMap, PlacementError> {
    let total_bytes = tree.total_bytes();

    let mut leaves = Vec::with_capacity(tree.leaf_count());
    tree.visit_leaves(&mut |path, tensor| leaves.push((path.clone(), tensor.device)));

    let fits = accelerator_present && total_bytes <= budget;
    if !fits {
        tracing::info!(
            total_bytes,
            budget,
            accelerator_present,
            leaves = leaves.len(),
            "parameters stay on host"
        );
        return Ok(PlacementMap {
            placements: leaves.into_iter().collect(),
            total_bytes,
            budget,
            relocated: false,
        });
    }

    let mut placements = BTreeMap::new();
    let mut moved = 0usize;
    for (path, device) in leaves {
        if device != Device::Accelerator {
            host.relocate(&path, Device::Accelerator)
                .await
                .map_err(|reason| PlacementError::PartialRelocation {
                    path: path.clone(),
                    moved,
                    reason,
                })?;
            moved += 1;
        }
        placements.insert(path, Device::Accelerator);
    }

    tracing::info!(total_bytes, budget, moved, "parameters relocated to accelerator");
    Ok(PlacementMap {
        placements,
        total_bytes,
        budget,
        relocated: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeParameterHost;

    fn tree() -> ParamTree {
        // 3 leaves: 20 + 8 + 8 = 36 bytes.
        ParamTree::group([
            ("emb", ParamTree::leaf(10, 2, Device::Host)),
            (
                "blocks",
                ParamTree::group([
                    ("0", ParamTree::leaf(4, 2, Device::Host)),
                    ("1", ParamTree::leaf(4, 2, Device::Host)),
                ]),
            ),
        ])
    }

    #[tokio::test]
    async fn over_budget_moves_nothing() {
        let host = FakeParameterHost::new(tree());
        let map = assign(&host, &tree(), 35, true).await.unwrap();

        assert!(!map.relocated);
        assert_eq!(map.total_bytes, 36);
        assert_eq!(map.count_on(Device::Host), 3);
        assert_eq!(map.count_on(Device::Accelerator), 0);
        assert!(host.relocations().is_empty());
    }

    #[tokio::test]
    async fn within_budget_moves_everything() {
        let host = FakeParameterHost::new(tree());
        let map = assign(&host, &tree(), 36, true).await.unwrap();

        assert!(map.relocated);
        assert_eq!(map.count_on(Device::Accelerator), 3);
        assert_eq!(map.count_on(Device::Host), 0);
        assert_eq!(
            host.relocations(),
            vec![
                ParamPath::from("blocks.0"),
                ParamPath::from("blocks.1"),
                ParamPath::from("emb"),
            ]
        );
    }

    #[tokio::test]
    async fn outcome_is_never_mixed() {
        for budget in [0u64, 10, 35, 36, 37, 1_000] {
            let host = FakeParameterHost::new(tree());
            let map = assign(&host, &tree(), budget, true).await.unwrap();
            let on_accel = map.count_on(Device::Accelerator);
            assert!(on_accel == 0 || on_accel == 3, "mixed placement at budget {budget}");
            assert_eq!(map.relocated, budget >= 36);
        }
    }

    #[tokio::test]
    async fn no_accelerator_never_relocates() {
        let host = FakeParameterHost::new(tree());
        let map = assign(&host, &tree(), u64::MAX, false).await.unwrap();
        assert!(!map.relocated);
        assert!(host.relocations().is_empty());
    }

    #[tokio::test]
    async fn failure_midway_is_partial_relocation() {
        let host = FakeParameterHost::new(tree()).failing_at(ParamPath::from("blocks.1"));
        let err = assign(&host, &tree(), 1_000, true).await.unwrap_err();

        match err {
            PlacementError::PartialRelocation { path, moved, .. } => {
                assert_eq!(path, ParamPath::from("blocks.1"));
                assert_eq!(moved, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
