//! Startup model selection from the memory budget.

use parley_types::model::ModelSpec;

/// Bytes per parameter assumed when sizing a model (bf16 weights).
const BYTES_PER_PARAMETER: u64 = 2;

/// Pick the first catalog entry whose weights fit strictly inside `budget`.
///
/// The catalog is expected largest first. When nothing fits, the last
/// (smallest) entry is returned so the agent can still start, swapping if it
/// must. Returns `None` only for an empty catalog.
pub fn select_model(catalog: &[ModelSpec], budget: u64) -> Option<&ModelSpec> {
    let chosen = catalog
        .iter()
        .find(|spec| spec.parameter_count.saturating_mul(BYTES_PER_PARAMETER) < budget)
        .or_else(|| catalog.last());

    if let Some(spec) = chosen {
        tracing::info!(
            model = %spec.name,
            parameters = spec.parameter_count,
            budget,
            "selected model"
        );
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<ModelSpec> {
        vec![
            ModelSpec::new("large", 3_000),
            ModelSpec::new("medium", 1_000),
            ModelSpec::new("small", 100),
        ]
    }

    #[test]
    fn picks_largest_fitting_model() {
        let catalog = catalog();
        assert_eq!(select_model(&catalog, 10_000).unwrap().name, "large");
        assert_eq!(select_model(&catalog, 5_000).unwrap().name, "medium");
    }

    #[test]
    fn fit_is_strict() {
        let catalog = catalog();
        // 1_000 params * 2 bytes == 2_000 does not fit a 2_000 byte budget.
        assert_eq!(select_model(&catalog, 2_000).unwrap().name, "small");
        assert_eq!(select_model(&catalog, 2_001).unwrap().name, "medium");
    }

    #[test]
    fn falls_back_to_smallest() {
        let catalog = catalog();
        assert_eq!(select_model(&catalog, 0).unwrap().name, "small");
    }

    #[test]
    fn empty_catalog_selects_nothing() {
        assert!(select_model(&[], 1 << 40).is_none());
    }
}
