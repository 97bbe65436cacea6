use std::collections::HashMap;

use super::normalizers::{AwardNormalizer, TrackNormalizer};
use super::DatasetNormalizer;
use crate::error::{EtlError, Result};
use crate::frame::RecordSet;

/// Registry of dataset-specific normalizers
pub struct NormalizationRegistry {
    normalizers: HashMap<String, Box<dyn DatasetNormalizer>>,
}

impl NormalizationRegistry {
    /// Create a registry with the award and track normalizers registered
    pub fn new() -> Self {
        let mut registry = Self {
            normalizers: HashMap::new(),
        };
        registry.register(Box::new(AwardNormalizer::new()));
        registry.register(Box::new(TrackNormalizer::new()));
        registry
    }

    /// Register a normalizer under the dataset it reports, replacing any previous one
    pub fn register(&mut self, normalizer: Box<dyn DatasetNormalizer>) {
        self.normalizers
            .insert(normalizer.dataset().to_string(), normalizer);
    }

    pub fn get_normalizer(&self, dataset: &str) -> Option<&dyn DatasetNormalizer> {
        self.normalizers.get(dataset).map(|n| n.as_ref())
    }

    /// Normalize a record set with the normalizer registered for `dataset`
    pub fn normalize(&self, dataset: &str, records: RecordSet) -> Result<RecordSet> {
        match self.get_normalizer(dataset) {
            Some(normalizer) => normalizer.normalize(records),
            None => Err(EtlError::UnknownDataset(dataset.to_string())),
        }
    }

    /// List all registered dataset names, sorted
    pub fn list_datasets(&self) -> Vec<&str> {
        let mut datasets: Vec<&str> = self.normalizers.keys().map(|k| k.as_str()).collect();
        datasets.sort_unstable();
        datasets
    }
}

impl Default for NormalizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AWARD_DATASET, TRACK_DATASET};

    struct Passthrough;

    impl DatasetNormalizer for Passthrough {
        fn normalize(&self, records: RecordSet) -> Result<RecordSet> {
            Ok(records)
        }

        fn dataset(&self) -> &str {
            "passthrough"
        }

        fn name(&self) -> &str {
            "Passthrough"
        }
    }

    #[test]
    fn test_registry_has_built_in_normalizers() {
        let registry = NormalizationRegistry::new();
        assert_eq!(registry.list_datasets(), vec![AWARD_DATASET, TRACK_DATASET]);
    }

    #[test]
    fn test_registry_returns_error_for_unknown_dataset() {
        let registry = NormalizationRegistry::new();
        let result = registry.normalize("billboard", RecordSet::new(["a"]));
        assert!(matches!(result, Err(EtlError::UnknownDataset(d)) if d == "billboard"));
    }

    #[test]
    fn test_register_custom_normalizer() {
        let mut registry = NormalizationRegistry::new();
        registry.register(Box::new(Passthrough));

        let records = RecordSet::new(["a"]);
        let normalized = registry.normalize("passthrough", records.clone()).unwrap();
        assert_eq!(normalized, records);
        assert_eq!(registry.get_normalizer("passthrough").unwrap().name(), "Passthrough");
    }
}
