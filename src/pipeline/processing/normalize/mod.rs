//! Dataset-specific normalization of loaded record sets.

pub mod normalizers;
pub mod registry;

pub use normalizers::{AwardNormalizer, TrackNormalizer};
pub use registry::NormalizationRegistry;

use crate::error::Result;
use crate::frame::RecordSet;

/// Turns a raw dataset into one that satisfies that dataset's invariants.
pub trait DatasetNormalizer: Send + Sync {
    /// Runs every normalization step in order and returns the resulting record set
    fn normalize(&self, records: RecordSet) -> Result<RecordSet>;

    /// Dataset this normalizer handles
    fn dataset(&self) -> &str;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}
