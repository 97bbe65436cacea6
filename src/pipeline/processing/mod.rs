// Pipeline processing: cleaning, normalization, merging and SQL generation

pub mod clean;
pub mod merge;
pub mod normalize;
pub mod schema_seed;

pub use merge::{fuzzy_merge, MergeOutput, MergeReport};
pub use normalize::{DatasetNormalizer, NormalizationRegistry};
pub use schema_seed::{GeneratedScripts, InferredSchema, SchemaSeedGenerator};
