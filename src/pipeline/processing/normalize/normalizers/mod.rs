// Individual dataset normalizers
pub mod award;
pub mod track;

pub use award::AwardNormalizer;
pub use track::TrackNormalizer;
