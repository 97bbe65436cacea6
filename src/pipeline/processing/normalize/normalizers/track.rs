use tracing::{debug, info};

use super::super::DatasetNormalizer;
use crate::constants::{
    ALBUM_NAME_COLUMN, ARTISTS_COLUMN, DURATION_MS_COLUMN, TIME_SIGNATURE_COLUMN,
    TRACK_DATASET, TRACK_ID_COLUMN, TRACK_NAME_COLUMN,
};
use crate::error::{EtlError, Result};
use crate::frame::{RecordSet, Value};
use crate::pipeline::processing::clean::clean_columns;

/// Normalizer for streaming tracks.
pub struct TrackNormalizer;

impl TrackNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TrackNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetNormalizer for TrackNormalizer {
    fn normalize(&self, records: RecordSet) -> Result<RecordSet> {
        let input_rows = records.len();

        let records = clean_track_text(records)?;
        let records = remove_duplicate_tracks(records)?;
        let records = remove_invalid_tracks(records)?;

        info!(
            input_rows,
            output_rows = records.len(),
            "Track normalization completed"
        );
        Ok(records)
    }

    fn dataset(&self) -> &str {
        TRACK_DATASET
    }

    fn name(&self) -> &str {
        "Spotify Track Normalizer"
    }
}

pub fn clean_track_text(mut records: RecordSet) -> Result<RecordSet> {
    clean_columns(
        &mut records,
        &[ARTISTS_COLUMN, ALBUM_NAME_COLUMN, TRACK_NAME_COLUMN],
    )?;
    Ok(records)
}

/// Keeps the first row for every track id.
pub fn remove_duplicate_tracks(mut records: RecordSet) -> Result<RecordSet> {
    let removed = records.drop_duplicates_by(TRACK_ID_COLUMN)?;
    debug!(removed, "Removed duplicate track ids");
    Ok(records)
}

/// Drops tracks with a zero time signature or a duration that is not
/// positive. A missing time signature is not zero and is kept; a missing
/// duration is not positive and is dropped.
pub fn remove_invalid_tracks(mut records: RecordSet) -> Result<RecordSet> {
    let time_signature = records.column_index(TIME_SIGNATURE_COLUMN)?;
    let duration = records.column_index(DURATION_MS_COLUMN)?;

    let before = records.len();
    records.retain(|row| {
        let signature_ok = match numeric(TIME_SIGNATURE_COLUMN, &row[time_signature])? {
            Some(v) => v != 0.0,
            None => true,
        };
        let duration_ok = match numeric(DURATION_MS_COLUMN, &row[duration])? {
            Some(v) => v > 0.0,
            None => false,
        };
        Ok(signature_ok && duration_ok)
    })?;
    debug!(removed = before - records.len(), "Removed invalid tracks");
    Ok(records)
}

fn numeric(column: &str, value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        other => other.as_f64().map(Some).ok_or_else(|| EtlError::TypeMismatch {
            column: column.to_string(),
            expected: "number",
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const COLUMNS: [&str; 7] = [
        "track_id",
        "artists",
        "album_name",
        "track_name",
        "time_signature",
        "duration_ms",
        "danceability",
    ];

    fn track(id: &str, artists: &str, signature: Value, duration: Value) -> Vec<Value> {
        vec![
            Value::text(id),
            Value::text(artists),
            Value::text(" Some ÁLBUM "),
            Value::text("Track"),
            signature,
            duration,
            Value::Float(0.5),
        ]
    }

    #[test]
    fn test_normalize_enforces_track_invariants() {
        let records = RecordSet::from_rows(
            COLUMNS,
            vec![
                track("a", "Björk", Value::Integer(4), Value::Integer(200_000)),
                track("a", "Björk", Value::Integer(3), Value::Integer(180_000)),
                track("b", "Adele", Value::Integer(0), Value::Integer(200_000)),
                track("c", "Adele", Value::Integer(4), Value::Integer(0)),
                track("d", "Adele", Value::Integer(4), Value::Integer(-5)),
                track("e", "Adele", Value::Null, Value::Integer(100)),
                track("f", "Adele", Value::Integer(4), Value::Null),
            ],
        )
        .unwrap();

        let normalized = TrackNormalizer::new().normalize(records).unwrap();

        let ids: Vec<String> = normalized
            .column_values("track_id")
            .unwrap()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "e"]);
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        assert_eq!(normalized.value(0, "artists").unwrap(), &Value::text("bjork"));
        assert_eq!(normalized.value(0, "album_name").unwrap(), &Value::text("some album"));
        // First occurrence of a duplicate id wins
        assert_eq!(normalized.value(0, "time_signature").unwrap(), &Value::Integer(4));
        assert_eq!(normalized.value(0, "danceability").unwrap(), &Value::Float(0.5));
    }

    #[test]
    fn test_float_durations_are_compared_numerically() {
        let records = RecordSet::from_rows(
            COLUMNS,
            vec![
                track("a", "x", Value::Float(4.0), Value::Float(0.5)),
                track("b", "x", Value::Float(0.0), Value::Float(10.0)),
            ],
        )
        .unwrap();
        let kept = remove_invalid_tracks(records).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.value(0, "track_id").unwrap(), &Value::text("a"));
    }

    #[test]
    fn test_non_numeric_duration_is_type_mismatch() {
        let records = RecordSet::from_rows(
            COLUMNS,
            vec![track("a", "x", Value::Integer(4), Value::text("long"))],
        )
        .unwrap();
        let err = remove_invalid_tracks(records).unwrap_err();
        assert!(matches!(
            err,
            EtlError::TypeMismatch { column, found: "text", .. } if column == "duration_ms"
        ));
    }

    #[test]
    fn test_missing_track_id_column() {
        let records = RecordSet::new(["artists", "album_name", "track_name"]);
        let err = TrackNormalizer::new().normalize(records).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn(c) if c == "track_id"));
    }
}
