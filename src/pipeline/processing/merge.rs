//! Outer joins of the normalized award and track sets.
//!
//! Awards are joined to tracks twice, once on (artist, album) and once on
//! (artist, track title). Each join keeps unmatched rows from both sides and
//! records which side every output row came from. The two results are then
//! stacked and exact duplicate rows removed.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::info;

use crate::constants::{
    ALBUM_NAME_COLUMN, ARTISTS_COLUMN, ARTIST_COLUMN, NOMINATION_COLUMN, NOMINEE_COLUMN,
    TRACK_NAME_COLUMN,
};
use crate::error::{EtlError, Result};
use crate::frame::{cell_key, CellKey, RecordSet, Value};

const LEFT_SUFFIX: &str = "_x";
const RIGHT_SUFFIX: &str = "_y";

/// Which input an outer-join row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSide {
    Both,
    LeftOnly,
    RightOnly,
}

/// Result of [`outer_join`]: the joined rows and, for each row, its side.
#[derive(Debug, Clone)]
pub struct OuterJoin {
    pub records: RecordSet,
    pub sides: Vec<JoinSide>,
}

impl OuterJoin {
    pub fn counts(&self) -> JoinCounts {
        let mut counts = JoinCounts::default();
        for side in &self.sides {
            match side {
                JoinSide::Both => counts.both += 1,
                JoinSide::LeftOnly => counts.left_only += 1,
                JoinSide::RightOnly => counts.right_only += 1,
            }
        }
        counts
    }

    /// Consumes the join, adding a boolean column that is true exactly for
    /// rows matched on both sides.
    pub fn into_flagged(self, column: &str) -> Result<RecordSet> {
        let mut records = self.records;
        let flags = self
            .sides
            .iter()
            .map(|side| Value::Boolean(*side == JoinSide::Both))
            .collect();
        records.set_column(column, flags)?;
        Ok(records)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinCounts {
    pub both: usize,
    pub left_only: usize,
    pub right_only: usize,
}

/// Row counts gathered while merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub album: JoinCounts,
    pub song: JoinCounts,
    pub duplicates_removed: usize,
    pub combined_rows: usize,
}

#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub records: RecordSet,
    pub report: MergeReport,
}

/// Full outer join of `left` and `right` on equality of the key columns.
///
/// Output rows are every left row in order, once per matching right row
/// (right order) or once padded with nulls when nothing matches, followed by
/// the right rows that matched nothing. A null key cell never matches.
/// Column names that appear on both sides get `_x` and `_y` suffixes.
pub fn outer_join(
    left: &RecordSet,
    right: &RecordSet,
    left_on: &[&str],
    right_on: &[&str],
) -> Result<OuterJoin> {
    if left_on.len() != right_on.len() || left_on.is_empty() {
        return Err(EtlError::ColumnMismatch(format!(
            "join keys [{}] vs [{}]",
            left_on.join(", "),
            right_on.join(", ")
        )));
    }
    let left_keys = key_indices(left, left_on)?;
    let right_keys = key_indices(right, right_on)?;

    let mut index: HashMap<Vec<CellKey<'_>>, Vec<usize>> = HashMap::new();
    for (pos, row) in right.rows().iter().enumerate() {
        if let Some(key) = join_key(row, &right_keys) {
            index.entry(key).or_default().push(pos);
        }
    }

    let mut records = RecordSet::new(joined_columns(left.columns(), right.columns()));
    let mut sides = Vec::with_capacity(left.len().max(right.len()));
    let mut matched = vec![false; right.len()];
    let right_nulls = vec![Value::Null; right.width()];
    let left_nulls = vec![Value::Null; left.width()];

    for row in left.rows() {
        let matches = join_key(row, &left_keys).and_then(|key| index.get(&key));
        match matches {
            Some(positions) => {
                for &pos in positions {
                    matched[pos] = true;
                    records.push_row(concat_row(row, &right.rows()[pos]))?;
                    sides.push(JoinSide::Both);
                }
            }
            None => {
                records.push_row(concat_row(row, &right_nulls))?;
                sides.push(JoinSide::LeftOnly);
            }
        }
    }

    for (row, _) in right
        .rows()
        .iter()
        .zip(&matched)
        .filter(|(_, matched)| !**matched)
    {
        records.push_row(concat_row(&left_nulls, row))?;
        sides.push(JoinSide::RightOnly);
    }

    Ok(OuterJoin { records, sides })
}

fn key_indices(records: &RecordSet, columns: &[&str]) -> Result<Vec<usize>> {
    columns.iter().map(|c| records.column_index(c)).collect()
}

fn join_key<'a>(row: &'a [Value], indices: &[usize]) -> Option<Vec<CellKey<'a>>> {
    indices
        .iter()
        .map(|&i| match &row[i] {
            Value::Null => None,
            value => Some(cell_key(value)),
        })
        .collect()
}

fn concat_row(left: &[Value], right: &[Value]) -> Vec<Value> {
    left.iter().chain(right).cloned().collect()
}

fn joined_columns(left: &[String], right: &[String]) -> Vec<String> {
    let left_names: HashSet<&str> = left.iter().map(String::as_str).collect();
    let right_names: HashSet<&str> = right.iter().map(String::as_str).collect();

    let left_cols = left.iter().map(|c| {
        if right_names.contains(c.as_str()) {
            format!("{c}{LEFT_SUFFIX}")
        } else {
            c.clone()
        }
    });
    let right_cols = right.iter().map(|c| {
        if left_names.contains(c.as_str()) {
            format!("{c}{RIGHT_SUFFIX}")
        } else {
            c.clone()
        }
    });
    left_cols.chain(right_cols).collect()
}

/// Joins awards to tracks by album and by song, tags nominations and removes
/// duplicate rows from the stacked result.
pub fn fuzzy_merge(awards: &RecordSet, tracks: &RecordSet) -> Result<MergeOutput> {
    let album = outer_join(
        awards,
        tracks,
        &[ARTIST_COLUMN, NOMINEE_COLUMN],
        &[ARTISTS_COLUMN, ALBUM_NAME_COLUMN],
    )?;
    let album_counts = album.counts();
    info!(
        matched = album_counts.both,
        track_only = album_counts.right_only,
        "Album join completed"
    );

    let song = outer_join(
        awards,
        tracks,
        &[ARTIST_COLUMN, NOMINEE_COLUMN],
        &[ARTISTS_COLUMN, TRACK_NAME_COLUMN],
    )?;
    let song_counts = song.counts();
    info!(
        matched = song_counts.both,
        track_only = song_counts.right_only,
        "Song join completed"
    );

    let mut combined = album
        .into_flagged(NOMINATION_COLUMN)?
        .concat(song.into_flagged(NOMINATION_COLUMN)?)?;
    let duplicates_removed = combined.drop_duplicates();
    info!(
        rows = combined.len(),
        duplicates_removed, "Combined album and song joins"
    );

    let report = MergeReport {
        album: album_counts,
        song: song_counts,
        duplicates_removed,
        combined_rows: combined.len(),
    };
    Ok(MergeOutput {
        records: combined,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awards() -> RecordSet {
        RecordSet::from_rows(
            ["year", "category", "nominee", "artist", "winner"],
            vec![
                vec![Value::Integer(2017), "album of the year".into(), "25".into(), "adele".into(), true.into()],
                vec![Value::Integer(2016), "song of the year".into(), "hello".into(), "adele".into(), true.into()],
                vec![Value::Integer(2016), "record of the year".into(), "nothing".into(), "x".into(), false.into()],
            ],
        )
        .unwrap()
    }

    fn tracks() -> RecordSet {
        RecordSet::from_rows(
            ["track_id", "artists", "album_name", "track_name"],
            vec![
                vec!["t1".into(), "adele".into(), "25".into(), "hello".into()],
                vec!["t2".into(), "adele".into(), "21".into(), "skyfall".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_outer_join_keeps_both_sides_in_order() {
        let join = outer_join(&awards(), &tracks(), &["artist", "nominee"], &["artists", "album_name"])
            .unwrap();

        assert_eq!(
            join.sides,
            vec![JoinSide::Both, JoinSide::LeftOnly, JoinSide::LeftOnly, JoinSide::RightOnly]
        );
        assert_eq!(join.records.width(), 9);
        assert_eq!(join.records.value(0, "track_id").unwrap(), &Value::text("t1"));
        assert!(join.records.value(1, "track_id").unwrap().is_null());
        assert!(join.records.value(3, "year").unwrap().is_null());
        assert_eq!(join.records.value(3, "track_id").unwrap(), &Value::text("t2"));
        assert_eq!(
            join.counts(),
            JoinCounts { both: 1, left_only: 2, right_only: 1 }
        );
    }

    #[test]
    fn test_null_keys_never_match() {
        let left = RecordSet::from_rows(["k"], vec![vec![Value::Null]]).unwrap();
        let right = RecordSet::from_rows(["j"], vec![vec![Value::Null]]).unwrap();

        let join = outer_join(&left, &right, &["k"], &["j"]).unwrap();
        assert_eq!(join.sides, vec![JoinSide::LeftOnly, JoinSide::RightOnly]);
    }

    #[test]
    fn test_one_left_row_matches_many_right_rows() {
        let left = RecordSet::from_rows(["k"], vec![vec!["a".into()]]).unwrap();
        let right = RecordSet::from_rows(
            ["j", "n"],
            vec![vec!["a".into(), Value::Integer(1)], vec!["a".into(), Value::Integer(2)]],
        )
        .unwrap();

        let join = outer_join(&left, &right, &["k"], &["j"]).unwrap();
        assert_eq!(join.sides, vec![JoinSide::Both, JoinSide::Both]);
        assert_eq!(join.records.value(1, "n").unwrap(), &Value::Integer(2));
    }

    #[test]
    fn test_overlapping_columns_are_suffixed() {
        let left = RecordSet::from_rows(["k", "year"], vec![vec!["a".into(), Value::Integer(1)]]).unwrap();
        let right = RecordSet::from_rows(["j", "year"], vec![vec!["a".into(), Value::Integer(2)]]).unwrap();

        let join = outer_join(&left, &right, &["k"], &["j"]).unwrap();
        assert_eq!(join.records.columns(), &["k", "year_x", "j", "year_y"]);
    }

    #[test]
    fn test_mismatched_key_lists_are_rejected() {
        let err = outer_join(&awards(), &tracks(), &["artist"], &["artists", "album_name"])
            .unwrap_err();
        assert!(matches!(err, EtlError::ColumnMismatch(_)));
    }

    #[test]
    fn test_fuzzy_merge_keeps_every_track_and_flags_matches() {
        let tracks = tracks();
        let output = fuzzy_merge(&awards(), &tracks).unwrap();
        let merged = &output.records;

        let ids: Vec<&Value> = merged.column_values("track_id").unwrap().collect();
        for id in tracks.column_values("track_id").unwrap() {
            assert!(ids.contains(&id), "track {id} missing from merge");
        }

        let track_idx = merged.column_index("track_id").unwrap();
        let flag_idx = merged.column_index(NOMINATION_COLUMN).unwrap();
        for row in merged.rows() {
            if row[flag_idx] == Value::Boolean(true) {
                assert_eq!(row[track_idx], Value::text("t1"));
            }
        }
        let nominated = merged
            .rows()
            .iter()
            .filter(|row| row[flag_idx] == Value::Boolean(true))
            .count();
        assert_eq!(nominated, 2);

        assert_eq!(output.report.duplicates_removed, 2);
        assert_eq!(output.report.combined_rows, 6);
        assert_eq!(output.report.album.right_only, 1);
        assert_eq!(output.report.song.both, 1);
    }
}
