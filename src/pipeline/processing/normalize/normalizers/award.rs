use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::super::DatasetNormalizer;
use crate::constants::{
    ARTIST_COLUMN, AWARD_DATASET, CATEGORY_COLUMN, CATEGORY_KEYWORDS, NOMINEE_COLUMN,
    TITLE_COLUMN, WINNER_COLUMN, WORKERS_COLUMN, YEAR_COLUMN,
};
use crate::error::{EtlError, Result};
use crate::frame::{cell_key, RecordSet, Value};
use crate::pipeline::processing::clean::clean_columns;

static TITLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:st|nd|rd|th)) Annual GRAMMY Awards").expect("title pattern is valid")
});

static WORKERS_ARTIST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.*?)\)").expect("workers pattern is valid"));

/// Normalizer for award nominations.
///
/// Steps run in a fixed order because later ones depend on earlier output:
/// winner flags are assigned before any row is dropped, and categories are
/// filtered only after they are cleaned.
pub struct AwardNormalizer {
    keywords: Vec<String>,
}

impl AwardNormalizer {
    pub fn new() -> Self {
        Self::with_keywords(CATEGORY_KEYWORDS.iter().map(|k| k.to_string()).collect())
    }

    pub fn with_keywords(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

impl Default for AwardNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetNormalizer for AwardNormalizer {
    fn normalize(&self, records: RecordSet) -> Result<RecordSet> {
        let input_rows = records.len();

        let records = simplify_titles(records)?;
        let records = mark_winners(records)?;
        let records = extract_artists_from_workers(records)?;
        let records = fill_missing_artists(records)?;
        let records = remove_missing_artists(records)?;
        debug!(rows = records.len(), "Award rows with an artist");

        let mut records = records;
        clean_columns(&mut records, &[CATEGORY_COLUMN, ARTIST_COLUMN, NOMINEE_COLUMN])?;
        // Cleaning can blank an artist out again
        let records = remove_missing_artists(records)?;

        let records = filter_categories(records, &self.keywords)?;
        info!(
            input_rows,
            output_rows = records.len(),
            "Award normalization completed"
        );
        Ok(records)
    }

    fn dataset(&self) -> &str {
        AWARD_DATASET
    }

    fn name(&self) -> &str {
        "Grammy Award Normalizer"
    }
}

/// Rewrites "Nth Annual GRAMMY Awards" to "Nth GRAMMY Awards", singular for
/// the first ceremony. Other titles come back unchanged.
pub fn simplify_title(title: &str) -> String {
    match TITLE_PATTERN.captures(title) {
        Some(caps) => {
            let ordinal = &caps[1];
            if ordinal == "1st" {
                format!("{ordinal} GRAMMY Award")
            } else {
                format!("{ordinal} GRAMMY Awards")
            }
        }
        None => title.to_string(),
    }
}

pub fn simplify_titles(mut records: RecordSet) -> Result<RecordSet> {
    records.map_column(TITLE_COLUMN, |value| match value {
        Value::Null => Ok(Value::Null),
        Value::Text(title) => Ok(Value::Text(simplify_title(title))),
        other => Err(EtlError::TypeMismatch {
            column: TITLE_COLUMN.to_string(),
            expected: "text",
            found: other.type_name(),
        }),
    })?;
    Ok(records)
}

/// Flags the first row of every (year, category) group as the winner and
/// every other row as not.
///
/// "First" means first in the order the rows arrived in; there is no other
/// tie-break. A missing year or category is a group key like any other value.
pub fn mark_winners(mut records: RecordSet) -> Result<RecordSet> {
    let year = records.column_index(YEAR_COLUMN)?;
    let category = records.column_index(CATEGORY_COLUMN)?;

    let flags: Vec<Value> = {
        let mut seen = HashSet::with_capacity(records.len());
        records
            .rows()
            .iter()
            .map(|row| Value::Boolean(seen.insert((cell_key(&row[year]), cell_key(&row[category])))))
            .collect()
    };

    records.set_column(WINNER_COLUMN, flags)?;
    Ok(records)
}

/// First parenthesized substring of a workers credit, e.g.
/// `"Quincy Jones, producer (Michael Jackson)"` gives `"Michael Jackson"`.
pub fn extract_artist(workers: &str) -> Option<String> {
    WORKERS_ARTIST_PATTERN
        .captures(workers)
        .map(|caps| caps[1].to_string())
}

pub fn extract_artists_from_workers(mut records: RecordSet) -> Result<RecordSet> {
    let artist = records.column_index(ARTIST_COLUMN)?;
    let workers = records.column_index(WORKERS_COLUMN)?;

    let artists: Vec<Value> = records
        .rows()
        .iter()
        .map(|row| match (&row[artist], &row[workers]) {
            (Value::Null, Value::Null) => Value::Null,
            (Value::Null, credit) => Value::from(extract_artist(&credit.to_string())),
            (present, _) => present.clone(),
        })
        .collect();

    records.set_column(ARTIST_COLUMN, artists)?;
    Ok(records)
}

/// Uses the nominee as the artist wherever the artist is still missing.
pub fn fill_missing_artists(mut records: RecordSet) -> Result<RecordSet> {
    let artist = records.column_index(ARTIST_COLUMN)?;
    let nominee = records.column_index(NOMINEE_COLUMN)?;

    let artists: Vec<Value> = records
        .rows()
        .iter()
        .map(|row| match &row[artist] {
            Value::Null => row[nominee].clone(),
            present => present.clone(),
        })
        .collect();

    records.set_column(ARTIST_COLUMN, artists)?;
    Ok(records)
}

pub fn remove_missing_artists(mut records: RecordSet) -> Result<RecordSet> {
    let artist = records.column_index(ARTIST_COLUMN)?;
    records.retain(|row| Ok(!row[artist].is_null()))?;
    Ok(records)
}

/// Keeps rows whose category contains at least one keyword, ignoring case.
/// Rows without a category are dropped.
pub fn filter_categories(mut records: RecordSet, keywords: &[String]) -> Result<RecordSet> {
    let category = records.column_index(CATEGORY_COLUMN)?;
    records.retain(|row| match &row[category] {
        Value::Null => Ok(false),
        Value::Text(text) => Ok(matches_keyword(text, keywords)),
        other => Err(EtlError::TypeMismatch {
            column: CATEGORY_COLUMN.to_string(),
            expected: "text",
            found: other.type_name(),
        }),
    })?;
    Ok(records)
}

fn matches_keyword(category: &str, keywords: &[String]) -> bool {
    let category = category.to_lowercase();
    keywords.iter().any(|k| category.contains(k.as_str()))
}
