//! Dataset, task and handoff names shared across the pipeline.
//! Task ids double as the names shown in logs and run reports.

// Dataset names
pub const AWARD_DATASET: &str = "grammy";
pub const TRACK_DATASET: &str = "spotify";

// Source and target tables
pub const AWARD_STAGING_TABLE: &str = "grammy_staging";
pub const TRACK_STAGING_TABLE: &str = "spotify_staging";
pub const TARGET_TABLE: &str = "spotify_grammy_clean";

// Task ids
pub const LOAD_AWARD_TASK: &str = "load_grammy_dataset";
pub const LOAD_TRACK_TASK: &str = "load_spotify_dataset";
pub const TRANSFORM_AWARD_TASK: &str = "transform_grammy_data";
pub const TRANSFORM_TRACK_TASK: &str = "transform_spotify_data";
pub const MERGE_TASK: &str = "merge_datasets";
pub const SCHEMA_SEED_TASK: &str = "infer_schema_and_seed";
pub const LOAD_TO_STORE_TASK: &str = "create_table_and_insert_data";

// Handoff keys
pub const AWARD_DATA_KEY: &str = "grammy_data";
pub const TRACK_DATA_KEY: &str = "spotify_data";
pub const AWARD_CLEAN_KEY: &str = "grammy_clean";
pub const TRACK_CLEAN_KEY: &str = "spotify_clean";
pub const COMBINED_DATA_KEY: &str = "combined_data";
pub const SCHEMA_PATH_KEY: &str = "schema_path";
pub const SEED_PATH_KEY: &str = "seed_path";

// Award columns
pub const YEAR_COLUMN: &str = "year";
pub const TITLE_COLUMN: &str = "title";
pub const CATEGORY_COLUMN: &str = "category";
pub const NOMINEE_COLUMN: &str = "nominee";
pub const ARTIST_COLUMN: &str = "artist";
pub const WORKERS_COLUMN: &str = "workers";
pub const WINNER_COLUMN: &str = "winner";

// Track columns
pub const TRACK_ID_COLUMN: &str = "track_id";
pub const ARTISTS_COLUMN: &str = "artists";
pub const ALBUM_NAME_COLUMN: &str = "album_name";
pub const TRACK_NAME_COLUMN: &str = "track_name";
pub const TIME_SIGNATURE_COLUMN: &str = "time_signature";
pub const DURATION_MS_COLUMN: &str = "duration_ms";

/// Boolean provenance column added by the merge.
pub const NOMINATION_COLUMN: &str = "grammy_nomination";

/// Category keywords kept by the award normalizer (case-insensitive substring match).
pub const CATEGORY_KEYWORDS: [&str; 7] = [
    "album",
    "r&b",
    "song",
    "artist",
    "vocal",
    "performance",
    "record",
];

/// Columns renamed in generated table definitions to avoid store keywords.
pub const RESERVED_COLUMN_RENAMES: [(&str, &str); 2] =
    [("key", "key_column"), ("explicit", "explicit_column")];

// Default artifact locations, relative to the working directory
pub const DEFAULT_QUERY_PATH: &str = "sql/queries/select_all_rows.sql";
pub const DEFAULT_SCHEMA_SEED_DIR: &str = "sql/schema_seed_clean";
pub const DEFAULT_EXPORT_DIR: &str = "data/clean";
pub const DEFAULT_EXPORT_FILE: &str = "combined_data_with_grammy_nomination.csv";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub const DEFAULT_BATCH_SIZE: usize = 3000;
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;
