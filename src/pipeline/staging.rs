//! CSV import into staging tables.

use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::frame::csv_io::read_csv;
use crate::pipeline::processing::InferredSchema;
use crate::store::{quote_ident, Store};

#[derive(Debug, Clone)]
pub struct StageReport {
    pub table: String,
    pub schema: InferredSchema,
    pub rows: usize,
}

/// Creates `table` from the inferred schema of a CSV file and inserts every row.
///
/// With `replace` set an existing table is dropped first; otherwise creating
/// a table that already exists fails.
pub fn stage_csv(
    store: &mut dyn Store,
    csv_path: &Path,
    table: &str,
    replace: bool,
    batch_size: usize,
) -> Result<StageReport> {
    let records = read_csv(csv_path)?;
    let schema = InferredSchema::infer(&records, table)?;
    info!(
        path = %csv_path.display(),
        rows = records.len(),
        columns = records.width(),
        "Read staging file"
    );

    if replace {
        warn!("Dropping table '{}' before staging", table);
        store.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), &[])?;
    }
    store.execute(&schema.create_table_sql(), &[])?;
    let rows = store.insert_records(table, &records, batch_size)?;

    info!(table, rows, "Staged CSV into store");
    Ok(StageReport {
        table: table.to_string(),
        schema,
        rows,
    })
}
