use awards_etl::config::ConnectionParams;
use awards_etl::constants::TARGET_TABLE;
use awards_etl::store::{quote_ident, SqliteStore, Store};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let table = std::env::args().nth(1).unwrap_or_else(|| TARGET_TABLE.to_string());

    println!("⚠️  WARNING: This will drop the table '{}' and ALL of its rows!", table);
    println!("Press Enter to continue or Ctrl+C to cancel...");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    println!("🗑️  Dropping table...");
    let mut store = SqliteStore::new(ConnectionParams::from_env()?);
    store.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(&table)), &[])?;

    println!("✅ Table '{}' dropped successfully!", table);
    Ok(())
}
