use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use awards_etl::config::ConnectionParams;
use awards_etl::constants::DEFAULT_CONFIG_PATH;
use awards_etl::logging;
use awards_etl::pipeline::orchestrator::TaskState;
use awards_etl::pipeline::pipeline_config::PipelineConfig;
use awards_etl::pipeline::staging::stage_csv;
use awards_etl::pipeline::steps::load_store::load_scripts;
use awards_etl::pipeline::{build_graph, run_pipeline};
use awards_etl::store::{self, SqliteStore, Store};

#[derive(Parser)]
#[command(name = "awards_etl")]
#[command(about = "Merge music-award nominations with streaming track data")]
#[command(version = "0.1.0")]
struct Cli {
    /// Pipeline configuration file (defaults apply when it does not exist)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole task graph once
    Run {
        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Import a CSV file into a staging table
    Stage {
        /// Target table name
        #[arg(long)]
        table: String,
        /// CSV file with a header row
        #[arg(long)]
        csv: PathBuf,
        /// Drop the table first if it exists
        #[arg(long)]
        replace: bool,
    },
    /// Execute an existing schema script followed by its seed script
    Load {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        seed: PathBuf,
    },
    /// Print the tasks in execution order with their dependencies
    Graph,
}

fn open_store() -> anyhow::Result<SqliteStore> {
    let params = ConnectionParams::from_env().context("Failed to read store connection settings")?;
    info!(?params, "Using store connection settings");
    SqliteStore::connect(params).context("Failed to open store")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Run { report } => run(config, report.as_deref()).await,
        Commands::Stage {
            table,
            csv,
            replace,
        } => {
            println!("📥 Staging {} into '{}'...", csv.display(), table);
            let mut store = open_store()?;
            let staged = stage_csv(&mut store, &csv, &table, replace, config.batch_size)
                .with_context(|| format!("Failed to stage {}", csv.display()))?;
            store.close();
            println!(
                "✅ Staged {} rows into '{}' ({} columns)",
                staged.rows,
                staged.table,
                staged.schema.columns.len()
            );
            Ok(())
        }
        Commands::Load { schema, seed } => {
            println!("🗄️  Loading {} and {}...", schema.display(), seed.display());
            let mut store = open_store()?;
            let report = load_scripts(&mut store, &schema, &seed, config.batch_size, None)
                .context("Failed to load scripts")?;
            store.close();
            println!(
                "✅ Executed {} statements in {} batch(es)",
                report.statements, report.batches
            );
            Ok(())
        }
        Commands::Graph => {
            let graph = build_graph(&config)?;
            println!("📋 Pipeline '{}':", graph.name());
            let edges = graph.edges();
            for (position, task) in graph.topological_order()?.into_iter().enumerate() {
                let deps = edges
                    .iter()
                    .find(|(id, _)| *id == task)
                    .map(|(_, deps)| deps.join(", "))
                    .unwrap_or_default();
                if deps.is_empty() {
                    println!("   {}. {}", position + 1, task);
                } else {
                    println!("   {}. {} <- {}", position + 1, task, deps);
                }
            }
            Ok(())
        }
    }
}

async fn run(config: PipelineConfig, report_path: Option<&Path>) -> anyhow::Result<()> {
    println!("🔄 Running pipeline '{}'...", config.name);
    let store = store::shared(open_store()?);
    let result = run_pipeline(config, store).await?;

    println!("\n📊 Pipeline Results:");
    for task in &result.tasks {
        let icon = match task.state {
            TaskState::Succeeded => "✅",
            TaskState::Failed => "❌",
            TaskState::Skipped => "⏭️ ",
        };
        println!(
            "   {} {} (attempts: {}): {}",
            icon, task.task, task.attempts, task.message
        );
    }
    if let Some(duration) = result.duration() {
        println!("   Duration: {}ms", duration.num_milliseconds());
    }

    if let Some(path) = report_path {
        let written = result.write_json(path)?;
        println!("   Report: {}", written.display());
    }

    if let Err(e) = result.into_result() {
        error!("Pipeline run failed: {}", e);
        return Err(e.into());
    }
    println!("🎉 Pipeline completed successfully");
    Ok(())
}
