// ==========================================
// WiscAr 导入管道 - 命令行入口
// ==========================================
// 子命令:
//   import-map       批量导入 ArArCalc 报表
//   import-metadata  导入样品元数据表
//   metrics          打印实验室指标
// ==========================================

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::error;
use wiscar_import::config::{default_db_path, ImportConfig, ImportOptions};
use wiscar_import::db::LabDatabase;
use wiscar_import::importer::{BatchSummary, FileImporter, ImportLoop, MetadataImporter, SessionImporter};
use wiscar_import::logging;
use wiscar_import::plugins::{metrics::METRICS_PATH, ApiRegistry, HttpMethod, PluginManager};

#[derive(Parser)]
#[command(name = "wiscar-import")]
#[command(version, about = "WiscAr Ar/Ar data import pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Copy)]
struct BatchArgs {
    /// Re-import files that were already imported successfully
    #[arg(short, long)]
    redo: bool,

    /// Abort the batch at the first failing file
    #[arg(long)]
    stop_on_error: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl BatchArgs {
    fn options(&self, show_data: bool) -> ImportOptions {
        ImportOptions {
            redo: self.redo,
            stop_on_error: self.stop_on_error,
            verbose: self.verbose,
            show_data,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import WiscAr MAP spectrometer data (ArArCalc files) in bulk
    ImportMap {
        #[command(flatten)]
        batch: BatchArgs,

        /// Print the extracted tables of each file
        #[arg(long)]
        show_data: bool,
    },

    /// Import sample metadata (locations, lithology, publications)
    ImportMetadata {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Print lab metrics as JSON
    Metrics {
        /// SQLite database path
        #[arg(long, env = "LAB_DB_PATH")]
        db: Option<PathBuf>,
    },
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Commands::ImportMap { batch, .. } | Commands::ImportMetadata { batch } => batch.verbose,
            Commands::Metrics { .. } => false,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.command.verbose());

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::ImportMap { batch, show_data } => {
            let options = batch.options(show_data);
            run_batch(&SessionImporter::new(&options), options)
        }
        Commands::ImportMetadata { batch } => {
            let options = batch.options(false);
            run_batch(&MetadataImporter::new(&options), options)
        }
        Commands::Metrics { db } => print_metrics(&db.unwrap_or_else(default_db_path)),
    }
}

fn run_batch<I: FileImporter>(importer: &I, options: ImportOptions) -> anyhow::Result<()> {
    // 数据目录未配置时提示后直接返回
    let config = match ImportConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Aborting");
            return Ok(());
        }
    };

    let mut db = open_database(&config.db_path)?;
    let summary = ImportLoop::new(&mut db, options).run(importer, config.data_dir())?;
    print_summary(importer.name(), &summary);
    Ok(())
}

fn open_database(path: &Path) -> anyhow::Result<LabDatabase> {
    let db = LabDatabase::open_and_migrate(path)
        .with_context(|| format!("无法打开数据库 {}", path.display()))?;
    PluginManager::with_lab_plugins().database_ready(db.connection())?;
    Ok(db)
}

fn print_summary(command: &str, summary: &BatchSummary) {
    println!(
        "{} [{}]: {} imported, {} skipped, {} failed",
        command, summary.batch_id, summary.imported, summary.skipped, summary.failed
    );
}

fn print_metrics(db_path: &Path) -> anyhow::Result<()> {
    let db = open_database(db_path)?;
    let plugins = PluginManager::with_lab_plugins();
    let mut api = ApiRegistry::new();
    plugins.initialize_api(&mut api)?;

    let metrics = api.dispatch(HttpMethod::Get, METRICS_PATH, db.connection())?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
