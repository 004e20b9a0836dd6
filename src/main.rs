//! lakosgraph CLI - scan a C++ codebase into a physical design graph

use clap::{Parser, Subcommand};
use lakosgraph::classifier::{load_semantic_rules, Classifier};
use lakosgraph::config::{self, LakosgraphConfig};
use lakosgraph::ignore::IgnoreFilter;
use lakosgraph::node_storage::load_allowed_dependencies;
use lakosgraph::paths::weakly_canonical;
use lakosgraph::ui::{self, Change, ProgressManager, ProgressMessage, ProgressPhase, Spinner};
use lakosgraph::{
    CompilationDatabase, ErrorKind, FilesystemScanner, NodeStorage, ObjectStore, SqliteStore,
    State, UniqueId,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lakosgraph")]
#[command(version)]
#[command(about = "Physical design graph of C++ codebases")]
#[command(long_about = r#"
lakosgraph maps a C++ codebase onto package groups, packages and components,
keeps that model up to date incrementally and stores it in SQLite.

Example usage:
  lakosgraph init --compile-commands build/compile_commands.json
  lakosgraph scan
  lakosgraph tree --depth 2
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Compilation databases to scan
        #[arg(long = "compile-commands")]
        compile_commands: Vec<PathBuf>,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Scan the sources of the compilation databases into the code database
    Scan {
        /// Worker threads (defaults to the config, then to the CPU count)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Print the incremental result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show row counts of the code database
    Stats,

    /// Print the package tree
    Tree {
        /// Levels below the top level packages
        #[arg(short, long, default_value = "1")]
        depth: usize,
    },

    /// List problems recorded during scans
    Errors,

    /// Load allowed dependencies from the `.dep` files of the source tree
    Deps,

    /// Run a raw SQL query against the code database
    Query {
        /// SQL statement
        sql: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Init {
            compile_commands,
            force,
        } => {
            let config = LakosgraphConfig {
                database: Some(".lakosgraph/codebase.db".to_string()),
                source_dir: Some(".".to_string()),
                compile_commands: compile_commands
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect(),
                ..Default::default()
            };
            config::write_config(&config_path, &config, force)?;
            ui::success(&format!("Wrote {}", config_path.display()));
        }

        Commands::Scan { threads, json } => {
            let config = config::load_config(Some(&config_path))?.unwrap_or_default();
            run_scan(&config, &base, threads, json)?;
        }

        Commands::Stats => {
            let config = config::load_config(Some(&config_path))?.unwrap_or_default();
            let db = SqliteStore::open_existing(&config.database_path_in(&base))?;
            ui::section("Code database");
            println!("{}", ui::stats_table(&db.stats()?));
        }

        Commands::Tree { depth } => {
            let config = config::load_config(Some(&config_path))?.unwrap_or_default();
            let mut ns = open_node_storage(&config.database_path_in(&base))?;
            for uid in ns.get_top_level_packages()? {
                print_tree(&mut ns, uid, 0, depth)?;
            }
        }

        Commands::Errors => {
            let config = config::load_config(Some(&config_path))?.unwrap_or_default();
            let db = SqliteStore::open_existing(&config.database_path_in(&base))?;
            let mut result = db.raw_query(
                "SELECT error_kind AS kind, fully_qualified_name AS name, error_message AS message, file_name AS file
                 FROM error_messages ORDER BY id",
            )?;
            if result.data.is_empty() {
                ui::success("No errors recorded");
                return Ok(());
            }
            for row in &mut result.data {
                if let Some(kind) = row.first_mut() {
                    if let Ok(value) = kind.parse::<i64>() {
                        *kind = ErrorKind::from_i64(value).to_string();
                    }
                }
            }
            println!("{}", ui::query_table(&result));
        }

        Commands::Deps => {
            let config = config::load_config(Some(&config_path))?.unwrap_or_default();
            let mut ns = open_node_storage(&config.database_path_in(&base))?;
            let source_dir = config.source_dir_in(&base);
            let spinner = Spinner::new("Loading allowed dependencies");
            load_allowed_dependencies(&mut ns, &source_dir)?;
            spinner.finish_with_message("Done");
            ui::success(&format!("Loaded .dep files under {}", source_dir.display()));
        }

        Commands::Query { sql } => {
            let config = config::load_config(Some(&config_path))?.unwrap_or_default();
            let ns = open_node_storage(&config.database_path_in(&base))?;
            let result = ns.raw_db_query(&sql)?;
            println!("{}", ui::query_table(&result));
            ui::summary_row("rows", &result.data.len().to_string());
        }
    }

    Ok(())
}

fn run_scan(config: &LakosgraphConfig, base: &Path, threads: Option<usize>, json: bool) -> anyhow::Result<()> {
    if config.compile_commands.is_empty() {
        anyhow::bail!("no compile_commands configured, run `lakosgraph init --compile-commands <path>`");
    }

    let source_dir = weakly_canonical(&config.source_dir_in(base));
    let db_path = config.database_path_in(base);
    let threads = threads.filter(|n| *n > 0).unwrap_or_else(|| config.thread_count());

    if !json {
        ui::header("Scanning codebase");
        ui::info("Source", &source_dir.display().to_string());
        ui::info("Database", &db_path.display().to_string());
    }

    let mut compile_db = CompilationDatabase::new();
    for path in &config.compile_commands {
        compile_db.add_compilation_database(&base.join(path))?;
    }
    if compile_db.is_empty() && !json {
        ui::warn("The compilation databases list no source files");
    }

    let ignore = IgnoreFilter::new(&source_dir, &config.ignore);
    let classifier = Classifier::new(&source_dir)
        .with_non_lakosian_dirs(config.non_lakosian_dirs.iter().map(|d| source_dir.join(d)).collect())
        .with_third_party(&config.third_party)?
        .with_rules(load_semantic_rules()?);

    let store = ObjectStore::new();
    if db_path.exists() {
        store.read_from_database(&db_path)?;
    }

    let started = Instant::now();
    let (mut progress, tx) = ProgressManager::new();
    let result = {
        let scanner = FilesystemScanner::new(&store, &source_dir, &compile_db, &classifier, &ignore)
            .with_threads(threads)
            .with_progress(tx.clone());
        scanner.scan_compilation_db()
    };
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            drop(tx);
            progress.join();
            progress.clear();
            return Err(e.into());
        }
    };

    store.set_state(State::PhysicalReady);
    let _ = tx.send(ProgressMessage::Started {
        phase: ProgressPhase::Writing,
        total: 0,
    });
    config::ensure_db_dir(&db_path)?;
    let written = store.write_to_database(&db_path);
    let _ = tx.send(ProgressMessage::Finished {
        phase: ProgressPhase::Writing,
    });
    drop(tx);
    progress.join();
    written?;

    if json {
        progress.clear();
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    progress.finish_with_summary(started.elapsed(), &result, compile_db.files().len());
    if !result.is_empty() {
        ui::section("Changes");
        for package in &result.new_packages {
            ui::package_change(Change::Added, package);
        }
        for package in &result.deleted_packages {
            ui::package_change(Change::Deleted, package);
        }
        for file in &result.new_files {
            ui::file_change(Change::Added, file);
        }
        for file in &result.modified_files {
            ui::file_change(Change::Modified, file);
        }
        for file in &result.deleted_files {
            ui::file_change(Change::Deleted, file);
        }
    }
    ui::timing(&format!("{:.2?}", started.elapsed()));
    Ok(())
}

fn open_node_storage(db_path: &Path) -> anyhow::Result<NodeStorage> {
    if !db_path.exists() {
        return Err(lakosgraph::Error::MissingDatabase(db_path.to_path_buf()).into());
    }
    let mut ns = NodeStorage::new()?;
    ns.set_database_source_path(db_path)?;
    Ok(ns)
}

fn print_tree(ns: &mut NodeStorage, uid: UniqueId, depth: usize, max_depth: usize) -> anyhow::Result<()> {
    let Some(name) = ns.find_by_id(uid)?.map(|n| n.qualified_name().to_string()) else {
        return Ok(());
    };
    let is_group = ns.is_package_group(uid)?;
    ui::tree_node(depth, uid.kind, &name, is_group);
    if depth >= max_depth {
        return Ok(());
    }
    for child in ns.children(uid)? {
        print_tree(ns, child, depth + 1, max_depth)?;
    }
    Ok(())
}
