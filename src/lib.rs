//! # lakosgraph - Codebase Knowledge Graph
//!
//! Physical and logical structure of large C++ codebases, kept up to date
//! incrementally and persisted to SQLite.
//!
//! lakosgraph provides:
//! - A physical-design classifier mapping file paths to package groups,
//!   packages and components, with pluggable semantic packing rules
//! - An incremental scanner diffing a compilation database against the graph
//! - A concurrent in-memory object store with cascading deletion
//! - A SQLite persistence layer that round-trips the whole graph
//! - A lazy node storage used for interactive, rule-checked editing

pub mod kinds;
pub mod paths;
pub mod config;
pub mod ignore;
pub mod classifier;
pub mod compile_db;
pub mod store;
pub mod storage;
pub mod scanner;
pub mod node_storage;
pub mod ui;

// Re-exports for convenient access
pub use kinds::{
    AccessSpecifier, DiagramType, ErrorKind, FileType, LakosRelationType, PhysicalDependencyType,
    State, UdtKind,
};
pub use classifier::{Classifier, PackageClaim, SemanticRule};
pub use compile_db::{CompilationDatabase, CompilationDatabaseError, CompileCommand};
pub use store::{ObjectStore, StoreData};
pub use storage::SqliteStore;
pub use scanner::{FilesystemScanner, IncrementalResult};
pub use node_storage::{NodeStorage, UniqueId};

/// Result type alias for lakosgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for lakosgraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Compilation database error: {0}")]
    CompilationDatabase(#[from] CompilationDatabaseError),

    #[error("File doesn't exist on disk: {0}")]
    MissingDatabase(std::path::PathBuf),

    #[error("Invalid semantic rule {0}: {1}")]
    InvalidRule(String, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("No database is open")]
    NoDatabase,
}
