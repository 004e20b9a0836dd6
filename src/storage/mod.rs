//! SQLite persistence of the code model
//!
//! `writer` and `reader` move a whole [`crate::ObjectStore`] in and out of the
//! database. `handler` works on single rows and backs the node storage.

pub mod handler;
mod reader;
pub mod schema;
pub mod sqlite;
mod writer;

pub use handler::{ComponentFields, FunctionFields, PackageFields, RepositoryFields, TypeFields};
pub use sqlite::{DbStats, RawQueryResult, SqliteStore};
