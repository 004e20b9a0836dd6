//! Terminal output for the CLI

pub mod icons;
pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    file_change, header, info, package_change, section, success, summary_row, timing, tree_line, tree_node,
    warn, Change,
};
pub use progress::{ProgressManager, Spinner};
pub use progress_message::{ProgressMessage, ProgressPhase};
pub use table::{query_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
