use crate::storage::{DbStats, RawQueryResult};
use tabled::builder::Builder;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub metric: String,
    #[tabled(rename = "Rows")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

/// Row counts of every table, followed by the database version and state.
pub fn stats_table(stats: &DbStats) -> String {
    let mut builder = TableBuilder::new();
    for (table, count) in &stats.tables {
        builder.add_row(table, &count.to_string());
    }
    builder.add_row(
        "version",
        &stats.version.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
    );
    builder.add_row(
        "state",
        &stats.state.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string()),
    );
    builder.build()
}

/// Arbitrary query results, one column per selected column.
pub fn query_table(result: &RawQueryResult) -> String {
    if result.columns.is_empty() {
        return String::new();
    }
    let mut builder = Builder::default();
    builder.push_record(result.columns.iter().cloned());
    for row in &result.data {
        builder.push_record(row.iter().cloned());
    }
    builder.build().with(Style::rounded()).to_string()
}
