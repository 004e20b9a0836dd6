//! Database schema definitions
//!
//! One table per entity kind, one table per relationship kind. Every entity
//! table carries a `version` column reserved for migrations.

/// Version written to `db_option` under [`KEY_VERSION`]
pub const CURRENT_VERSION: i64 = 3;

pub const KEY_DATABASE_STATE: i64 = 1;
pub const KEY_VERSION: i64 = 2;

pub const CREATE_REPOSITORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS source_repository (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL UNIQUE,
    disk_path TEXT NOT NULL DEFAULT ''
)
"#;

pub const CREATE_PACKAGE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS source_package (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    parent_id INTEGER REFERENCES source_package(id) ON DELETE CASCADE,
    source_repository_id INTEGER REFERENCES source_repository(id) ON DELETE SET NULL,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL UNIQUE,
    disk_path TEXT NOT NULL DEFAULT ''
)
"#;

pub const CREATE_COMPONENT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS source_component (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    qualified_name TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    package_id INTEGER REFERENCES source_package(id) ON DELETE CASCADE
)
"#;

pub const CREATE_FILE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS source_file (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    package_id INTEGER REFERENCES source_package(id) ON DELETE CASCADE,
    component_id INTEGER REFERENCES source_component(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL UNIQUE,
    is_header INTEGER NOT NULL DEFAULT 0,
    hash TEXT NOT NULL DEFAULT ''
)
"#;

pub const CREATE_ERROR_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS error_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    error_kind INTEGER NOT NULL,
    fully_qualified_name TEXT NOT NULL,
    error_message TEXT NOT NULL,
    file_name TEXT NOT NULL,
    UNIQUE(fully_qualified_name, error_message, file_name)
)
"#;

pub const CREATE_NAMESPACE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS namespace_declaration (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    parent_id INTEGER REFERENCES namespace_declaration(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL UNIQUE
)
"#;

pub const CREATE_VARIABLE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS variable_declaration (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    namespace_id INTEGER REFERENCES namespace_declaration(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL UNIQUE,
    signature TEXT NOT NULL DEFAULT '',
    is_global INTEGER NOT NULL DEFAULT 0
)
"#;

pub const CREATE_FUNCTION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS function_declaration (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    namespace_id INTEGER REFERENCES namespace_declaration(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL,
    signature TEXT NOT NULL DEFAULT '',
    return_type TEXT NOT NULL DEFAULT '',
    template_parameters TEXT NOT NULL DEFAULT '',
    UNIQUE(qualified_name, signature, template_parameters, return_type)
)
"#;

/// `class_namespace_id` is the enclosing class of a nested type
pub const CREATE_CLASS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS class_declaration (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    parent_namespace_id INTEGER REFERENCES namespace_declaration(id) ON DELETE SET NULL,
    class_namespace_id INTEGER REFERENCES class_declaration(id) ON DELETE CASCADE,
    parent_package_id INTEGER REFERENCES source_package(id) ON DELETE SET NULL,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL UNIQUE,
    kind INTEGER NOT NULL DEFAULT 0,
    access INTEGER NOT NULL DEFAULT 3
)
"#;

pub const CREATE_FIELD_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS field_declaration (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    class_id INTEGER REFERENCES class_declaration(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL UNIQUE,
    signature TEXT NOT NULL DEFAULT '',
    access INTEGER NOT NULL DEFAULT 3,
    is_static INTEGER NOT NULL DEFAULT 0
)
"#;

pub const CREATE_METHOD_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS method_declaration (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL DEFAULT 0,
    class_id INTEGER REFERENCES class_declaration(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL,
    signature TEXT NOT NULL DEFAULT '',
    return_type TEXT NOT NULL DEFAULT '',
    template_parameters TEXT NOT NULL DEFAULT '',
    access INTEGER NOT NULL DEFAULT 3,
    is_virtual INTEGER NOT NULL DEFAULT 0,
    is_pure INTEGER NOT NULL DEFAULT 0,
    is_static INTEGER NOT NULL DEFAULT 0,
    is_const INTEGER NOT NULL DEFAULT 0,
    UNIQUE(qualified_name, signature, template_parameters, return_type)
)
"#;

pub const CREATE_DB_OPTION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS db_option (
    key INTEGER PRIMARY KEY,
    value INTEGER NOT NULL
)
"#;

/// Relationship tables: (table, source column, source table, target column, target table)
pub const EDGE_TABLES: &[(&str, &str, &str, &str, &str)] = &[
    ("dependencies", "source_id", "source_package", "target_id", "source_package"),
    ("allowed_dependencies", "source_id", "source_package", "target_id", "source_package"),
    ("component_relation", "source_id", "source_component", "target_id", "source_component"),
    ("includes", "source_id", "source_file", "target_id", "source_file"),
    ("class_hierarchy", "source_id", "class_declaration", "target_id", "class_declaration"),
    ("uses_in_the_interface", "source_id", "class_declaration", "target_id", "class_declaration"),
    ("uses_in_the_implementation", "source_id", "class_declaration", "target_id", "class_declaration"),
    ("udt_component", "udt_id", "class_declaration", "component_id", "source_component"),
    ("class_source_file", "class_id", "class_declaration", "source_file_id", "source_file"),
    ("namespace_source_file", "source_file_id", "source_file", "namespace_id", "namespace_declaration"),
    ("global_function_source_file", "source_file_id", "source_file", "function_id", "function_declaration"),
    ("field_type", "field_id", "field_declaration", "type_class_id", "class_declaration"),
    ("method_argument_class", "method_id", "method_declaration", "type_class_id", "class_declaration"),
    ("function_calls", "caller_id", "function_declaration", "callee_id", "function_declaration"),
];

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_package_parent ON source_package(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_component_package ON source_component(package_id)",
    "CREATE INDEX IF NOT EXISTS idx_file_component ON source_file(component_id)",
    "CREATE INDEX IF NOT EXISTS idx_namespace_parent ON namespace_declaration(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_class_parent ON class_declaration(class_namespace_id)",
    "CREATE INDEX IF NOT EXISTS idx_field_class ON field_declaration(class_id)",
    "CREATE INDEX IF NOT EXISTS idx_method_class ON method_declaration(class_id)",
];

fn edge_table_statement(table: &str, source: &str, source_table: &str, target: &str, target_table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    {source} INTEGER NOT NULL REFERENCES {source_table}(id) ON DELETE CASCADE,
    {target} INTEGER NOT NULL REFERENCES {target_table}(id) ON DELETE CASCADE,
    UNIQUE({source}, {target})
)"
    )
}

/// All schema creation statements, entity tables first
pub fn all_schema_statements() -> Vec<String> {
    let mut stmts: Vec<String> = [
        CREATE_REPOSITORY_TABLE,
        CREATE_PACKAGE_TABLE,
        CREATE_COMPONENT_TABLE,
        CREATE_FILE_TABLE,
        CREATE_ERROR_TABLE,
        CREATE_NAMESPACE_TABLE,
        CREATE_VARIABLE_TABLE,
        CREATE_FUNCTION_TABLE,
        CREATE_CLASS_TABLE,
        CREATE_FIELD_TABLE,
        CREATE_METHOD_TABLE,
        CREATE_DB_OPTION_TABLE,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    stmts.extend(
        EDGE_TABLES
            .iter()
            .map(|(t, s, st, d, dt)| edge_table_statement(t, s, st, d, dt)),
    );
    stmts.extend(CREATE_INDEXES.iter().map(|s| s.to_string()));
    stmts
}

/// Tables reported by `stats`, in display order
pub const COUNTED_TABLES: &[&str] = &[
    "source_repository",
    "source_package",
    "source_component",
    "source_file",
    "error_messages",
    "namespace_declaration",
    "variable_declaration",
    "function_declaration",
    "class_declaration",
    "field_declaration",
    "method_declaration",
    "dependencies",
    "allowed_dependencies",
    "component_relation",
    "includes",
    "class_hierarchy",
    "uses_in_the_interface",
    "uses_in_the_implementation",
];
