//! Writes an [`ObjectStore`] to the database.
//!
//! Rows are matched by qualified name (composite key for callables), so
//! writing the same graph twice changes nothing. Entity rows go first, each
//! after its parents, then the relationship tables, then `db_option`.

use super::schema;
use super::sqlite::SqliteStore;
use crate::store::ids::*;
use crate::store::{ObjectStore, StoreData};
use crate::Result;
use rusqlite::{params, Connection, OptionalExtension, Params};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

const CALLABLE_KEY: &str = "qualified_name, signature, template_parameters, return_type";

impl SqliteStore {
    /// Persist the whole store in one transaction.
    pub fn write_store(&mut self, store: &ObjectStore) -> Result<()> {
        let data = store.read();
        let tx = self.conn.transaction()?;
        {
            let mut writer = RowWriter::new(&tx, &data);
            writer.write_entities()?;
            let edges = writer.write_edges()?;
            let pruned = writer.prune_stale()?;
            debug!(
                packages = writer.packages.len(),
                files = writer.files.len(),
                types = writer.types.len(),
                edges,
                pruned,
                "Wrote store"
            );
        }
        tx.execute(
            "INSERT OR IGNORE INTO db_option (key, value) VALUES (?1, ?2)",
            params![schema::KEY_VERSION, schema::CURRENT_VERSION],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO db_option (key, value) VALUES (?1, ?2)",
            params![schema::KEY_DATABASE_STATE, data.state.as_i64()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn find_id<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<i64>> {
    conn.query_row(sql, params, |row| row.get(0))
        .optional()
        .map_err(Into::into)
}

/// Store id -> row id maps, filled as rows are found or inserted.
struct RowWriter<'a> {
    conn: &'a Connection,
    data: &'a StoreData,
    repositories: HashMap<RepositoryId, i64>,
    packages: HashMap<PackageId, i64>,
    components: HashMap<ComponentId, i64>,
    files: HashMap<FileId, i64>,
    namespaces: HashMap<NamespaceId, i64>,
    types: HashMap<TypeId, i64>,
    functions: HashMap<FunctionId, i64>,
    methods: HashMap<MethodId, i64>,
    fields: HashMap<FieldId, i64>,
}

impl<'a> RowWriter<'a> {
    fn new(conn: &'a Connection, data: &'a StoreData) -> Self {
        Self {
            conn,
            data,
            repositories: HashMap::new(),
            packages: HashMap::new(),
            components: HashMap::new(),
            files: HashMap::new(),
            namespaces: HashMap::new(),
            types: HashMap::new(),
            functions: HashMap::new(),
            methods: HashMap::new(),
            fields: HashMap::new(),
        }
    }

    fn write_entities(&mut self) -> Result<()> {
        let data = self.data;
        for id in data.repositories.ids() {
            self.repository(id)?;
        }
        for id in data.packages.ids() {
            self.package(id)?;
        }
        for id in data.components.ids() {
            self.component(id)?;
        }
        for id in data.files.ids() {
            self.file(id)?;
        }
        self.errors()?;
        for id in data.namespaces.ids() {
            self.namespace(id)?;
        }
        self.variables()?;
        for id in data.functions.ids() {
            self.function(id)?;
        }
        for id in data.types.ids() {
            self.udt(id)?;
        }
        for id in data.fields.ids() {
            self.field(id)?;
        }
        for id in data.methods.ids() {
            self.method(id)?;
        }
        Ok(())
    }

    // ========== Physical rows ==========

    fn repository(&mut self, id: RepositoryId) -> Result<Option<i64>> {
        if let Some(&row) = self.repositories.get(&id) {
            return Ok(Some(row));
        }
        let data = self.data;
        let Some(repo) = data.repositories.read(id) else {
            return Ok(None);
        };
        let row = match find_id(
            self.conn,
            "SELECT id FROM source_repository WHERE qualified_name = ?1",
            [&repo.name],
        )? {
            Some(row) => row,
            None => {
                self.conn.execute(
                    "INSERT INTO source_repository (name, qualified_name, disk_path) VALUES (?1, ?1, ?2)",
                    params![repo.name, repo.disk_path],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.repositories.insert(id, row);
        Ok(Some(row))
    }

    fn package(&mut self, id: PackageId) -> Result<Option<i64>> {
        if let Some(&row) = self.packages.get(&id) {
            return Ok(Some(row));
        }
        let data = self.data;
        let Some(pkg) = data.packages.read(id) else {
            return Ok(None);
        };
        let parent = match pkg.parent {
            Some(p) => self.package(p)?,
            None => None,
        };
        let repository = match pkg.repository {
            Some(r) => self.repository(r)?,
            None => None,
        };
        let row = match find_id(
            self.conn,
            "SELECT id FROM source_package WHERE qualified_name = ?1",
            [&pkg.qualified_name],
        )? {
            Some(row) => row,
            None => {
                self.conn.execute(
                    "INSERT INTO source_package (parent_id, source_repository_id, name, qualified_name, disk_path)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![parent, repository, pkg.name, pkg.qualified_name, pkg.disk_path],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.packages.insert(id, row);
        Ok(Some(row))
    }

    fn component(&mut self, id: ComponentId) -> Result<Option<i64>> {
        if let Some(&row) = self.components.get(&id) {
            return Ok(Some(row));
        }
        let data = self.data;
        let Some(comp) = data.components.read(id) else {
            return Ok(None);
        };
        let package = match comp.package {
            Some(p) => self.package(p)?,
            None => None,
        };
        let row = match find_id(
            self.conn,
            "SELECT id FROM source_component WHERE qualified_name = ?1",
            [&comp.qualified_name],
        )? {
            Some(row) => row,
            None => {
                self.conn.execute(
                    "INSERT INTO source_component (qualified_name, name, package_id) VALUES (?1, ?2, ?3)",
                    params![comp.qualified_name, comp.name, package],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.components.insert(id, row);
        Ok(Some(row))
    }

    fn file(&mut self, id: FileId) -> Result<Option<i64>> {
        if let Some(&row) = self.files.get(&id) {
            return Ok(Some(row));
        }
        let data = self.data;
        let Some(file) = data.files.read(id) else {
            return Ok(None);
        };
        let package = match file.package {
            Some(p) => self.package(p)?,
            None => None,
        };
        let component = match file.component {
            Some(c) => self.component(c)?,
            None => None,
        };
        let row = match find_id(
            self.conn,
            "SELECT id FROM source_file WHERE qualified_name = ?1",
            [&file.qualified_name],
        )? {
            Some(row) => {
                self.conn.execute(
                    "UPDATE source_file SET hash = ?1 WHERE id = ?2 AND hash != ?1",
                    params![file.hash, row],
                )?;
                row
            }
            None => {
                self.conn.execute(
                    "INSERT INTO source_file (package_id, component_id, name, qualified_name, is_header, hash)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![package, component, file.name, file.qualified_name, file.is_header, file.hash],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.files.insert(id, row);
        Ok(Some(row))
    }

    fn errors(&mut self) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO error_messages (error_kind, fully_qualified_name, error_message, file_name)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for id in self.data.errors.ids() {
            if let Some(err) = self.data.errors.read(id) {
                stmt.execute(params![err.kind.as_i64(), err.qualified_name, err.message, err.file_name])?;
            }
        }
        Ok(())
    }

    // ========== Logical rows ==========

    fn namespace(&mut self, id: NamespaceId) -> Result<Option<i64>> {
        if let Some(&row) = self.namespaces.get(&id) {
            return Ok(Some(row));
        }
        let data = self.data;
        let Some(ns) = data.namespaces.read(id) else {
            return Ok(None);
        };
        let parent = match ns.parent {
            Some(p) => self.namespace(p)?,
            None => None,
        };
        let row = match find_id(
            self.conn,
            "SELECT id FROM namespace_declaration WHERE qualified_name = ?1",
            [&ns.qualified_name],
        )? {
            Some(row) => row,
            None => {
                self.conn.execute(
                    "INSERT INTO namespace_declaration (parent_id, name, qualified_name) VALUES (?1, ?2, ?3)",
                    params![parent, ns.name, ns.qualified_name],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.namespaces.insert(id, row);
        Ok(Some(row))
    }

    fn variables(&mut self) -> Result<()> {
        let data = self.data;
        for id in data.variables.ids() {
            let Some(var) = data.variables.read(id) else {
                continue;
            };
            let namespace = match var.parent_namespace {
                Some(n) => self.namespace(n)?,
                None => None,
            };
            self.conn.execute(
                "INSERT OR IGNORE INTO variable_declaration (namespace_id, name, qualified_name, signature, is_global)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![namespace, var.name, var.qualified_name, var.signature, var.is_global],
            )?;
        }
        Ok(())
    }

    fn function(&mut self, id: FunctionId) -> Result<Option<i64>> {
        if let Some(&row) = self.functions.get(&id) {
            return Ok(Some(row));
        }
        let data = self.data;
        let Some(func) = data.functions.read(id) else {
            return Ok(None);
        };
        let namespace = match func.parent_namespace {
            Some(n) => self.namespace(n)?,
            None => None,
        };
        let row = match find_id(
            self.conn,
            "SELECT id FROM function_declaration
             WHERE qualified_name = ?1 AND signature = ?2 AND template_parameters = ?3 AND return_type = ?4",
            params![func.qualified_name, func.signature, func.template_parameters, func.return_type],
        )? {
            Some(row) => row,
            None => {
                self.conn.execute(
                    "INSERT INTO function_declaration
                     (namespace_id, name, qualified_name, signature, return_type, template_parameters)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        namespace,
                        func.name,
                        func.qualified_name,
                        func.signature,
                        func.return_type,
                        func.template_parameters
                    ],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.functions.insert(id, row);
        Ok(Some(row))
    }

    fn udt(&mut self, id: TypeId) -> Result<Option<i64>> {
        if let Some(&row) = self.types.get(&id) {
            return Ok(Some(row));
        }
        let data = self.data;
        let Some(udt) = data.types.read(id) else {
            return Ok(None);
        };
        let namespace = match udt.parent_namespace {
            Some(n) => self.namespace(n)?,
            None => None,
        };
        let parent = match udt.parent {
            Some(p) => self.udt(p)?,
            None => None,
        };
        let package = match udt.package {
            Some(p) => self.package(p)?,
            None => None,
        };
        let row = match find_id(
            self.conn,
            "SELECT id FROM class_declaration WHERE qualified_name = ?1",
            [&udt.qualified_name],
        )? {
            Some(row) => row,
            None => {
                self.conn.execute(
                    "INSERT INTO class_declaration
                     (parent_namespace_id, class_namespace_id, parent_package_id, name, qualified_name, kind, access)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        namespace,
                        parent,
                        package,
                        udt.name,
                        udt.qualified_name,
                        udt.kind.as_i64(),
                        udt.access.as_i64()
                    ],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.types.insert(id, row);
        Ok(Some(row))
    }

    fn field(&mut self, id: FieldId) -> Result<Option<i64>> {
        if let Some(&row) = self.fields.get(&id) {
            return Ok(Some(row));
        }
        let data = self.data;
        let Some(field) = data.fields.read(id) else {
            return Ok(None);
        };
        let class = match field.parent {
            Some(t) => self.udt(t)?,
            None => None,
        };
        let row = match find_id(
            self.conn,
            "SELECT id FROM field_declaration WHERE qualified_name = ?1",
            [&field.qualified_name],
        )? {
            Some(row) => row,
            None => {
                self.conn.execute(
                    "INSERT INTO field_declaration (class_id, name, qualified_name, signature, access, is_static)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        class,
                        field.name,
                        field.qualified_name,
                        field.signature,
                        field.access.as_i64(),
                        field.is_static
                    ],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.fields.insert(id, row);
        Ok(Some(row))
    }

    fn method(&mut self, id: MethodId) -> Result<Option<i64>> {
        if let Some(&row) = self.methods.get(&id) {
            return Ok(Some(row));
        }
        let data = self.data;
        let Some(method) = data.methods.read(id) else {
            return Ok(None);
        };
        let class = match method.parent {
            Some(t) => self.udt(t)?,
            None => None,
        };
        let row = match find_id(
            self.conn,
            "SELECT id FROM method_declaration
             WHERE qualified_name = ?1 AND signature = ?2 AND template_parameters = ?3 AND return_type = ?4",
            params![method.qualified_name, method.signature, method.template_parameters, method.return_type],
        )? {
            Some(row) => row,
            None => {
                self.conn.execute(
                    "INSERT INTO method_declaration
                     (class_id, name, qualified_name, signature, return_type, template_parameters,
                      access, is_virtual, is_pure, is_static, is_const)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        class,
                        method.name,
                        method.qualified_name,
                        method.signature,
                        method.return_type,
                        method.template_parameters,
                        method.access.as_i64(),
                        method.is_virtual,
                        method.is_pure,
                        method.is_static,
                        method.is_const
                    ],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.methods.insert(id, row);
        Ok(Some(row))
    }

    // ========== Relationships ==========

    /// Fill every relationship table; returns the number of new rows.
    fn write_edges(&self) -> Result<usize> {
        let data = self.data;
        let mut written = 0;

        let mut dependencies = Vec::new();
        let mut allowed = Vec::new();
        for (id, &row) in &self.packages {
            if let Some(pkg) = data.packages.read(*id) {
                dependencies.extend(pairs(row, &pkg.providers, &self.packages));
                allowed.extend(pairs(row, &pkg.allowed_providers, &self.packages));
            }
        }
        written += self.insert_edges("dependencies", &dependencies)?;
        written += self.insert_edges("allowed_dependencies", &allowed)?;

        let mut components = Vec::new();
        for (id, &row) in &self.components {
            if let Some(comp) = data.components.read(*id) {
                components.extend(pairs(row, &comp.providers, &self.components));
            }
        }
        written += self.insert_edges("component_relation", &components)?;

        let mut includes = Vec::new();
        let mut namespace_files = Vec::new();
        let mut function_files = Vec::new();
        for (id, &row) in &self.files {
            if let Some(file) = data.files.read(*id) {
                includes.extend(pairs(row, &file.includes, &self.files));
                namespace_files.extend(pairs(row, &file.namespaces, &self.namespaces));
                function_files.extend(pairs(row, &file.functions, &self.functions));
            }
        }
        written += self.insert_edges("includes", &includes)?;
        written += self.insert_edges("namespace_source_file", &namespace_files)?;
        written += self.insert_edges("global_function_source_file", &function_files)?;

        let mut hierarchy = Vec::new();
        let mut interface = Vec::new();
        let mut implementation = Vec::new();
        let mut udt_components = Vec::new();
        let mut udt_files = Vec::new();
        for (id, &row) in &self.types {
            if let Some(udt) = data.types.read(*id) {
                hierarchy.extend(pairs(row, &udt.super_types, &self.types));
                interface.extend(pairs(row, &udt.uses_in_interface, &self.types));
                implementation.extend(pairs(row, &udt.uses_in_implementation, &self.types));
                udt_components.extend(pairs(row, &udt.components, &self.components));
                udt_files.extend(pairs(row, &udt.files, &self.files));
            }
        }
        written += self.insert_edges("class_hierarchy", &hierarchy)?;
        written += self.insert_edges("uses_in_the_interface", &interface)?;
        written += self.insert_edges("uses_in_the_implementation", &implementation)?;
        written += self.insert_edges("udt_component", &udt_components)?;
        written += self.insert_edges("class_source_file", &udt_files)?;

        let mut field_types = Vec::new();
        for (id, &row) in &self.fields {
            if let Some(field) = data.fields.read(*id) {
                field_types.extend(pairs(row, &field.variable_types, &self.types));
            }
        }
        written += self.insert_edges("field_type", &field_types)?;

        let mut arguments = Vec::new();
        for (id, &row) in &self.methods {
            if let Some(method) = data.methods.read(*id) {
                arguments.extend(pairs(row, &method.argument_types, &self.types));
            }
        }
        written += self.insert_edges("method_argument_class", &arguments)?;

        let mut calls = Vec::new();
        for (id, &row) in &self.functions {
            if let Some(func) = data.functions.read(*id) {
                calls.extend(pairs(row, &func.callees, &self.functions));
            }
        }
        written += self.insert_edges("function_calls", &calls)?;

        Ok(written)
    }

    fn insert_edges(&self, table: &str, rows: &[(i64, i64)]) -> Result<usize> {
        let Some((_, source, _, target, _)) = schema::EDGE_TABLES.iter().find(|(t, ..)| *t == table) else {
            return Ok(0);
        };
        let mut stmt = self.conn.prepare_cached(&format!(
            "INSERT OR IGNORE INTO {table} ({source}, {target}) VALUES (?1, ?2)"
        ))?;
        let mut written = 0;
        for (s, t) in rows {
            written += stmt.execute(params![s, t])?;
        }
        Ok(written)
    }

    /// Delete rows the store no longer has, logical ones first.
    fn prune_stale(&self) -> Result<usize> {
        let data = self.data;
        let mut pruned = 0;
        pruned += self.prune_table("field_declaration", "qualified_name", |k| data.get_field(&k[0]).is_some())?;
        pruned += self.prune_table("method_declaration", CALLABLE_KEY, |k| {
            data.get_method(&k[0], &k[1], &k[2], &k[3]).is_some()
        })?;
        pruned += self.prune_table("function_declaration", CALLABLE_KEY, |k| {
            data.get_function(&k[0], &k[1], &k[2], &k[3]).is_some()
        })?;
        pruned += self.prune_table("variable_declaration", "qualified_name", |k| data.get_variable(&k[0]).is_some())?;
        pruned += self.prune_table("class_declaration", "qualified_name", |k| data.get_type(&k[0]).is_some())?;
        pruned += self.prune_table("namespace_declaration", "qualified_name", |k| {
            data.get_namespace(&k[0]).is_some()
        })?;
        pruned += self.prune_table("source_file", "qualified_name", |k| data.get_file(&k[0]).is_some())?;
        pruned += self.prune_table("source_component", "qualified_name", |k| data.get_component(&k[0]).is_some())?;
        pruned += self.prune_table("source_package", "qualified_name", |k| data.get_package(&k[0]).is_some())?;
        Ok(pruned)
    }

    /// Delete the rows of `table` whose key columns `keep` rejects.
    fn prune_table(&self, table: &str, key_columns: &str, keep: impl Fn(&[String]) -> bool) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, {key_columns} FROM {table}"))?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                let mut key = Vec::with_capacity(width - 1);
                for i in 1..width {
                    key.push(row.get::<_, Option<String>>(i)?.unwrap_or_default());
                }
                Ok((row.get::<_, i64>(0)?, key))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let stale: Vec<i64> = rows
            .into_iter()
            .filter(|(_, key)| !keep(key))
            .map(|(id, _)| id)
            .collect();

        let mut delete = self
            .conn
            .prepare(&format!("DELETE FROM {table} WHERE id = ?1"))?;
        let mut pruned = 0;
        for id in stale {
            pruned += delete.execute([id])?;
        }
        Ok(pruned)
    }
}

fn pairs<'m, K: Eq + Hash>(
    source: i64,
    targets: &'m [K],
    rows: &'m HashMap<K, i64>,
) -> impl Iterator<Item = (i64, i64)> + 'm {
    targets
        .iter()
        .filter_map(move |t| rows.get(t).map(|&row| (source, row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{ErrorKind, State, UdtKind};
    use crate::store::{Field, Method, Namespace, Type};
    use std::collections::HashSet;

    fn sample_store() -> ObjectStore {
        let store = ObjectStore::new();
        store.with_write(|data| {
            let repo = data.get_or_add_repository("repo", "/repo");
            let grp = data.get_or_add_package("groups/one", "one", "", None, Some(repo));
            let pkg = data.get_or_add_package("groups/one/onepkg", "onepkg", "", Some(grp), None);
            let other = data.get_or_add_package("groups/one/oneaux", "oneaux", "", Some(grp), None);
            let a = data.get_or_add_component("groups/one/onepkg/onepkg_a", "onepkg_a", Some(pkg));
            let b = data.get_or_add_component("groups/one/oneaux/oneaux_b", "oneaux_b", Some(other));
            let fa = data.get_or_add_file("groups/one/onepkg/onepkg_a.cpp", "onepkg_a.cpp", false, "h1", Some(pkg), Some(a));
            let fb = data.get_or_add_file("groups/one/oneaux/oneaux_b.h", "oneaux_b.h", true, "h2", Some(other), Some(b));
            data.add_include_with_propagation(fa, fb);

            let ns = data.get_or_add_namespace(Namespace::new("one", "one"));
            let base = data.get_or_add_type(Type::new("one::Base", "Base", UdtKind::Class).in_namespace(Some(ns)).in_package(Some(other)));
            let derived = data.get_or_add_type(Type::new("one::Derived", "Derived", UdtKind::Struct).in_namespace(Some(ns)).in_package(Some(pkg)));
            data.add_is_a(derived, base);
            data.add_type_component(base, b);
            data.add_type_file(base, fb);
            let m = data.get_or_add_method(Method::new("one::Derived::take", "take", Some(derived)).with_signature("take(Base)", "void", "").with_flags(true, false, false, true));
            data.add_method_argument_type(m, base);
            let f = data.get_or_add_field(Field::new("one::Derived::b", "b", Some(derived)));
            data.add_field_type(f, base);
            data.get_or_add_error(ErrorKind::ParserError, "", "Unknown file extension", "notes.txt");
            data.state = State::PhysicalReady;
        });
        store
    }

    #[test]
    fn test_double_write_keeps_row_counts() {
        let store = sample_store();
        let mut db = SqliteStore::open_in_memory().unwrap();
        db.write_store(&store).unwrap();
        let first = db.stats().unwrap();
        db.write_store(&store).unwrap();
        let second = db.stats().unwrap();

        assert_eq!(first.tables, second.tables);
        assert_eq!(first.count("source_package"), 3);
        assert_eq!(first.count("dependencies"), 1);
        assert_eq!(first.count("component_relation"), 1);
        assert_eq!(first.count("class_hierarchy"), 1);
        assert_eq!(first.count("error_messages"), 1);
        assert_eq!(second.state, Some(State::PhysicalReady));
        assert_eq!(second.version, Some(schema::CURRENT_VERSION));
    }

    #[test]
    fn test_parent_rows_are_linked() {
        let store = sample_store();
        let mut db = SqliteStore::open_in_memory().unwrap();
        db.write_store(&store).unwrap();

        let parent: String = db
            .conn
            .query_row(
                "SELECT p.qualified_name FROM source_package c JOIN source_package p ON c.parent_id = p.id
                 WHERE c.qualified_name = 'groups/one/onepkg'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(parent, "groups/one");

        let (sub, sup): (String, String) = db
            .conn
            .query_row(
                "SELECT s.name, t.name FROM class_hierarchy h
                 JOIN class_declaration s ON h.source_id = s.id
                 JOIN class_declaration t ON h.target_id = t.id",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!((sub.as_str(), sup.as_str()), ("Derived", "Base"));
    }

    #[test]
    fn test_changed_hash_is_updated() {
        let store = sample_store();
        let mut db = SqliteStore::open_in_memory().unwrap();
        db.write_store(&store).unwrap();

        store.with_write(|data| {
            let id = data.get_file("groups/one/onepkg/onepkg_a.cpp").unwrap();
            data.files.get_mut(id).unwrap().hash = "h3".into();
        });
        db.write_store(&store).unwrap();

        let hash: String = db
            .conn
            .query_row(
                "SELECT hash FROM source_file WHERE qualified_name = 'groups/one/onepkg/onepkg_a.cpp'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hash, "h3");
        assert_eq!(db.count_rows("source_file").unwrap(), 2);
    }

    #[test]
    fn test_removed_files_are_pruned() {
        let store = sample_store();
        let mut db = SqliteStore::open_in_memory().unwrap();
        db.write_store(&store).unwrap();

        let removed = store.with_write(|data| {
            let id = data.get_file("groups/one/oneaux/oneaux_b.h").unwrap();
            data.remove_file(id, &mut HashSet::new())
        });
        assert!(removed.contains(&"groups/one/oneaux/oneaux_b.h".to_string()));
        db.write_store(&store).unwrap();

        let files = db.raw_query("SELECT qualified_name FROM source_file").unwrap();
        assert!(files.data.is_empty());
        let packages = db.raw_query("SELECT qualified_name FROM source_package").unwrap();
        assert_eq!(
            packages.data.len(),
            store.read().packages.len(),
        );
    }

    #[test]
    fn test_removed_types_stay_gone_after_reload() {
        let store = sample_store();
        let mut db = SqliteStore::open_in_memory().unwrap();
        db.write_store(&store).unwrap();
        assert_eq!(db.count_rows("class_declaration").unwrap(), 2);

        store.with_write(|data| {
            let id = data.get_file("groups/one/oneaux/oneaux_b.h").unwrap();
            data.remove_file(id, &mut HashSet::new());
        });
        assert!(store.read().get_type("one::Base").is_none());
        db.write_store(&store).unwrap();

        assert_eq!(db.count_rows("class_declaration").unwrap(), 1);
        assert_eq!(db.count_rows("class_hierarchy").unwrap(), 0);
        assert_eq!(db.count_rows("method_declaration").unwrap(), 1);
        assert_eq!(db.count_rows("field_declaration").unwrap(), 1);

        let reloaded = ObjectStore::new();
        db.read_into(&reloaded).unwrap();
        let data = reloaded.read();
        assert!(data.get_type("one::Base").is_none());
        assert!(data.get_type("one::Derived").is_some());
        assert!(data.get_namespace("one").is_some());
    }

    #[test]
    fn test_removed_callables_are_pruned_by_signature() {
        let store = sample_store();
        store.with_write(|data| {
            let derived = data.get_type("one::Derived");
            data.get_or_add_method(Method::new("one::Derived::take", "take", derived).with_signature("take(int)", "void", ""));
        });
        let mut db = SqliteStore::open_in_memory().unwrap();
        db.write_store(&store).unwrap();
        assert_eq!(db.count_rows("method_declaration").unwrap(), 2);

        store.with_write(|data| {
            let id = data.get_method("one::Derived::take", "take(int)", "", "void").unwrap();
            data.remove_method(id, &mut HashSet::new());
        });
        db.write_store(&store).unwrap();

        let left = db.raw_query("SELECT signature FROM method_declaration").unwrap();
        assert_eq!(left.data, vec![vec!["take(Base)".to_string()]]);
    }
}
