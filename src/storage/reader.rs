//! Loads a database into an [`ObjectStore`].
//!
//! The model is rebuilt in a fresh [`StoreData`] and swapped in at the end,
//! so a failed read leaves the store as it was.

use super::schema;
use super::sqlite::SqliteStore;
use crate::kinds::{AccessSpecifier, ErrorKind, State, UdtKind};
use crate::store::ids::*;
use crate::store::{Field, Function, Method, Namespace, ObjectStore, StoreData, Type, Variable};
use crate::Result;
use std::collections::HashMap;
use tracing::debug;

/// Row id -> store id maps built while loading entities.
#[derive(Default)]
struct IdMaps {
    repositories: HashMap<i64, RepositoryId>,
    packages: HashMap<i64, PackageId>,
    components: HashMap<i64, ComponentId>,
    files: HashMap<i64, FileId>,
    namespaces: HashMap<i64, NamespaceId>,
    types: HashMap<i64, TypeId>,
    functions: HashMap<i64, FunctionId>,
    methods: HashMap<i64, MethodId>,
    fields: HashMap<i64, FieldId>,
}

fn lookup<T: Copy>(map: &HashMap<i64, T>, row: Option<i64>) -> Option<T> {
    row.and_then(|r| map.get(&r).copied())
}

impl SqliteStore {
    /// Replace the contents of `store` with the database contents.
    pub fn read_into(&self, store: &ObjectStore) -> Result<()> {
        let mut data = StoreData::default();
        let mut ids = IdMaps::default();

        self.read_physical(&mut data, &mut ids)?;
        self.read_logical(&mut data, &mut ids)?;
        self.read_edges(&mut data, &ids)?;

        data.state = self
            .db_option(schema::KEY_DATABASE_STATE)?
            .map(State::from_i64)
            .unwrap_or_default();

        debug!(
            packages = data.packages.len(),
            files = data.files.len(),
            types = data.types.len(),
            state = %data.state,
            "Read store"
        );
        store.replace(data);
        Ok(())
    }

    fn read_physical(&self, data: &mut StoreData, ids: &mut IdMaps) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, disk_path FROM source_repository ORDER BY id")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            let disk_path: String = row.get(2)?;
            let id = data.get_or_add_repository(&name, &disk_path);
            ids.repositories.insert(row.get(0)?, id);
        }

        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE tree(id, depth) AS (
                 SELECT id, 0 FROM source_package WHERE parent_id IS NULL
                 UNION ALL
                 SELECT p.id, tree.depth + 1 FROM source_package p JOIN tree ON p.parent_id = tree.id
             )
             SELECT p.id, p.parent_id, p.source_repository_id, p.name, p.qualified_name, p.disk_path
             FROM source_package p JOIN tree ON p.id = tree.id
             ORDER BY tree.depth, p.id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let parent = lookup(&ids.packages, row.get(1)?);
            let repository = lookup(&ids.repositories, row.get(2)?);
            let name: String = row.get(3)?;
            let qualified_name: String = row.get(4)?;
            let disk_path: String = row.get(5)?;
            let id = data.get_or_add_package(&qualified_name, &name, &disk_path, parent, repository);
            ids.packages.insert(row.get(0)?, id);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, qualified_name, name, package_id FROM source_component ORDER BY id")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let qualified_name: String = row.get(1)?;
            let name: String = row.get(2)?;
            let package = lookup(&ids.packages, row.get(3)?);
            let id = data.get_or_add_component(&qualified_name, &name, package);
            ids.components.insert(row.get(0)?, id);
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, package_id, component_id, name, qualified_name, is_header, hash
             FROM source_file ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let package = lookup(&ids.packages, row.get(1)?);
            let component = lookup(&ids.components, row.get(2)?);
            let name: String = row.get(3)?;
            let qualified_name: String = row.get(4)?;
            let is_header: bool = row.get(5)?;
            let hash: String = row.get(6)?;
            let id = data.get_or_add_file(&qualified_name, &name, is_header, &hash, package, component);
            ids.files.insert(row.get(0)?, id);
        }

        let mut stmt = self.conn.prepare(
            "SELECT error_kind, fully_qualified_name, error_message, file_name FROM error_messages ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let kind = ErrorKind::from_i64(row.get(0)?);
            let qualified_name: String = row.get(1)?;
            let message: String = row.get(2)?;
            let file_name: String = row.get(3)?;
            data.get_or_add_error(kind, &qualified_name, &message, &file_name);
        }
        Ok(())
    }

    fn read_logical(&self, data: &mut StoreData, ids: &mut IdMaps) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE tree(id, depth) AS (
                 SELECT id, 0 FROM namespace_declaration WHERE parent_id IS NULL
                 UNION ALL
                 SELECT n.id, tree.depth + 1 FROM namespace_declaration n JOIN tree ON n.parent_id = tree.id
             )
             SELECT n.id, n.parent_id, n.name, n.qualified_name
             FROM namespace_declaration n JOIN tree ON n.id = tree.id
             ORDER BY tree.depth, n.id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let parent = lookup(&ids.namespaces, row.get(1)?);
            let name: String = row.get(2)?;
            let qualified_name: String = row.get(3)?;
            let id = data.get_or_add_namespace(Namespace::new(qualified_name, name).with_parent(parent));
            ids.namespaces.insert(row.get(0)?, id);
        }

        let mut stmt = self.conn.prepare(
            "SELECT namespace_id, name, qualified_name, signature, is_global FROM variable_declaration ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let namespace = lookup(&ids.namespaces, row.get(0)?);
            let variable = Variable::new(row.get::<_, String>(2)?, row.get::<_, String>(1)?)
                .with_signature(row.get::<_, String>(3)?)
                .global(row.get(4)?)
                .in_namespace(namespace);
            data.get_or_add_variable(variable);
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, namespace_id, name, qualified_name, signature, return_type, template_parameters
             FROM function_declaration ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let namespace = lookup(&ids.namespaces, row.get(1)?);
            let function = Function::new(row.get::<_, String>(3)?, row.get::<_, String>(2)?)
                .with_signature(
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                )
                .in_namespace(namespace);
            let id = data.get_or_add_function(function);
            ids.functions.insert(row.get(0)?, id);
        }

        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE tree(id, depth) AS (
                 SELECT id, 0 FROM class_declaration WHERE class_namespace_id IS NULL
                 UNION ALL
                 SELECT c.id, tree.depth + 1 FROM class_declaration c JOIN tree ON c.class_namespace_id = tree.id
             )
             SELECT c.id, c.parent_namespace_id, c.class_namespace_id, c.parent_package_id,
                    c.name, c.qualified_name, c.kind, c.access
             FROM class_declaration c JOIN tree ON c.id = tree.id
             ORDER BY tree.depth, c.id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let udt = Type::new(
                row.get::<_, String>(5)?,
                row.get::<_, String>(4)?,
                UdtKind::from_i64(row.get(6)?),
            )
            .with_access(AccessSpecifier::from_i64(row.get(7)?))
            .in_namespace(lookup(&ids.namespaces, row.get(1)?))
            .nested_in(lookup(&ids.types, row.get(2)?))
            .in_package(lookup(&ids.packages, row.get(3)?));
            let id = data.get_or_add_type(udt);
            ids.types.insert(row.get(0)?, id);
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, class_id, name, qualified_name, signature, access, is_static
             FROM field_declaration ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let parent = lookup(&ids.types, row.get(1)?);
            let field = Field::new(row.get::<_, String>(3)?, row.get::<_, String>(2)?, parent)
                .with_signature(row.get::<_, String>(4)?)
                .with_access(AccessSpecifier::from_i64(row.get(5)?))
                .with_static(row.get(6)?);
            let id = data.get_or_add_field(field);
            ids.fields.insert(row.get(0)?, id);
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, class_id, name, qualified_name, signature, return_type, template_parameters,
                    access, is_virtual, is_pure, is_static, is_const
             FROM method_declaration ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let parent = lookup(&ids.types, row.get(1)?);
            let method = Method::new(row.get::<_, String>(3)?, row.get::<_, String>(2)?, parent)
                .with_signature(
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                )
                .with_access(AccessSpecifier::from_i64(row.get(7)?))
                .with_flags(row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?);
            let id = data.get_or_add_method(method);
            ids.methods.insert(row.get(0)?, id);
        }
        Ok(())
    }

    fn edge_rows(&self, table: &str) -> Result<Vec<(i64, i64)>> {
        let Some((_, source, _, target, _)) = schema::EDGE_TABLES.iter().find(|(t, ..)| *t == table) else {
            return Ok(Vec::new());
        };
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {source}, {target} FROM {table} ORDER BY id"))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn read_edges(&self, data: &mut StoreData, ids: &IdMaps) -> Result<()> {
        let rows = |table: &str| self.edge_rows(table);

        // Rows whose ends did not load are skipped.
        macro_rules! wire {
            ($table:expr, $from:ident, $to:ident, $add:ident) => {
                for (s, t) in rows($table)? {
                    if let (Some(&a), Some(&b)) = (ids.$from.get(&s), ids.$to.get(&t)) {
                        data.$add(a, b);
                    }
                }
            };
        }

        wire!("dependencies", packages, packages, add_package_dependency);
        wire!("allowed_dependencies", packages, packages, add_allowed_package_dependency);
        wire!("component_relation", components, components, add_component_dependency);
        wire!("includes", files, files, add_include);
        wire!("class_hierarchy", types, types, add_is_a);
        wire!("uses_in_the_interface", types, types, add_uses_in_interface);
        wire!("uses_in_the_implementation", types, types, add_uses_in_implementation);
        wire!("udt_component", types, components, add_type_component);
        wire!("class_source_file", types, files, add_type_file);
        wire!("field_type", fields, types, add_field_type);
        wire!("method_argument_class", methods, types, add_method_argument_type);
        wire!("function_calls", functions, functions, add_function_call);

        // These two tables are keyed file first.
        for (file, ns) in rows("namespace_source_file")? {
            if let (Some(&f), Some(&n)) = (ids.files.get(&file), ids.namespaces.get(&ns)) {
                data.add_namespace_file(n, f);
            }
        }
        for (file, func) in rows("global_function_source_file")? {
            if let (Some(&f), Some(&g)) = (ids.files.get(&file), ids.functions.get(&func)) {
                data.add_function_file(g, f);
            }
        }
        Ok(())
    }
}
