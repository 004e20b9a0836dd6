//! Row level access used by the node storage
//!
//! Each `*Fields` struct is one entity row plus the ids of everything
//! directly related to it. Getters return `None` when no row matches.

use super::sqlite::SqliteStore;
use crate::kinds::{AccessSpecifier, DiagramType, UdtKind};
use crate::Result;
use rusqlite::types::ToSql;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepositoryFields {
    pub id: i64,
    pub name: String,
    pub qualified_name: String,
    pub disk_path: String,
    pub child_package_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackageFields {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub repository_id: Option<i64>,
    pub name: String,
    pub qualified_name: String,
    pub disk_path: String,
    pub child_package_ids: Vec<i64>,
    pub child_component_ids: Vec<i64>,
    pub provider_ids: Vec<i64>,
    pub client_ids: Vec<i64>,
    pub allowed_provider_ids: Vec<i64>,
    pub allowed_client_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentFields {
    pub id: i64,
    pub package_id: Option<i64>,
    pub name: String,
    pub qualified_name: String,
    pub provider_ids: Vec<i64>,
    pub client_ids: Vec<i64>,
    pub child_udt_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeFields {
    pub id: i64,
    pub parent_namespace_id: Option<i64>,
    /// Enclosing type of a nested type
    pub class_namespace_id: Option<i64>,
    pub parent_package_id: Option<i64>,
    pub name: String,
    pub qualified_name: String,
    pub kind: UdtKind,
    pub access: AccessSpecifier,
    pub component_ids: Vec<i64>,
    pub nested_type_ids: Vec<i64>,
    /// Types this one derives from
    pub super_type_ids: Vec<i64>,
    pub sub_type_ids: Vec<i64>,
    pub uses_in_interface_ids: Vec<i64>,
    pub used_by_interface_ids: Vec<i64>,
    pub uses_in_implementation_ids: Vec<i64>,
    pub used_by_implementation_ids: Vec<i64>,
    pub field_names: Vec<String>,
    pub method_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunctionFields {
    pub id: i64,
    pub name: String,
    pub qualified_name: String,
    /// Component of the first file declaring the function
    pub component_id: Option<i64>,
    pub callee_ids: Vec<i64>,
    pub caller_ids: Vec<i64>,
}

impl SqliteStore {
    fn ids_where(&self, sql: &str, key: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let ids = stmt
            .query_map([key], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn names_where(&self, sql: &str, key: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let names = stmt
            .query_map([key], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    // ========== Top level ==========

    /// Repositories with a name.
    pub fn top_level_repository_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM source_repository WHERE name != '' ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Packages with neither a parent package nor a repository.
    pub fn top_level_package_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM source_package WHERE parent_id IS NULL AND source_repository_id IS NULL ORDER BY id",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    // ========== Repositories ==========

    pub fn repository_fields_by_id(&self, id: i64) -> Result<Option<RepositoryFields>> {
        self.repository_fields_where("id", &id)
    }

    pub fn repository_fields_by_qualified_name(&self, qualified_name: &str) -> Result<Option<RepositoryFields>> {
        self.repository_fields_where("qualified_name", &qualified_name)
    }

    fn repository_fields_where(&self, column: &str, key: &dyn ToSql) -> Result<Option<RepositoryFields>> {
        let fields = self
            .conn
            .query_row(
                &format!("SELECT id, name, qualified_name, disk_path FROM source_repository WHERE {column} = ?1"),
                [key],
                |row| {
                    Ok(RepositoryFields {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        qualified_name: row.get(2)?,
                        disk_path: row.get(3)?,
                        child_package_ids: Vec::new(),
                    })
                },
            )
            .optional()?;
        let Some(mut fields) = fields else {
            return Ok(None);
        };
        fields.child_package_ids = self.ids_where(
            "SELECT id FROM source_package WHERE source_repository_id = ?1 AND parent_id IS NULL ORDER BY id",
            fields.id,
        )?;
        Ok(Some(fields))
    }

    // ========== Packages ==========

    pub fn package_fields_by_id(&self, id: i64) -> Result<Option<PackageFields>> {
        self.package_fields_where("id", &id)
    }

    pub fn package_fields_by_qualified_name(&self, qualified_name: &str) -> Result<Option<PackageFields>> {
        self.package_fields_where("qualified_name", &qualified_name)
    }

    fn package_fields_where(&self, column: &str, key: &dyn ToSql) -> Result<Option<PackageFields>> {
        let fields = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, parent_id, source_repository_id, name, qualified_name, disk_path
                     FROM source_package WHERE {column} = ?1"
                ),
                [key],
                |row: &Row<'_>| {
                    Ok(PackageFields {
                        id: row.get(0)?,
                        parent_id: row.get(1)?,
                        repository_id: row.get(2)?,
                        name: row.get(3)?,
                        qualified_name: row.get(4)?,
                        disk_path: row.get(5)?,
                        ..Default::default()
                    })
                },
            )
            .optional()?;
        let Some(mut fields) = fields else {
            return Ok(None);
        };
        let id = fields.id;
        fields.child_package_ids = self.package_child_ids(id)?;
        fields.child_component_ids = self.package_component_ids(id)?;
        fields.provider_ids = self.ids_where("SELECT target_id FROM dependencies WHERE source_id = ?1 ORDER BY id", id)?;
        fields.client_ids = self.ids_where("SELECT source_id FROM dependencies WHERE target_id = ?1 ORDER BY id", id)?;
        fields.allowed_provider_ids =
            self.ids_where("SELECT target_id FROM allowed_dependencies WHERE source_id = ?1 ORDER BY id", id)?;
        fields.allowed_client_ids =
            self.ids_where("SELECT source_id FROM allowed_dependencies WHERE target_id = ?1 ORDER BY id", id)?;
        Ok(Some(fields))
    }

    pub fn package_child_ids(&self, id: i64) -> Result<Vec<i64>> {
        self.ids_where("SELECT id FROM source_package WHERE parent_id = ?1 ORDER BY id", id)
    }

    pub fn package_component_ids(&self, id: i64) -> Result<Vec<i64>> {
        self.ids_where("SELECT id FROM source_component WHERE package_id = ?1 ORDER BY id", id)
    }

    /// Insert a package row, returning its id.
    pub fn insert_package(&self, fields: &PackageFields) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO source_package (parent_id, source_repository_id, name, qualified_name, disk_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                fields.parent_id,
                fields.repository_id,
                fields.name,
                fields.qualified_name,
                fields.disk_path
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_package(&self, fields: &PackageFields) -> Result<()> {
        self.conn.execute(
            "UPDATE source_package SET parent_id = ?1, source_repository_id = ?2, name = ?3,
             qualified_name = ?4, disk_path = ?5 WHERE id = ?6",
            params![
                fields.parent_id,
                fields.repository_id,
                fields.name,
                fields.qualified_name,
                fields.disk_path,
                fields.id
            ],
        )?;
        Ok(())
    }

    pub fn remove_package_row(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM source_package WHERE id = ?1", [id])?;
        Ok(())
    }

    // ========== Components ==========

    pub fn component_fields_by_id(&self, id: i64) -> Result<Option<ComponentFields>> {
        self.component_fields_where("id", &id)
    }

    pub fn component_fields_by_qualified_name(&self, qualified_name: &str) -> Result<Option<ComponentFields>> {
        self.component_fields_where("qualified_name", &qualified_name)
    }

    fn component_fields_where(&self, column: &str, key: &dyn ToSql) -> Result<Option<ComponentFields>> {
        let fields = self
            .conn
            .query_row(
                &format!("SELECT id, package_id, name, qualified_name FROM source_component WHERE {column} = ?1"),
                [key],
                |row| {
                    Ok(ComponentFields {
                        id: row.get(0)?,
                        package_id: row.get(1)?,
                        name: row.get(2)?,
                        qualified_name: row.get(3)?,
                        ..Default::default()
                    })
                },
            )
            .optional()?;
        let Some(mut fields) = fields else {
            return Ok(None);
        };
        let id = fields.id;
        fields.provider_ids =
            self.ids_where("SELECT target_id FROM component_relation WHERE source_id = ?1 ORDER BY id", id)?;
        fields.client_ids =
            self.ids_where("SELECT source_id FROM component_relation WHERE target_id = ?1 ORDER BY id", id)?;
        fields.child_udt_ids = self.ids_where(
            "SELECT udt_id FROM udt_component WHERE component_id = ?1 ORDER BY id",
            id,
        )?;
        Ok(Some(fields))
    }

    pub fn insert_component(&self, fields: &ComponentFields) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO source_component (qualified_name, name, package_id) VALUES (?1, ?2, ?3)",
            params![fields.qualified_name, fields.name, fields.package_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_component(&self, fields: &ComponentFields) -> Result<()> {
        self.conn.execute(
            "UPDATE source_component SET qualified_name = ?1, name = ?2, package_id = ?3 WHERE id = ?4",
            params![fields.qualified_name, fields.name, fields.package_id, fields.id],
        )?;
        Ok(())
    }

    pub fn remove_component_row(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM source_component WHERE id = ?1", [id])?;
        Ok(())
    }

    // ========== User defined types ==========

    pub fn udt_fields_by_id(&self, id: i64) -> Result<Option<TypeFields>> {
        self.udt_fields_where("id", &id)
    }

    pub fn udt_fields_by_qualified_name(&self, qualified_name: &str) -> Result<Option<TypeFields>> {
        self.udt_fields_where("qualified_name", &qualified_name)
    }

    fn udt_fields_where(&self, column: &str, key: &dyn ToSql) -> Result<Option<TypeFields>> {
        let fields = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, parent_namespace_id, class_namespace_id, parent_package_id, name, qualified_name,
                            kind, access
                     FROM class_declaration WHERE {column} = ?1"
                ),
                [key],
                |row| {
                    Ok(TypeFields {
                        id: row.get(0)?,
                        parent_namespace_id: row.get(1)?,
                        class_namespace_id: row.get(2)?,
                        parent_package_id: row.get(3)?,
                        name: row.get(4)?,
                        qualified_name: row.get(5)?,
                        kind: UdtKind::from_i64(row.get(6)?),
                        access: AccessSpecifier::from_i64(row.get(7)?),
                        ..Default::default()
                    })
                },
            )
            .optional()?;
        let Some(mut fields) = fields else {
            return Ok(None);
        };
        let id = fields.id;
        fields.component_ids =
            self.ids_where("SELECT component_id FROM udt_component WHERE udt_id = ?1 ORDER BY id", id)?;
        fields.nested_type_ids =
            self.ids_where("SELECT id FROM class_declaration WHERE class_namespace_id = ?1 ORDER BY id", id)?;
        fields.super_type_ids =
            self.ids_where("SELECT target_id FROM class_hierarchy WHERE source_id = ?1 ORDER BY id", id)?;
        fields.sub_type_ids =
            self.ids_where("SELECT source_id FROM class_hierarchy WHERE target_id = ?1 ORDER BY id", id)?;
        fields.uses_in_interface_ids =
            self.ids_where("SELECT target_id FROM uses_in_the_interface WHERE source_id = ?1 ORDER BY id", id)?;
        fields.used_by_interface_ids =
            self.ids_where("SELECT source_id FROM uses_in_the_interface WHERE target_id = ?1 ORDER BY id", id)?;
        fields.uses_in_implementation_ids = self.ids_where(
            "SELECT target_id FROM uses_in_the_implementation WHERE source_id = ?1 ORDER BY id",
            id,
        )?;
        fields.used_by_implementation_ids = self.ids_where(
            "SELECT source_id FROM uses_in_the_implementation WHERE target_id = ?1 ORDER BY id",
            id,
        )?;
        fields.field_names = self.names_where("SELECT name FROM field_declaration WHERE class_id = ?1 ORDER BY id", id)?;
        fields.method_names =
            self.names_where("SELECT name FROM method_declaration WHERE class_id = ?1 ORDER BY id", id)?;
        Ok(Some(fields))
    }

    /// Insert a type row and its component links, returning its id.
    pub fn insert_udt(&self, fields: &TypeFields) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO class_declaration
             (parent_namespace_id, class_namespace_id, parent_package_id, name, qualified_name, kind, access)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                fields.parent_namespace_id,
                fields.class_namespace_id,
                fields.parent_package_id,
                fields.name,
                fields.qualified_name,
                fields.kind.as_i64(),
                fields.access.as_i64()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        for component in &fields.component_ids {
            self.add_relation("udt_component", "udt_id", "component_id", id, *component)?;
        }
        Ok(id)
    }

    pub fn update_udt(&self, fields: &TypeFields) -> Result<()> {
        self.conn.execute(
            "UPDATE class_declaration SET name = ?1, qualified_name = ?2, kind = ?3, access = ?4,
             class_namespace_id = ?5, parent_package_id = ?6 WHERE id = ?7",
            params![
                fields.name,
                fields.qualified_name,
                fields.kind.as_i64(),
                fields.access.as_i64(),
                fields.class_namespace_id,
                fields.parent_package_id,
                fields.id
            ],
        )?;
        Ok(())
    }

    pub fn remove_udt_row(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM class_declaration WHERE id = ?1", [id])?;
        Ok(())
    }

    // ========== Free functions ==========

    pub fn function_fields_by_id(&self, id: i64) -> Result<Option<FunctionFields>> {
        self.function_fields_where("id", &id)
    }

    pub fn function_fields_by_qualified_name(&self, qualified_name: &str) -> Result<Option<FunctionFields>> {
        self.function_fields_where("qualified_name", &qualified_name)
    }

    fn function_fields_where(&self, column: &str, key: &dyn ToSql) -> Result<Option<FunctionFields>> {
        let fields = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, name, qualified_name FROM function_declaration WHERE {column} = ?1 ORDER BY id LIMIT 1"
                ),
                [key],
                |row| {
                    Ok(FunctionFields {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        qualified_name: row.get(2)?,
                        ..Default::default()
                    })
                },
            )
            .optional()?;
        let Some(mut fields) = fields else {
            return Ok(None);
        };
        let id = fields.id;
        fields.component_id = self
            .conn
            .query_row(
                "SELECT f.component_id FROM global_function_source_file g
                 JOIN source_file f ON g.source_file_id = f.id
                 WHERE g.function_id = ?1 ORDER BY g.id LIMIT 1",
                [id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();
        fields.callee_ids = self.ids_where("SELECT callee_id FROM function_calls WHERE caller_id = ?1 ORDER BY id", id)?;
        fields.caller_ids = self.ids_where("SELECT caller_id FROM function_calls WHERE callee_id = ?1 ORDER BY id", id)?;
        Ok(Some(fields))
    }

    // ========== Renaming ==========

    /// Set the name columns of any node row. Kinds without a table are ignored.
    pub fn rename_row(&self, kind: DiagramType, id: i64, name: &str, qualified_name: &str) -> Result<()> {
        let table = match kind {
            DiagramType::Repository => "source_repository",
            DiagramType::Package => "source_package",
            DiagramType::Component => "source_component",
            DiagramType::Class => "class_declaration",
            DiagramType::FreeFunction => "function_declaration",
            DiagramType::None => return Ok(()),
        };
        self.conn.execute(
            &format!("UPDATE {table} SET name = ?1, qualified_name = ?2 WHERE id = ?3"),
            params![name, qualified_name, id],
        )?;
        Ok(())
    }

    // ========== Relationships ==========

    fn add_relation(&self, table: &str, source_col: &str, target_col: &str, source: i64, target: i64) -> Result<()> {
        self.conn.execute(
            &format!("INSERT OR IGNORE INTO {table} ({source_col}, {target_col}) VALUES (?1, ?2)"),
            params![source, target],
        )?;
        Ok(())
    }

    fn remove_relation(&self, table: &str, source_col: &str, target_col: &str, source: i64, target: i64) -> Result<()> {
        self.conn.execute(
            &format!("DELETE FROM {table} WHERE {source_col} = ?1 AND {target_col} = ?2"),
            params![source, target],
        )?;
        Ok(())
    }

    pub fn add_concrete_dependency(&self, source: i64, target: i64) -> Result<()> {
        self.add_relation("dependencies", "source_id", "target_id", source, target)
    }

    pub fn remove_concrete_dependency(&self, source: i64, target: i64) -> Result<()> {
        self.remove_relation("dependencies", "source_id", "target_id", source, target)
    }

    pub fn add_allowed_dependency(&self, source: i64, target: i64) -> Result<()> {
        self.add_relation("allowed_dependencies", "source_id", "target_id", source, target)
    }

    pub fn remove_allowed_dependency(&self, source: i64, target: i64) -> Result<()> {
        self.remove_relation("allowed_dependencies", "source_id", "target_id", source, target)
    }

    pub fn add_component_dependency(&self, source: i64, target: i64) -> Result<()> {
        self.add_relation("component_relation", "source_id", "target_id", source, target)
    }

    pub fn remove_component_dependency(&self, source: i64, target: i64) -> Result<()> {
        self.remove_relation("component_relation", "source_id", "target_id", source, target)
    }

    /// `sub` derives from `sup`
    pub fn add_class_hierarchy(&self, sub: i64, sup: i64) -> Result<()> {
        self.add_relation("class_hierarchy", "source_id", "target_id", sub, sup)
    }

    pub fn remove_class_hierarchy(&self, sub: i64, sup: i64) -> Result<()> {
        self.remove_relation("class_hierarchy", "source_id", "target_id", sub, sup)
    }

    pub fn add_interface_relationship(&self, source: i64, target: i64) -> Result<()> {
        self.add_relation("uses_in_the_interface", "source_id", "target_id", source, target)
    }

    pub fn remove_interface_relationship(&self, source: i64, target: i64) -> Result<()> {
        self.remove_relation("uses_in_the_interface", "source_id", "target_id", source, target)
    }

    pub fn add_implementation_relationship(&self, source: i64, target: i64) -> Result<()> {
        self.add_relation("uses_in_the_implementation", "source_id", "target_id", source, target)
    }

    pub fn remove_implementation_relationship(&self, source: i64, target: i64) -> Result<()> {
        self.remove_relation("uses_in_the_implementation", "source_id", "target_id", source, target)
    }
}
