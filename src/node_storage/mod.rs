//! Lazy, rule checked view of a code database
//!
//! [`NodeStorage`] hands out nodes addressed by [`UniqueId`]. A node is read
//! from SQLite the first time it is asked for and then cached until the
//! storage is cleared. Its children, providers and clients are cached too and
//! dropped whenever an edit could have changed them.
//!
//! Every edit checks the physical design rules before touching the database
//! and reports what changed through [`NodeStorage::subscribe`].

mod allowed_deps;
mod errors;
mod node;
mod signals;

pub use allowed_deps::load_allowed_dependencies;
pub use errors::*;
pub use node::{LakosianEdge, LakosianNode, UniqueId};
pub use signals::NodeStorageEvent;

use crate::kinds::{DiagramType, LakosRelationType, PhysicalDependencyType, UdtKind};
use crate::storage::{
    ComponentFields, FunctionFields, PackageFields, RawQueryResult, RepositoryFields, SqliteStore, TypeFields,
};
use crate::Result;
use crossbeam::channel::Receiver;
use signals::Signals;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Providers,
    Clients,
}

pub struct NodeStorage {
    db: SqliteStore,
    nodes: HashMap<UniqueId, LakosianNode>,
    signals: Signals,
}

impl NodeStorage {
    /// Storage over an empty in-memory database.
    pub fn new() -> Result<Self> {
        Ok(Self::with_database(SqliteStore::open_in_memory()?))
    }

    /// Storage over a database file, created when missing.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::with_database(SqliteStore::open(path)?))
    }

    pub fn with_database(db: SqliteStore) -> Self {
        Self {
            db,
            nodes: HashMap::new(),
            signals: Signals::default(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<NodeStorageEvent> {
        self.signals.subscribe()
    }

    // ========== Session ==========

    /// Switch to another database file, dropping every cached node.
    pub fn set_database_source_path(&mut self, path: &Path) -> Result<()> {
        self.db = SqliteStore::open(path)?;
        self.clear();
        self.preload_high_level_components()?;
        info!(path = %path.display(), nodes = self.nodes.len(), "Opened code database");
        Ok(())
    }

    /// Detach from the current database. The storage is empty afterwards.
    pub fn close_database(&mut self) -> Result<()> {
        self.db = SqliteStore::open_in_memory()?;
        self.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.signals.emit(NodeStorageEvent::StorageCleared);
        self.nodes.clear();
    }

    pub fn raw_db_query(&self, sql: &str) -> Result<RawQueryResult> {
        self.db.raw_query(sql)
    }

    /// Load the top level nodes and their children.
    pub fn preload_high_level_components(&mut self) -> Result<()> {
        for uid in self.get_top_level_packages()? {
            self.children(uid)?;
        }
        debug!(nodes = self.nodes.len(), "Preloaded top level nodes");
        Ok(())
    }

    // ========== Lookup ==========

    pub fn find_by_id(&mut self, uid: UniqueId) -> Result<Option<&LakosianNode>> {
        if !self.nodes.contains_key(&uid) {
            let Some(node) = self.fetch(uid)? else {
                return Ok(None);
            };
            self.nodes.insert(uid, node);
        }
        Ok(self.nodes.get(&uid))
    }

    pub fn find_by_qualified_name(&mut self, kind: DiagramType, qualified_name: &str) -> Result<Option<&LakosianNode>> {
        let cached = self
            .nodes
            .values()
            .find(|n| n.kind() == kind && n.qualified_name() == qualified_name)
            .map(LakosianNode::uid);
        let uid = match cached {
            Some(uid) => uid,
            None => {
                let Some(node) = self.fetch_by_qualified_name(kind, qualified_name)? else {
                    return Ok(None);
                };
                let uid = node.uid();
                self.nodes.entry(uid).or_insert(node);
                uid
            }
        };
        Ok(self.nodes.get(&uid))
    }

    /// First node of any kind with this qualified name.
    pub fn find_by_qualified_name_any(&mut self, qualified_name: &str) -> Result<Option<&LakosianNode>> {
        let mut found = None;
        for kind in [
            DiagramType::Repository,
            DiagramType::Package,
            DiagramType::Component,
            DiagramType::Class,
            DiagramType::FreeFunction,
        ] {
            if let Some(node) = self.find_by_qualified_name(kind, qualified_name)? {
                found = Some(node.uid());
                break;
            }
        }
        Ok(found.and_then(|uid| self.nodes.get(&uid)))
    }

    /// Named repositories, then packages that belong to neither a package nor a repository.
    pub fn get_top_level_packages(&mut self) -> Result<Vec<UniqueId>> {
        let repositories = self.db.top_level_repository_ids()?;
        let packages = self.db.top_level_package_ids()?;
        let mut out = Vec::with_capacity(repositories.len() + packages.len());
        for uid in uids(DiagramType::Repository, repositories)
            .into_iter()
            .chain(uids(DiagramType::Package, packages))
        {
            if self.find_by_id(uid)?.is_some() {
                out.push(uid);
            }
        }
        Ok(out)
    }

    fn fetch(&self, uid: UniqueId) -> Result<Option<LakosianNode>> {
        let node = match uid.kind {
            DiagramType::Repository => self.db.repository_fields_by_id(uid.id)?.map(repository_node),
            DiagramType::Package => self.db.package_fields_by_id(uid.id)?.map(package_node),
            DiagramType::Component => self.db.component_fields_by_id(uid.id)?.map(component_node),
            DiagramType::Class => self.db.udt_fields_by_id(uid.id)?.map(type_node),
            DiagramType::FreeFunction => self.db.function_fields_by_id(uid.id)?.map(function_node),
            DiagramType::None => None,
        };
        Ok(node)
    }

    fn fetch_by_qualified_name(&self, kind: DiagramType, qualified_name: &str) -> Result<Option<LakosianNode>> {
        let node = match kind {
            DiagramType::Repository => self
                .db
                .repository_fields_by_qualified_name(qualified_name)?
                .map(repository_node),
            DiagramType::Package => self.db.package_fields_by_qualified_name(qualified_name)?.map(package_node),
            DiagramType::Component => self
                .db
                .component_fields_by_qualified_name(qualified_name)?
                .map(component_node),
            DiagramType::Class => self.db.udt_fields_by_qualified_name(qualified_name)?.map(type_node),
            DiagramType::FreeFunction => self
                .db
                .function_fields_by_qualified_name(qualified_name)?
                .map(function_node),
            DiagramType::None => None,
        };
        Ok(node)
    }

    // ========== Node relations ==========

    pub fn parent(&mut self, uid: UniqueId) -> Result<Option<UniqueId>> {
        Ok(self.find_by_id(uid)?.and_then(LakosianNode::parent))
    }

    /// The node and all its ancestors, outermost first.
    pub fn parent_hierarchy(&mut self, uid: UniqueId) -> Result<Vec<UniqueId>> {
        let mut hierarchy = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(uid);
        while let Some(uid) = current {
            if !seen.insert(uid) || self.find_by_id(uid)?.is_none() {
                break;
            }
            hierarchy.push(uid);
            current = self.parent(uid)?;
        }
        hierarchy.reverse();
        Ok(hierarchy)
    }

    /// Child packages before components for packages, types for components.
    pub fn children(&mut self, uid: UniqueId) -> Result<Vec<UniqueId>> {
        if self.find_by_id(uid)?.is_none() {
            return Ok(Vec::new());
        }
        if let Some(children) = self.nodes.get(&uid).and_then(|n| n.children.clone()) {
            return Ok(children);
        }
        let children = self.load_children(uid)?;
        if let Some(node) = self.nodes.get_mut(&uid) {
            node.children = Some(children.clone());
        }
        Ok(children)
    }

    pub fn providers(&mut self, uid: UniqueId) -> Result<Vec<LakosianEdge>> {
        self.edges(uid, Direction::Providers)
    }

    pub fn clients(&mut self, uid: UniqueId) -> Result<Vec<LakosianEdge>> {
        self.edges(uid, Direction::Clients)
    }

    pub fn has_provider(&mut self, source: UniqueId, target: UniqueId) -> Result<bool> {
        Ok(self.providers(source)?.iter().any(|e| e.other == target))
    }

    pub fn has_concrete_dependency(&mut self, source: UniqueId, target: UniqueId) -> Result<bool> {
        if source.kind != target.kind {
            return Ok(false);
        }
        let providers = match source.kind {
            DiagramType::Package => self.db.package_fields_by_id(source.id)?.map(|f| f.provider_ids),
            DiagramType::Component => self.db.component_fields_by_id(source.id)?.map(|f| f.provider_ids),
            _ => None,
        };
        Ok(providers.is_some_and(|ids| ids.contains(&target.id)))
    }

    /// Only packages have allowed dependencies.
    pub fn has_allowed_dependency(&mut self, source: UniqueId, target: UniqueId) -> Result<bool> {
        if source.kind != DiagramType::Package || target.kind != DiagramType::Package {
            return Ok(false);
        }
        Ok(self
            .db
            .package_fields_by_id(source.id)?
            .is_some_and(|f| f.allowed_provider_ids.contains(&target.id)))
    }

    pub fn is_package_group(&mut self, uid: UniqueId) -> Result<bool> {
        if uid.kind != DiagramType::Package {
            return Ok(false);
        }
        Ok(self.children(uid)?.iter().any(|c| c.kind == DiagramType::Package))
    }

    fn load_children(&self, uid: UniqueId) -> Result<Vec<UniqueId>> {
        let children = match uid.kind {
            DiagramType::Repository => self
                .db
                .repository_fields_by_id(uid.id)?
                .map(|f| uids(DiagramType::Package, f.child_package_ids))
                .unwrap_or_default(),
            DiagramType::Package => {
                let mut children = uids(DiagramType::Package, self.db.package_child_ids(uid.id)?);
                children.extend(uids(DiagramType::Component, self.db.package_component_ids(uid.id)?));
                children
            }
            DiagramType::Component => self
                .db
                .component_fields_by_id(uid.id)?
                .map(|f| uids(DiagramType::Class, f.child_udt_ids))
                .unwrap_or_default(),
            DiagramType::Class => self
                .db
                .udt_fields_by_id(uid.id)?
                .map(|f| uids(DiagramType::Class, f.nested_type_ids))
                .unwrap_or_default(),
            DiagramType::FreeFunction | DiagramType::None => Vec::new(),
        };
        Ok(children)
    }

    fn edges(&mut self, uid: UniqueId, direction: Direction) -> Result<Vec<LakosianEdge>> {
        if self.find_by_id(uid)?.is_none() {
            return Ok(Vec::new());
        }
        let cached = self.nodes.get(&uid).and_then(|n| match direction {
            Direction::Providers => n.providers.clone(),
            Direction::Clients => n.clients.clone(),
        });
        if let Some(edges) = cached {
            return Ok(edges);
        }
        let edges = self.load_edges(uid, direction)?;
        if let Some(node) = self.nodes.get_mut(&uid) {
            match direction {
                Direction::Providers => node.providers = Some(edges.clone()),
                Direction::Clients => node.clients = Some(edges.clone()),
            }
        }
        Ok(edges)
    }

    fn load_edges(&mut self, uid: UniqueId, direction: Direction) -> Result<Vec<LakosianEdge>> {
        use LakosRelationType::*;

        let mut edges = Vec::new();
        match uid.kind {
            DiagramType::Package => {
                let Some(fields) = self.db.package_fields_by_id(uid.id)? else {
                    return Ok(edges);
                };
                let (concrete, allowed) = match direction {
                    Direction::Providers => (fields.provider_ids, fields.allowed_provider_ids),
                    Direction::Clients => (fields.client_ids, fields.allowed_client_ids),
                };
                for id in concrete.into_iter().chain(allowed) {
                    push_edge(&mut edges, PackageDependency, UniqueId::new(DiagramType::Package, id));
                }

                // A package group also inherits the edges of its packages, lifted to their groups
                if fields.parent_id.is_none() {
                    for child in fields.child_package_ids {
                        for edge in self.edges(UniqueId::new(DiagramType::Package, child), direction)? {
                            let Some(group) = self.parent(edge.other)? else {
                                continue;
                            };
                            if group.kind == DiagramType::Package && group != uid {
                                push_edge(&mut edges, PackageDependency, group);
                            }
                        }
                    }
                }
            }
            DiagramType::Component => {
                let Some(fields) = self.db.component_fields_by_id(uid.id)? else {
                    return Ok(edges);
                };
                let ids = match direction {
                    Direction::Providers => fields.provider_ids,
                    Direction::Clients => fields.client_ids,
                };
                for id in ids {
                    push_edge(&mut edges, PackageDependency, UniqueId::new(DiagramType::Component, id));
                }
            }
            DiagramType::Class => {
                let Some(fields) = self.db.udt_fields_by_id(uid.id)? else {
                    return Ok(edges);
                };
                let relations = match direction {
                    Direction::Providers => [
                        (IsA, fields.super_type_ids),
                        (UsesInTheInterface, fields.uses_in_interface_ids),
                        (UsesInTheImplementation, fields.uses_in_implementation_ids),
                    ],
                    Direction::Clients => [
                        (IsA, fields.sub_type_ids),
                        (UsesInTheInterface, fields.used_by_interface_ids),
                        (UsesInTheImplementation, fields.used_by_implementation_ids),
                    ],
                };
                for (relation, ids) in relations {
                    for id in ids {
                        // the enclosing class is a parent, not a dependency
                        if Some(id) == fields.class_namespace_id {
                            continue;
                        }
                        push_edge(&mut edges, relation, UniqueId::new(DiagramType::Class, id));
                    }
                }
            }
            DiagramType::FreeFunction => {
                let Some(fields) = self.db.function_fields_by_id(uid.id)? else {
                    return Ok(edges);
                };
                let ids = match direction {
                    Direction::Providers => fields.callee_ids,
                    Direction::Clients => fields.caller_ids,
                };
                for id in ids {
                    push_edge(&mut edges, UsesInTheImplementation, UniqueId::new(DiagramType::FreeFunction, id));
                }
            }
            DiagramType::Repository | DiagramType::None => {}
        }
        Ok(edges)
    }

    /// Parent when it is a package.
    fn package_parent(&mut self, uid: UniqueId) -> Result<Option<UniqueId>> {
        Ok(self.parent(uid)?.filter(|p| p.kind == DiagramType::Package))
    }

    /// A package directly below a repository or at the top: a group or a standalone package.
    fn is_top_level_package(&mut self, uid: UniqueId) -> Result<bool> {
        Ok(uid.kind == DiagramType::Package && self.package_parent(uid)?.is_none())
    }

    /// A package holding components, or nothing at all.
    fn is_standalone(&mut self, uid: UniqueId) -> Result<bool> {
        if uid.kind != DiagramType::Package {
            return Ok(false);
        }
        Ok(self
            .children(uid)?
            .first()
            .is_none_or(|c| c.kind == DiagramType::Component))
    }

    /// A package placed under the `standalones` tree.
    fn is_in_standalones(&mut self, uid: UniqueId) -> Result<bool> {
        if uid.kind != DiagramType::Package {
            return Ok(false);
        }
        Ok(self
            .find_by_id(uid)?
            .is_some_and(|n| n.qualified_name().split('/').next() == Some("standalones")))
    }

    fn parents_depend(&mut self, source: Option<UniqueId>, target: Option<UniqueId>) -> Result<bool> {
        match (source, target) {
            (Some(source), Some(target)) => self.has_provider(source, target),
            _ => Ok(false),
        }
    }

    /// Whether the group holding `source` depends on the standalone package `target`.
    fn group_depends_on_standalone(&mut self, source: Option<UniqueId>, target: Option<UniqueId>) -> Result<bool> {
        let (Some(source), Some(target)) = (source, target) else {
            return Ok(false);
        };
        let Some(group) = self.package_parent(source)? else {
            return Ok(false);
        };
        Ok(self.is_top_level_package(group)? && self.is_standalone(target)? && self.has_provider(group, target)?)
    }

    fn owning_component(&mut self, uid: UniqueId) -> Result<Option<UniqueId>> {
        Ok(self
            .parent_hierarchy(uid)?
            .into_iter()
            .rev()
            .find(|p| p.kind == DiagramType::Component))
    }

    fn invalidate_children(&mut self, uid: UniqueId) {
        if let Some(node) = self.nodes.get_mut(&uid) {
            node.invalidate_children();
        }
    }

    /// Drop every cached edge list an edge between `source` and `target` shows up in.
    fn invalidate_edges(&mut self, source: UniqueId, target: UniqueId) -> Result<()> {
        let parents = [self.parent(source)?, self.parent(target)?];
        if let Some(node) = self.nodes.get_mut(&source) {
            node.invalidate_providers();
        }
        if let Some(node) = self.nodes.get_mut(&target) {
            node.invalidate_clients();
        }
        for parent in parents.into_iter().flatten() {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.invalidate_providers();
                node.invalidate_clients();
            }
        }
        Ok(())
    }

    // ========== Renaming ==========

    /// Rename a node, keeping the rest of its qualified name. Returns false
    /// when the node does not exist.
    pub fn rename_node(&mut self, uid: UniqueId, name: &str) -> Result<bool> {
        if self.find_by_id(uid)?.is_none() {
            return Ok(false);
        }
        let Some(node) = self.nodes.get_mut(&uid) else {
            return Ok(false);
        };
        node.set_name(name);
        let qualified_name = node.qualified_name().to_string();
        self.db.rename_row(uid.kind, uid.id, name, &qualified_name)?;
        debug!(%uid, qualified_name, "Renamed node");
        self.signals.emit(NodeStorageEvent::NodeRenamed(uid));
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(true)
    }

    // ========== Packages ==========

    pub fn add_package(
        &mut self,
        name: &str,
        qualified_name: &str,
        parent: Option<UniqueId>,
        userdata: Option<serde_json::Value>,
    ) -> std::result::Result<UniqueId, ErrorAddPackage> {
        if self.find_by_qualified_name(DiagramType::Package, qualified_name)?.is_some() {
            return Err(ErrorAddPackage::QualifiedNameAlreadyRegistered);
        }

        let mut fields = PackageFields {
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            ..Default::default()
        };
        if let Some(parent) = parent {
            match parent.kind {
                DiagramType::Repository => fields.repository_id = Some(parent.id),
                DiagramType::Package => {
                    if self
                        .children(parent)?
                        .first()
                        .is_some_and(|c| c.kind == DiagramType::Component)
                    {
                        return Err(ErrorAddPackage::CannotAddPackageToStandalonePackage);
                    }
                    fields.parent_id = Some(parent.id);
                }
                other => return Err(ErrorAddPackage::CantAddChildren(other.to_string())),
            }
        }

        fields.id = self.db.insert_package(&fields)?;
        let uid = UniqueId::new(DiagramType::Package, fields.id);
        self.nodes.insert(uid, package_node(fields));
        if let Some(parent) = parent {
            self.invalidate_children(parent);
        }

        debug!(qualified_name, "Added package");
        self.signals.emit(NodeStorageEvent::NodeAdded { node: uid, userdata });
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(uid)
    }

    pub fn remove_package(&mut self, uid: UniqueId) -> std::result::Result<(), ErrorRemoveEntity> {
        self.check_removable(uid)?;

        let parent = self.parent(uid)?;
        self.db.remove_package_row(uid.id)?;
        if let Some(parent) = parent {
            self.invalidate_children(parent);
        }

        debug!(%uid, "Removed package");
        self.signals.emit(NodeStorageEvent::NodeRemoved(uid));
        self.nodes.remove(&uid);
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(())
    }

    fn check_removable(&mut self, uid: UniqueId) -> std::result::Result<(), ErrorRemoveEntity> {
        if !self.providers(uid)?.is_empty() {
            return Err(ErrorRemoveEntity::CannotRemoveWithProviders);
        }
        if !self.clients(uid)?.is_empty() {
            return Err(ErrorRemoveEntity::CannotRemoveWithClients);
        }
        if !self.children(uid)?.is_empty() {
            return Err(ErrorRemoveEntity::CannotRemoveWithChildren);
        }
        Ok(())
    }

    // ========== Components ==========

    pub fn add_component(
        &mut self,
        name: &str,
        qualified_name: &str,
        parent: Option<UniqueId>,
    ) -> std::result::Result<UniqueId, ErrorAddComponent> {
        let Some(parent) = parent.filter(|p| p.kind == DiagramType::Package) else {
            return Err(ErrorAddComponent::MissingParent);
        };
        if self.find_by_id(parent)?.is_none() {
            return Err(ErrorAddComponent::MissingParent);
        }
        if self.find_by_qualified_name(DiagramType::Component, qualified_name)?.is_some() {
            return Err(ErrorAddComponent::QualifiedNameAlreadyRegistered);
        }
        if self.is_package_group(parent)? {
            return Err(ErrorAddComponent::CannotAddComponentToPkgGroup);
        }

        let mut fields = ComponentFields {
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            package_id: Some(parent.id),
            ..Default::default()
        };
        fields.id = self.db.insert_component(&fields)?;
        let uid = UniqueId::new(DiagramType::Component, fields.id);
        self.nodes.insert(uid, component_node(fields));
        self.invalidate_children(parent);

        debug!(qualified_name, "Added component");
        self.signals.emit(NodeStorageEvent::NodeAdded {
            node: uid,
            userdata: None,
        });
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(uid)
    }

    pub fn remove_component(&mut self, uid: UniqueId) -> std::result::Result<(), ErrorRemoveEntity> {
        self.check_removable(uid)?;

        let parent = self.parent(uid)?;
        self.db.remove_component_row(uid.id)?;
        self.nodes.remove(&uid);
        if let Some(parent) = parent {
            self.invalidate_children(parent);
        }

        debug!(%uid, "Removed component");
        self.signals.emit(NodeStorageEvent::NodeRemoved(uid));
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(())
    }

    // ========== Logical entities ==========

    /// Add a type to a component, or nest it in a class or struct.
    pub fn add_logical_entity(
        &mut self,
        name: &str,
        qualified_name: &str,
        parent: Option<UniqueId>,
        kind: UdtKind,
    ) -> std::result::Result<UniqueId, ErrorAddUdt> {
        let Some(parent) = parent else {
            return Err(ErrorAddUdt::BadParentType);
        };
        let Some(parent_kind) = self.find_by_id(parent)?.map(|n| (n.kind(), n.udt_kind())) else {
            return Err(ErrorAddUdt::BadParentType);
        };

        let mut fields = TypeFields {
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            kind,
            ..Default::default()
        };
        let component = match parent_kind {
            (DiagramType::Component, _) => Some(parent),
            (DiagramType::Class, Some(UdtKind::Class | UdtKind::Struct)) => {
                fields.class_namespace_id = Some(parent.id);
                self.owning_component(parent)?
            }
            _ => return Err(ErrorAddUdt::BadParentType),
        };
        if let Some(component) = component {
            fields.component_ids = vec![component.id];
            fields.parent_package_id = self.package_parent(component)?.map(|p| p.id);
        }

        fields.id = self.db.insert_udt(&fields)?;
        let uid = UniqueId::new(DiagramType::Class, fields.id);
        self.nodes.insert(uid, type_node(fields));
        self.invalidate_children(parent);
        if let Some(component) = component {
            self.invalidate_children(component);
        }

        debug!(qualified_name, %kind, "Added type");
        self.signals.emit(NodeStorageEvent::NodeAdded {
            node: uid,
            userdata: None,
        });
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(uid)
    }

    pub fn remove_logical_entity(&mut self, uid: UniqueId) -> std::result::Result<(), ErrorRemoveEntity> {
        self.check_removable(uid)?;

        let parent = self.parent(uid)?;
        let component = self.owning_component(uid)?;
        self.db.remove_udt_row(uid.id)?;
        self.nodes.remove(&uid);
        for owner in [parent, component].into_iter().flatten() {
            self.invalidate_children(owner);
        }

        debug!(%uid, "Removed type");
        self.signals.emit(NodeStorageEvent::NodeRemoved(uid));
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(())
    }

    // ========== Physical dependencies ==========

    pub fn add_physical_dependency(
        &mut self,
        source: UniqueId,
        target: UniqueId,
        dependency: PhysicalDependencyType,
    ) -> std::result::Result<(), ErrorAddPhysicalDependency> {
        self.add_physical_dependency_with(source, target, dependency, true)
    }

    fn add_physical_dependency_with(
        &mut self,
        source: UniqueId,
        target: UniqueId,
        dependency: PhysicalDependencyType,
        emit: bool,
    ) -> std::result::Result<(), ErrorAddPhysicalDependency> {
        use ErrorAddPhysicalDependency as E;

        let physical = |uid: UniqueId| matches!(uid.kind, DiagramType::Package | DiagramType::Component);
        if !physical(source) || !physical(target) {
            return Err(E::InvalidType);
        }
        if self.find_by_id(source)?.is_none() || self.find_by_id(target)?.is_none() {
            return Err(E::InvalidType);
        }
        if source == target {
            return Err(E::SelfRelation);
        }
        let exists = match dependency {
            PhysicalDependencyType::Concrete => self.has_concrete_dependency(source, target)?,
            PhysicalDependencyType::Allowed => self.has_allowed_dependency(source, target)?,
        };
        if exists {
            return Err(E::DependencyAlreadyExists);
        }
        if dependency == PhysicalDependencyType::Allowed && source.kind != DiagramType::Package {
            return Err(E::InvalidType);
        }

        if source.kind == DiagramType::Package && self.is_top_level_package(source)? {
            if !(self.is_top_level_package(target)? || self.is_in_standalones(target)?) {
                return Err(E::HierarchyLevelMismatch);
            }
        } else if source.kind == DiagramType::Package {
            if target.kind != DiagramType::Package || self.package_parent(target)?.is_none() {
                return Err(E::HierarchyLevelMismatch);
            }
            let source_parent = self.package_parent(source)?;
            let target_parent = self.package_parent(target)?;
            if source_parent != target_parent && !self.parents_depend(source_parent, target_parent)? {
                return Err(E::MissingParentDependency);
            }
        } else {
            if target.kind != DiagramType::Component {
                return Err(E::HierarchyLevelMismatch);
            }
            let source_parent = self.parent(source)?;
            let target_parent = self.parent(target)?;
            if source_parent != target_parent
                && !self.group_depends_on_standalone(source_parent, target_parent)?
                && !self.parents_depend(source_parent, target_parent)?
            {
                return Err(E::MissingParentDependency);
            }
        }

        match (source.kind, dependency) {
            (DiagramType::Component, _) => self.db.add_component_dependency(source.id, target.id)?,
            (_, PhysicalDependencyType::Concrete) => self.db.add_concrete_dependency(source.id, target.id)?,
            (_, PhysicalDependencyType::Allowed) => self.db.add_allowed_dependency(source.id, target.id)?,
        }
        self.invalidate_edges(source, target)?;

        debug!(%source, %target, ?dependency, "Added physical dependency");
        if emit {
            self.signals.emit(NodeStorageEvent::PhysicalDependencyAdded {
                source,
                target,
                dependency,
            });
            self.signals.emit(NodeStorageEvent::StorageChanged);
        }
        Ok(())
    }

    pub fn remove_physical_dependency(
        &mut self,
        source: UniqueId,
        target: UniqueId,
        dependency: PhysicalDependencyType,
    ) -> std::result::Result<(), ErrorRemovePhysicalDependency> {
        self.remove_physical_dependency_with(source, target, dependency, true)
    }

    fn remove_physical_dependency_with(
        &mut self,
        source: UniqueId,
        target: UniqueId,
        dependency: PhysicalDependencyType,
        emit: bool,
    ) -> std::result::Result<(), ErrorRemovePhysicalDependency> {
        let exists = match dependency {
            PhysicalDependencyType::Concrete => self.has_concrete_dependency(source, target)?,
            PhysicalDependencyType::Allowed => self.has_allowed_dependency(source, target)?,
        };
        if !exists {
            return Err(ErrorRemovePhysicalDependency::InexistentRelation);
        }

        match (source.kind, dependency) {
            (DiagramType::Component, _) => self.db.remove_component_dependency(source.id, target.id)?,
            (_, PhysicalDependencyType::Concrete) => self.db.remove_concrete_dependency(source.id, target.id)?,
            (_, PhysicalDependencyType::Allowed) => self.db.remove_allowed_dependency(source.id, target.id)?,
        }
        self.invalidate_edges(source, target)?;

        debug!(%source, %target, ?dependency, "Removed physical dependency");
        if emit {
            self.signals.emit(NodeStorageEvent::PhysicalDependencyRemoved {
                source,
                target,
                dependency,
            });
            self.signals.emit(NodeStorageEvent::StorageChanged);
        }
        Ok(())
    }

    // ========== Logical relations ==========

    pub fn add_logical_relation(
        &mut self,
        source: UniqueId,
        target: UniqueId,
        relation: LakosRelationType,
    ) -> std::result::Result<(), ErrorAddLogicalRelation> {
        use ErrorAddLogicalRelation as E;

        if source.kind != DiagramType::Class || target.kind != DiagramType::Class {
            return Err(E::InvalidRelation);
        }
        if self.find_by_id(source)?.is_none() || self.find_by_id(target)?.is_none() {
            return Err(E::InvalidRelation);
        }
        if source == target {
            return Err(E::SelfRelation);
        }
        if !relation.is_logical() {
            return Err(E::InvalidLakosRelationType(relation));
        }
        if self.has_provider(source, target)? {
            return Err(E::AlreadyHaveDependency);
        }

        let source_parent = self.parent(source)?;
        let target_parent = self.parent(target)?;
        if source_parent != target_parent && !self.parents_depend(source_parent, target_parent)? {
            let is_component = |p: Option<UniqueId>| p.is_some_and(|p| p.kind == DiagramType::Component);
            if is_component(source_parent) && is_component(target_parent) {
                return Err(E::ComponentDependencyRequired);
            }
            return Err(E::ParentDependencyRequired);
        }

        match relation {
            LakosRelationType::IsA => self.db.add_class_hierarchy(source.id, target.id)?,
            LakosRelationType::UsesInTheInterface => self.db.add_interface_relationship(source.id, target.id)?,
            LakosRelationType::UsesInTheImplementation => {
                self.db.add_implementation_relationship(source.id, target.id)?
            }
            other => return Err(E::InvalidLakosRelationType(other)),
        }
        self.invalidate_edges(source, target)?;

        debug!(%source, %target, %relation, "Added logical relation");
        self.signals.emit(NodeStorageEvent::LogicalRelationAdded {
            source,
            target,
            relation,
        });
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(())
    }

    pub fn remove_logical_relation(
        &mut self,
        source: UniqueId,
        target: UniqueId,
        relation: LakosRelationType,
    ) -> std::result::Result<(), ErrorRemoveLogicalRelation> {
        use ErrorRemoveLogicalRelation as E;

        if !relation.is_logical() {
            return Err(E::InvalidLakosRelationType(relation));
        }
        let fields = match (source.kind, target.kind) {
            (DiagramType::Class, DiagramType::Class) => self.db.udt_fields_by_id(source.id)?,
            _ => None,
        };
        let Some(fields) = fields else {
            return Err(E::InexistentRelation);
        };
        let targets = match relation {
            LakosRelationType::IsA => &fields.super_type_ids,
            LakosRelationType::UsesInTheInterface => &fields.uses_in_interface_ids,
            _ => &fields.uses_in_implementation_ids,
        };
        if !targets.contains(&target.id) {
            return Err(E::InexistentRelation);
        }

        match relation {
            LakosRelationType::IsA => self.db.remove_class_hierarchy(source.id, target.id)?,
            LakosRelationType::UsesInTheInterface => self.db.remove_interface_relationship(source.id, target.id)?,
            _ => self.db.remove_implementation_relationship(source.id, target.id)?,
        }
        self.invalidate_edges(source, target)?;

        debug!(%source, %target, %relation, "Removed logical relation");
        self.signals.emit(NodeStorageEvent::LogicalRelationRemoved {
            source,
            target,
            relation,
        });
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(())
    }

    // ========== Reparenting ==========

    /// Move a component and its types to another package.
    ///
    /// The new package gains the package dependencies the component needs.
    /// The old package loses those no remaining component still needs.
    /// Events go out once everything is in place.
    pub fn reparent_entity(
        &mut self,
        entity: UniqueId,
        new_parent: UniqueId,
    ) -> std::result::Result<(), ErrorReparentEntity> {
        if entity.kind != DiagramType::Component || self.find_by_id(entity)?.is_none() {
            return Err(ErrorReparentEntity::InvalidEntity);
        }
        if new_parent.kind != DiagramType::Package || self.find_by_id(new_parent)?.is_none() {
            return Err(ErrorReparentEntity::InvalidParent);
        }
        let Some(old_parent) = self.package_parent(entity)? else {
            return Err(ErrorReparentEntity::InvalidEntity);
        };

        for child in self.children(entity)? {
            if let Some(mut fields) = self.db.udt_fields_by_id(child.id)? {
                fields.parent_package_id = Some(new_parent.id);
                self.db.update_udt(&fields)?;
            }
        }
        if let Some(mut fields) = self.db.component_fields_by_id(entity.id)? {
            fields.package_id = Some(new_parent.id);
            self.db.update_component(&fields)?;
        }
        self.invalidate_children(old_parent);
        self.invalidate_children(new_parent);
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.set_parent(Some(new_parent));
        }

        let providers = self.providers(entity)?;
        let clients = self.clients(entity)?;

        let mut added = Vec::new();
        for (edge, outgoing) in providers.iter().map(|e| (e, true)).chain(clients.iter().map(|e| (e, false))) {
            let Some(other_parent) = self.parent(edge.other)? else {
                continue;
            };
            let (source, target) = if outgoing {
                (new_parent, other_parent)
            } else {
                (other_parent, new_parent)
            };
            match self.add_physical_dependency_with(source, target, PhysicalDependencyType::Concrete, false) {
                Ok(()) => added.push((source, target)),
                Err(ErrorAddPhysicalDependency::Storage(e)) => return Err(e.into()),
                Err(_) => {}
            }
        }

        let mut still_provided = HashSet::new();
        let mut still_served = HashSet::new();
        for sibling in self.children(old_parent)? {
            still_provided.extend(self.providers(sibling)?.into_iter().map(|e| e.other));
            still_served.extend(self.clients(sibling)?.into_iter().map(|e| e.other));
        }

        let mut removed = Vec::new();
        let orphaned = providers
            .iter()
            .filter(|e| !still_provided.contains(&e.other))
            .map(|e| (e, true))
            .chain(clients.iter().filter(|e| !still_served.contains(&e.other)).map(|e| (e, false)));
        for (edge, outgoing) in orphaned {
            let Some(other_parent) = self.parent(edge.other)? else {
                continue;
            };
            let (source, target) = if outgoing {
                (old_parent, other_parent)
            } else {
                (other_parent, old_parent)
            };
            match self.remove_physical_dependency_with(source, target, PhysicalDependencyType::Concrete, false) {
                Ok(()) => removed.push((source, target)),
                Err(ErrorRemovePhysicalDependency::Storage(e)) => return Err(e.into()),
                Err(_) => {}
            }
        }

        info!(%entity, %old_parent, %new_parent, added = added.len(), removed = removed.len(), "Reparented component");
        self.signals.emit(NodeStorageEvent::EntityReparented {
            entity,
            old_parent,
            new_parent,
        });
        for (source, target) in added {
            self.signals.emit(NodeStorageEvent::PhysicalDependencyAdded {
                source,
                target,
                dependency: PhysicalDependencyType::Concrete,
            });
        }
        for (source, target) in removed {
            self.signals.emit(NodeStorageEvent::PhysicalDependencyRemoved {
                source,
                target,
                dependency: PhysicalDependencyType::Concrete,
            });
        }
        self.signals.emit(NodeStorageEvent::StorageChanged);
        Ok(())
    }
}

fn uids(kind: DiagramType, ids: Vec<i64>) -> Vec<UniqueId> {
    ids.into_iter().map(|id| UniqueId::new(kind, id)).collect()
}

fn push_edge(edges: &mut Vec<LakosianEdge>, relation: LakosRelationType, other: UniqueId) {
    let edge = LakosianEdge::new(relation, other);
    if !edges.contains(&edge) {
        edges.push(edge);
    }
}

fn repository_node(fields: RepositoryFields) -> LakosianNode {
    LakosianNode::new(
        UniqueId::new(DiagramType::Repository, fields.id),
        fields.name,
        fields.qualified_name,
        None,
    )
}

fn package_node(fields: PackageFields) -> LakosianNode {
    let parent = fields
        .parent_id
        .map(|id| UniqueId::new(DiagramType::Package, id))
        .or_else(|| fields.repository_id.map(|id| UniqueId::new(DiagramType::Repository, id)));
    LakosianNode::new(
        UniqueId::new(DiagramType::Package, fields.id),
        fields.name,
        fields.qualified_name,
        parent,
    )
}

fn component_node(fields: ComponentFields) -> LakosianNode {
    LakosianNode::new(
        UniqueId::new(DiagramType::Component, fields.id),
        fields.name,
        fields.qualified_name,
        fields.package_id.map(|id| UniqueId::new(DiagramType::Package, id)),
    )
}

fn type_node(fields: TypeFields) -> LakosianNode {
    let parent = fields
        .class_namespace_id
        .map(|id| UniqueId::new(DiagramType::Class, id))
        .or_else(|| {
            fields
                .component_ids
                .first()
                .map(|id| UniqueId::new(DiagramType::Component, *id))
        });
    LakosianNode::new(
        UniqueId::new(DiagramType::Class, fields.id),
        fields.name,
        fields.qualified_name,
        parent,
    )
    .with_udt_kind(fields.kind)
}

fn function_node(fields: FunctionFields) -> LakosianNode {
    LakosianNode::new(
        UniqueId::new(DiagramType::FreeFunction, fields.id),
        fields.name,
        fields.qualified_name,
        fields.component_id.map(|id| UniqueId::new(DiagramType::Component, id)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::DiagramType::{Class, Component, Package};
    use crate::kinds::PhysicalDependencyType::{Allowed, Concrete};
    use tempfile::TempDir;

    fn storage() -> (TempDir, std::path::PathBuf, NodeStorage) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codedb.db");
        let ns = NodeStorage::open(&path).unwrap();
        (dir, path, ns)
    }

    fn pkg(ns: &mut NodeStorage, name: &str, qualified_name: &str, parent: Option<UniqueId>) -> UniqueId {
        ns.add_package(name, qualified_name, parent, None).unwrap()
    }

    fn comp(ns: &mut NodeStorage, name: &str, qualified_name: &str, parent: UniqueId) -> UniqueId {
        ns.add_component(name, qualified_name, Some(parent)).unwrap()
    }

    fn udt(ns: &mut NodeStorage, name: &str, qualified_name: &str, parent: UniqueId, kind: UdtKind) -> UniqueId {
        ns.add_logical_entity(name, qualified_name, Some(parent), kind).unwrap()
    }

    fn find(ns: &mut NodeStorage, kind: DiagramType, qualified_name: &str) -> Option<UniqueId> {
        ns.find_by_qualified_name(kind, qualified_name).unwrap().map(LakosianNode::uid)
    }

    fn nodes_added(events: &Receiver<NodeStorageEvent>) -> usize {
        events
            .try_iter()
            .filter(|e| matches!(e, NodeStorageEvent::NodeAdded { .. }))
            .count()
    }

    #[test]
    fn test_add_entities() {
        let (_dir, path, mut ns) = storage();
        let events = ns.subscribe();

        assert!(ns.find_by_id(UniqueId::new(Package, 15)).unwrap().is_none());
        assert!(find(&mut ns, Package, "non-existing-name").is_none());

        let tmz = pkg(&mut ns, "tmz", "tmz", None);
        assert_eq!(nodes_added(&events), 1);
        assert_eq!(find(&mut ns, Package, "tmz"), Some(tmz));
        assert!(find(&mut ns, Component, "tmz").is_none());
        assert!(find(&mut ns, Class, "tmz").is_none());
        let node = ns.find_by_id(tmz).unwrap().unwrap();
        assert_eq!(node.name(), "tmz");
        assert_eq!(node.kind(), Package);
        assert!(ns.children(tmz).unwrap().is_empty());

        let tmzcmp = comp(&mut ns, "tmzcmp", "tmz/tmzcmp", tmz);
        assert_eq!(nodes_added(&events), 1);
        assert!(find(&mut ns, Package, "tmz/tmzcmp").is_none());
        assert_eq!(find(&mut ns, Component, "tmz/tmzcmp"), Some(tmzcmp));
        {
            let mut other = NodeStorage::new().unwrap();
            other.set_database_source_path(&path).unwrap();
            assert!(find(&mut other, Component, "tmz/tmzcmp").is_some());
        }
        assert_eq!(ns.children(tmz).unwrap(), vec![tmzcmp]);

        let tmzcmpa = udt(&mut ns, "tmzcmpa", "tmzcmp::tmzcmpa", tmzcmp, UdtKind::Class);
        assert_eq!(nodes_added(&events), 1);
        assert_eq!(find(&mut ns, Class, "tmzcmp::tmzcmpa"), Some(tmzcmpa));
        assert!(find(&mut ns, Component, "tmzcmp::tmzcmpa").is_none());
        {
            let mut other = NodeStorage::open(&path).unwrap();
            assert!(find(&mut other, Class, "tmzcmp::tmzcmpa").is_some());
        }
        assert_eq!(ns.children(tmzcmp).unwrap(), vec![tmzcmpa]);
        assert_eq!(ns.parent_hierarchy(tmzcmpa).unwrap(), vec![tmz, tmzcmp, tmzcmpa]);

        let r = ns.add_logical_entity("somepkg", "somepkg", Some(tmz), UdtKind::Class);
        assert!(matches!(r, Err(ErrorAddUdt::BadParentType)));
        assert!(find(&mut ns, Class, "somepkg").is_none());

        ns.remove_logical_entity(tmzcmpa).unwrap();
        assert!(find(&mut ns, Class, "tmzcmp::tmzcmpa").is_none());
        assert!(ns.find_by_id(tmzcmpa).unwrap().is_none());

        let class = udt(&mut ns, "tmzcmp_class", "tmzcmp::tmzcmp_class", tmzcmp, UdtKind::Class);
        let strukt = udt(&mut ns, "tmzcmp_struct", "tmzcmp::tmzcmp_struct", tmzcmp, UdtKind::Struct);
        let enumeration = udt(&mut ns, "tmzcmp_enum", "tmzcmp::tmzcmp_enum", tmzcmp, UdtKind::Enum);
        assert_eq!(ns.find_by_id(strukt).unwrap().unwrap().udt_kind(), Some(UdtKind::Struct));
        assert_eq!(ns.find_by_id(enumeration).unwrap().unwrap().udt_kind(), Some(UdtKind::Enum));

        let nested = udt(&mut ns, "tmzcmp_class2", "tmzcmp::tmzcmp_class::tmzcmp_class2", class, UdtKind::Class);
        assert_eq!(ns.parent(nested).unwrap(), Some(class));
        assert_eq!(ns.children(class).unwrap(), vec![nested]);
        assert_eq!(ns.parent_hierarchy(nested).unwrap(), vec![tmz, tmzcmp, class, nested]);

        let r = ns.add_logical_entity("some_klass", "tmzcmp::tmzcmp_enum::some_klass", Some(enumeration), UdtKind::Class);
        assert!(matches!(r, Err(ErrorAddUdt::BadParentType)));

        let grp = pkg(&mut ns, "grp", "grp", None);
        assert!(!ns.is_package_group(grp).unwrap());
        pkg(&mut ns, "pkg", "grp/pkg", Some(grp));
        assert!(ns.is_package_group(grp).unwrap());
        let r = ns.add_component("component", "grp::component", Some(grp));
        assert!(matches!(r, Err(ErrorAddComponent::CannotAddComponentToPkgGroup)));

        let pkg2 = pkg(&mut ns, "pkg2", "pkg2", None);
        comp(&mut ns, "component", "pkg2/component", pkg2);
        let r = ns.add_package("inner", "pkg2/inner", Some(pkg2), None);
        assert!(matches!(r, Err(ErrorAddPackage::CannotAddPackageToStandalonePackage)));

        let r = ns.add_package("tmz", "tmz", None, None);
        assert!(matches!(r, Err(ErrorAddPackage::QualifiedNameAlreadyRegistered)));
        let r = ns.add_component("orphan", "orphan", None);
        assert!(matches!(r, Err(ErrorAddComponent::MissingParent)));
    }

    #[test]
    fn test_group_may_depend_on_standalone() {
        let (_dir, _path, mut ns) = storage();
        let grp = pkg(&mut ns, "grp", "grp", None);
        let inner = pkg(&mut ns, "pkg", "grp/pkg", Some(grp));
        let a = comp(&mut ns, "a", "grp/pkg/a", inner);
        let standalone = pkg(&mut ns, "std", "std", None);
        let b = comp(&mut ns, "b", "std/b", standalone);

        ns.add_physical_dependency(grp, standalone, Concrete).unwrap();
        assert!(ns.has_provider(grp, standalone).unwrap());

        // a group depending on a standalone package may use all of its components
        ns.add_physical_dependency(a, b, Concrete).unwrap();
        assert!(ns.has_provider(a, b).unwrap());

        // but not the other way round
        let r = ns.add_physical_dependency(b, a, Concrete);
        assert!(matches!(r, Err(ErrorAddPhysicalDependency::MissingParentDependency)));
    }

    #[test]
    fn test_group_cannot_depend_on_grouped_package() {
        use ErrorAddPhysicalDependency as E;

        let (_dir, _path, mut ns) = storage();
        let a = pkg(&mut ns, "a", "groups/a", None);
        let aa = pkg(&mut ns, "aa", "groups/a/aa", Some(a));
        comp(&mut ns, "aa_x", "groups/a/aa/aa_x", aa);
        let b = pkg(&mut ns, "b", "groups/b", None);
        let bb = pkg(&mut ns, "bb", "groups/b/bb", Some(b));
        comp(&mut ns, "bb_x", "groups/b/bb/bb_x", bb);
        let standalones = pkg(&mut ns, "standalones", "standalones", None);
        let nested_std = pkg(&mut ns, "sln", "standalones/sln", Some(standalones));

        let r = ns.add_physical_dependency(b, aa, Concrete);
        assert!(matches!(r, Err(E::HierarchyLevelMismatch)));
        assert!(!ns.has_provider(b, aa).unwrap());

        // a grouped package may not reach up to a group either
        let r = ns.add_physical_dependency(bb, a, Concrete);
        assert!(matches!(r, Err(E::HierarchyLevelMismatch)));

        ns.add_physical_dependency(b, a, Concrete).unwrap();
        ns.add_physical_dependency(b, nested_std, Concrete).unwrap();
        assert!(ns.has_provider(b, nested_std).unwrap());
    }

    #[test]
    fn test_remove_packages() {
        {
            let (_dir, _path, mut ns) = storage();
            let pkg1 = pkg(&mut ns, "pkg1", "pkg1", None);
            let pkg2 = pkg(&mut ns, "pkg2", "pkg2", None);
            assert_eq!(ns.get_top_level_packages().unwrap().len(), 2);
            ns.remove_package(pkg1).unwrap();
            assert_eq!(ns.get_top_level_packages().unwrap(), vec![pkg2]);
            ns.remove_package(pkg2).unwrap();
            assert!(ns.get_top_level_packages().unwrap().is_empty());
        }

        {
            let (_dir, _path, mut ns) = storage();
            let pkg1 = pkg(&mut ns, "pkg1", "pkg1", None);
            let pkg2 = pkg(&mut ns, "pkg2", "pkg2", Some(pkg1));
            assert_eq!(ns.children(pkg1).unwrap().len(), 1);
            assert_eq!(ns.get_top_level_packages().unwrap().len(), 1);

            let r = ns.remove_package(pkg1);
            assert!(matches!(r, Err(ErrorRemoveEntity::CannotRemoveWithChildren)));
            assert_eq!(ns.get_top_level_packages().unwrap().len(), 1);

            ns.remove_package(pkg2).unwrap();
            assert!(ns.children(pkg1).unwrap().is_empty());
            ns.remove_package(pkg1).unwrap();
            assert!(ns.get_top_level_packages().unwrap().is_empty());
        }

        {
            let (_dir, _path, mut ns) = storage();
            let pkg1 = pkg(&mut ns, "pkg1", "pkg1", None);
            let pkg2 = pkg(&mut ns, "pkg2", "pkg2", None);
            ns.add_physical_dependency(pkg1, pkg2, Concrete).unwrap();

            let r = ns.remove_package(pkg1);
            assert!(matches!(r, Err(ErrorRemoveEntity::CannotRemoveWithProviders)));
            let r = ns.remove_package(pkg2);
            assert!(matches!(r, Err(ErrorRemoveEntity::CannotRemoveWithClients)));
            assert_eq!(ns.get_top_level_packages().unwrap().len(), 2);
        }
    }

    #[test]
    fn test_failed_removal_keeps_nodes() {
        let (_dir, _path, mut ns) = storage();
        let p = pkg(&mut ns, "p", "p", None);
        let c = comp(&mut ns, "c", "p/c", p);
        let t = udt(&mut ns, "T", "p::T", c, UdtKind::Class);
        let empty = comp(&mut ns, "empty", "p/empty", p);
        ns.db
            .conn
            .execute_batch(
                "CREATE TRIGGER keep_components BEFORE DELETE ON source_component
                 BEGIN SELECT RAISE(ABORT, 'locked'); END;
                 CREATE TRIGGER keep_types BEFORE DELETE ON class_declaration
                 BEGIN SELECT RAISE(ABORT, 'locked'); END;",
            )
            .unwrap();
        let events = ns.subscribe();

        let r = ns.remove_logical_entity(t);
        assert!(matches!(r, Err(ErrorRemoveEntity::Storage(_))));
        assert!(ns.find_by_id(t).unwrap().is_some());
        assert_eq!(ns.children(c).unwrap(), vec![t]);

        let r = ns.remove_component(empty);
        assert!(matches!(r, Err(ErrorRemoveEntity::Storage(_))));
        assert!(ns.find_by_id(empty).unwrap().is_some());
        assert_eq!(ns.children(p).unwrap(), vec![c, empty]);
        assert_eq!(events.try_iter().count(), 0);
    }

    #[test]
    fn test_add_dependency_relationship() {
        use ErrorAddPhysicalDependency as E;

        let (_dir, _path, mut ns) = storage();
        let a = pkg(&mut ns, "a", "a", None);
        let b = pkg(&mut ns, "b", "b", None);
        let aa = pkg(&mut ns, "aa", "aa", Some(a));
        let ab = pkg(&mut ns, "ab", "ab", Some(a));
        let ba = pkg(&mut ns, "ba", "ba", Some(b));
        let sln = pkg(&mut ns, "sln", "standalones/sln", None);
        let aaa = comp(&mut ns, "aaa", "aaa", aa);
        let aab = comp(&mut ns, "aab", "aab", aa);
        let aba = comp(&mut ns, "aba", "aba", ab);
        let baa = comp(&mut ns, "baa", "baa", ba);

        // components of the same package
        ns.add_physical_dependency(aaa, aab, Concrete).unwrap();
        assert!(ns.has_provider(aaa, aab).unwrap());
        assert!(!ns.has_provider(aab, aaa).unwrap());

        let r = ns.add_physical_dependency(aaa, aaa, Concrete);
        assert!(matches!(r, Err(E::SelfRelation)));
        let r = ns.add_physical_dependency(aaa, aab, Concrete);
        assert!(matches!(r, Err(E::DependencyAlreadyExists)));

        // components of different packages need their packages to depend on each other
        let r = ns.add_physical_dependency(aba, aaa, Concrete);
        assert!(matches!(r, Err(E::MissingParentDependency)));
        ns.add_physical_dependency(ab, aa, Concrete).unwrap();
        ns.add_physical_dependency(aba, aaa, Concrete).unwrap();
        assert!(ns.has_provider(aba, aaa).unwrap());

        let r = ns.add_physical_dependency(aaa, ab, Concrete);
        assert!(matches!(r, Err(E::HierarchyLevelMismatch)));
        let r = ns.add_physical_dependency(ab, aaa, Concrete);
        assert!(matches!(r, Err(E::HierarchyLevelMismatch)));

        let r = ns.add_physical_dependency(baa, aaa, Concrete);
        assert!(matches!(r, Err(E::MissingParentDependency)));
        let r = ns.add_physical_dependency(ba, aa, Concrete);
        assert!(matches!(r, Err(E::MissingParentDependency)));

        ns.add_physical_dependency(b, a, Concrete).unwrap();
        let r = ns.add_physical_dependency(baa, aaa, Concrete);
        assert!(matches!(r, Err(E::MissingParentDependency)));
        assert!(ns.has_provider(b, a).unwrap());

        ns.add_physical_dependency(ba, aa, Concrete).unwrap();
        ns.add_physical_dependency(baa, aaa, Concrete).unwrap();
        assert!(ns.has_provider(ba, aa).unwrap());
        assert!(ns.has_provider(baa, aaa).unwrap());

        ns.remove_physical_dependency(baa, aaa, Concrete).unwrap();
        assert!(!ns.has_provider(baa, aaa).unwrap());
        let r = ns.remove_physical_dependency(baa, aaa, Concrete);
        assert!(matches!(r, Err(ErrorRemovePhysicalDependency::InexistentRelation)));
        ns.add_physical_dependency(baa, aaa, Concrete).unwrap();
        assert!(ns.has_provider(baa, aaa).unwrap());

        // no physical dependencies between types
        let x = udt(&mut ns, "x", "x", aaa, UdtKind::Class);
        let y = udt(&mut ns, "y", "y", aaa, UdtKind::Class);
        let r = ns.add_physical_dependency(x, y, Concrete);
        assert!(matches!(r, Err(E::InvalidType)));
        assert!(!ns.has_provider(x, y).unwrap());

        // allowed dependencies only exist between packages
        ns.remove_physical_dependency(baa, aaa, Concrete).unwrap();
        let r = ns.add_physical_dependency(baa, aaa, Allowed);
        assert!(matches!(r, Err(E::InvalidType)));

        ns.remove_physical_dependency(ba, aa, Concrete).unwrap();
        assert!(!ns.has_provider(ba, aa).unwrap());
        ns.add_physical_dependency(ba, aa, Allowed).unwrap();
        assert!(ns.has_provider(ba, aa).unwrap());
        assert!(ns.has_allowed_dependency(ba, aa).unwrap());
        assert!(!ns.has_concrete_dependency(ba, aa).unwrap());
        ns.add_physical_dependency(ba, aa, Concrete).unwrap();
        assert!(ns.has_allowed_dependency(ba, aa).unwrap());
        assert!(ns.has_concrete_dependency(ba, aa).unwrap());
        ns.remove_physical_dependency(ba, aa, Allowed).unwrap();
        assert!(ns.has_provider(ba, aa).unwrap());
        assert!(!ns.has_allowed_dependency(ba, aa).unwrap());
        ns.remove_physical_dependency(ba, aa, Concrete).unwrap();
        assert!(!ns.has_provider(ba, aa).unwrap());

        // groups and standalone packages depend on each other freely
        ns.add_physical_dependency(a, sln, Concrete).unwrap();
        assert!(ns.has_provider(a, sln).unwrap());
        ns.remove_physical_dependency(a, sln, Concrete).unwrap();
        assert!(!ns.has_provider(a, sln).unwrap());
        ns.add_physical_dependency(sln, a, Concrete).unwrap();
        assert!(ns.has_provider(sln, a).unwrap());
        ns.remove_physical_dependency(sln, a, Concrete).unwrap();
        assert!(!ns.has_provider(sln, a).unwrap());
    }

    #[test]
    fn test_group_lifts_package_edges() {
        let (_dir, _path, mut ns) = storage();
        let one = pkg(&mut ns, "one", "groups/one", None);
        let onea = pkg(&mut ns, "onea", "groups/one/onea", Some(one));
        let two = pkg(&mut ns, "two", "groups/two", None);
        let twoa = pkg(&mut ns, "twoa", "groups/two/twoa", Some(two));

        ns.add_physical_dependency(two, one, Allowed).unwrap();
        ns.add_physical_dependency(twoa, onea, Concrete).unwrap();
        ns.remove_physical_dependency(two, one, Allowed).unwrap();

        assert!(!ns.has_concrete_dependency(two, one).unwrap());
        assert!(!ns.has_allowed_dependency(two, one).unwrap());
        let providers = ns.providers(two).unwrap();
        assert_eq!(providers, vec![LakosianEdge::new(LakosRelationType::PackageDependency, one)]);
        let clients = ns.clients(one).unwrap();
        assert_eq!(clients.iter().map(|e| e.other).collect::<Vec<_>>(), vec![two]);
    }

    #[test]
    fn test_renamed_entity() {
        let (_dir, path, mut ns) = storage();
        let some_pkg = pkg(&mut ns, "a", "a", None);
        let events = ns.subscribe();
        assert!(ns.rename_node(some_pkg, "b").unwrap());

        assert!(find(&mut ns, Package, "a").is_none());
        assert_eq!(find(&mut ns, Package, "b"), Some(some_pkg));
        assert_eq!(events.try_recv().unwrap(), NodeStorageEvent::NodeRenamed(some_pkg));

        let mut other = NodeStorage::open(&path).unwrap();
        assert_eq!(find(&mut other, Package, "b"), Some(some_pkg));
        assert!(!ns.rename_node(UniqueId::new(Package, 99), "c").unwrap());
    }

    #[test]
    fn test_connect_renamed_entities() {
        let (_dir, _path, mut ns) = storage();
        let a = pkg(&mut ns, "a", "a", None);
        let b = pkg(&mut ns, "b", "b", None);
        assert!(!ns.has_provider(a, b).unwrap());
        ns.rename_node(a, "c").unwrap();
        ns.add_physical_dependency(a, b, Concrete).unwrap();
        assert!(ns.has_provider(a, b).unwrap());
    }

    #[test]
    fn test_renamed_parent_gets_no_ghost_children() {
        let (_dir, _path, mut ns) = storage();
        let a = pkg(&mut ns, "a", "a", None);
        ns.rename_node(a, "c").unwrap();
        pkg(&mut ns, "aa", "aa", Some(a));
        assert_eq!(ns.get_top_level_packages().unwrap(), vec![a]);
    }

    #[test]
    fn test_dependency_can_be_added_again_after_removal() {
        let (_dir, _path, mut ns) = storage();
        let p = pkg(&mut ns, "pkg", "pkg", None);
        let a = comp(&mut ns, "a", "a", p);
        let b = comp(&mut ns, "b", "b", p);

        ns.add_physical_dependency(a, b, Concrete).unwrap();
        assert!(ns.has_provider(a, b).unwrap());
        ns.remove_physical_dependency(a, b, Concrete).unwrap();
        assert!(!ns.has_provider(a, b).unwrap());
        ns.add_physical_dependency(a, b, Concrete).unwrap();
        assert!(ns.has_provider(a, b).unwrap());
        assert_eq!(ns.clients(b).unwrap().len(), 1);
    }

    #[test]
    fn test_user_defined_types() {
        use ErrorAddLogicalRelation as E;

        let (_dir, _path, mut ns) = storage();
        let zoo = pkg(&mut ns, "zoo", "zoo", None);
        let animal = comp(&mut ns, "animal", "animal", zoo);
        let domestic = udt(&mut ns, "IDomesticAnimal", "cmp::IDomesticAnimal", animal, UdtKind::Class);
        let cat = udt(&mut ns, "Cat", "animal::Cat", animal, UdtKind::Class);
        let dog = udt(&mut ns, "Dog", "animal::Dog", animal, UdtKind::Class);

        ns.add_logical_relation(cat, domestic, LakosRelationType::IsA).unwrap();
        ns.add_logical_relation(dog, domestic, LakosRelationType::IsA).unwrap();
        assert!(ns.has_provider(cat, domestic).unwrap());
        assert!(ns.has_provider(dog, domestic).unwrap());
        assert_eq!(ns.clients(domestic).unwrap().len(), 2);

        let builder = comp(&mut ns, "animal_builder", "animal_builder", zoo);
        let builder_class = udt(&mut ns, "AnimalBuilder", "animal_builder::AnimalBuilder", builder, UdtKind::Class);
        let r = ns.add_logical_relation(builder_class, cat, LakosRelationType::UsesInTheImplementation);
        assert!(matches!(r, Err(E::ComponentDependencyRequired)));
        assert!(!ns.has_provider(builder_class, cat).unwrap());

        ns.add_physical_dependency(builder, animal, Concrete).unwrap();
        ns.add_logical_relation(builder_class, cat, LakosRelationType::UsesInTheImplementation)
            .unwrap();
        ns.add_logical_relation(builder_class, dog, LakosRelationType::UsesInTheImplementation)
            .unwrap();
        assert!(ns.has_provider(builder_class, cat).unwrap());
        assert!(ns.has_provider(builder_class, dog).unwrap());

        let r = ns.add_logical_relation(builder_class, cat, LakosRelationType::UsesInTheImplementation);
        assert!(matches!(r, Err(E::AlreadyHaveDependency)));
        let r = ns.add_logical_relation(builder_class, builder_class, LakosRelationType::IsA);
        assert!(matches!(r, Err(E::SelfRelation)));
        let r = ns.add_logical_relation(dog, builder_class, LakosRelationType::UsesInNameOnly);
        assert!(matches!(r, Err(E::InvalidLakosRelationType(_))));
        assert!(!ns.has_provider(dog, builder_class).unwrap());

        ns.remove_logical_relation(cat, domestic, LakosRelationType::IsA).unwrap();
        assert!(!ns.has_provider(cat, domestic).unwrap());

        // dog is a domestic animal, but does not use one in its implementation
        let r = ns.remove_logical_relation(dog, domestic, LakosRelationType::UsesInTheImplementation);
        assert!(matches!(r, Err(ErrorRemoveLogicalRelation::InexistentRelation)));
        assert!(ns.has_provider(dog, domestic).unwrap());

        let r = ns.remove_logical_entity(domestic);
        assert!(matches!(r, Err(ErrorRemoveEntity::CannotRemoveWithClients)));
    }

    #[test]
    fn test_logical_relation_across_packages() {
        let (_dir, _path, mut ns) = storage();
        let p = pkg(&mut ns, "p", "p", None);
        let c = comp(&mut ns, "c", "c", p);
        let outer = udt(&mut ns, "Outer", "Outer", c, UdtKind::Struct);
        let inner = udt(&mut ns, "Inner", "Outer::Inner", outer, UdtKind::Class);
        let other = udt(&mut ns, "Other", "Other", c, UdtKind::Class);

        let r = ns.add_logical_relation(inner, other, LakosRelationType::UsesInTheInterface);
        assert!(matches!(r, Err(ErrorAddLogicalRelation::ParentDependencyRequired)));
        let r = ns.add_logical_relation(inner, c, LakosRelationType::IsA);
        assert!(matches!(r, Err(ErrorAddLogicalRelation::InvalidRelation)));
    }

    #[test]
    fn test_reparent_entity() {
        let (_dir, _path, mut ns) = storage();
        let a = pkg(&mut ns, "a", "a", None);
        let b = pkg(&mut ns, "b", "b", None);
        let aa = comp(&mut ns, "aa", "aa", a);
        let some_class = udt(&mut ns, "some_class", "some_class", aa, UdtKind::Class);

        assert_eq!(ns.parent(aa).unwrap(), Some(a));
        assert_eq!(ns.children(a).unwrap(), vec![aa]);
        assert!(ns.children(b).unwrap().is_empty());

        ns.reparent_entity(aa, b).unwrap();

        assert_eq!(ns.parent(aa).unwrap(), Some(b));
        assert_eq!(ns.children(b).unwrap(), vec![aa]);
        assert!(ns.children(a).unwrap().is_empty());
        let fields = ns.db.udt_fields_by_id(some_class.id).unwrap().unwrap();
        assert_eq!(fields.parent_package_id, Some(b.id));

        let r = ns.reparent_entity(some_class, a);
        assert!(matches!(r, Err(ErrorReparentEntity::InvalidEntity)));
        let r = ns.reparent_entity(aa, some_class);
        assert!(matches!(r, Err(ErrorReparentEntity::InvalidParent)));
    }

    #[test]
    fn test_reparent_moves_package_dependencies() {
        let (_dir, _path, mut ns) = storage();
        let a = pkg(&mut ns, "a", "a", None);
        let b = pkg(&mut ns, "b", "b", None);
        let c = pkg(&mut ns, "c", "c", None);
        let a1 = comp(&mut ns, "a1", "a/a1", a);
        comp(&mut ns, "a2", "a/a2", a);
        let c1 = comp(&mut ns, "c1", "c/c1", c);
        ns.add_physical_dependency(a, c, Concrete).unwrap();
        ns.add_physical_dependency(a1, c1, Concrete).unwrap();

        let events = ns.subscribe();
        ns.reparent_entity(a1, b).unwrap();

        assert!(ns.has_provider(b, c).unwrap());
        assert!(!ns.has_provider(a, c).unwrap());
        assert!(ns.has_provider(a1, c1).unwrap());

        let events: Vec<_> = events.try_iter().collect();
        assert_eq!(
            events,
            vec![
                NodeStorageEvent::EntityReparented {
                    entity: a1,
                    old_parent: a,
                    new_parent: b,
                },
                NodeStorageEvent::PhysicalDependencyAdded {
                    source: b,
                    target: c,
                    dependency: Concrete,
                },
                NodeStorageEvent::PhysicalDependencyRemoved {
                    source: a,
                    target: c,
                    dependency: Concrete,
                },
                NodeStorageEvent::StorageChanged,
            ]
        );
    }

    #[test]
    fn test_signals() {
        let (_dir, _path, mut ns) = storage();
        let events = ns.subscribe();
        let payload = serde_json::json!({"x": 1});
        let a = ns.add_package("a", "a", None, Some(payload.clone())).unwrap();
        let b = pkg(&mut ns, "b", "b", None);
        ns.add_physical_dependency(a, b, Concrete).unwrap();
        ns.clear();

        let events: Vec<_> = events.try_iter().collect();
        assert_eq!(
            events,
            vec![
                NodeStorageEvent::NodeAdded {
                    node: a,
                    userdata: Some(payload),
                },
                NodeStorageEvent::StorageChanged,
                NodeStorageEvent::NodeAdded {
                    node: b,
                    userdata: None,
                },
                NodeStorageEvent::StorageChanged,
                NodeStorageEvent::PhysicalDependencyAdded {
                    source: a,
                    target: b,
                    dependency: Concrete,
                },
                NodeStorageEvent::StorageChanged,
                NodeStorageEvent::StorageCleared,
            ]
        );
    }

    #[test]
    fn test_close_database() {
        let (_dir, path, mut ns) = storage();
        pkg(&mut ns, "a", "a", None);
        ns.close_database().unwrap();
        assert!(find(&mut ns, Package, "a").is_none());
        assert!(ns.get_top_level_packages().unwrap().is_empty());

        ns.set_database_source_path(&path).unwrap();
        assert!(find(&mut ns, Package, "a").is_some());
        let result = ns.raw_db_query("SELECT qualified_name FROM source_package").unwrap();
        assert_eq!(result.data, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_repository_is_top_level() {
        let (_dir, _path, mut ns) = storage();
        ns.db
            .conn
            .execute(
                "INSERT INTO source_repository (name, qualified_name, disk_path) VALUES ('kde', 'kde', '/src')",
                [],
            )
            .unwrap();
        let repo = find(&mut ns, DiagramType::Repository, "kde").unwrap();
        let grp = pkg(&mut ns, "KCoreAddons", "KCoreAddons", Some(repo));
        let loose = pkg(&mut ns, "loose", "loose", None);

        assert_eq!(ns.get_top_level_packages().unwrap(), vec![repo, loose]);
        assert_eq!(ns.children(repo).unwrap(), vec![grp]);
        assert_eq!(ns.parent(grp).unwrap(), Some(repo));
        assert_eq!(
            ns.find_by_qualified_name_any("KCoreAddons").unwrap().map(LakosianNode::uid),
            Some(grp)
        );
    }
}
