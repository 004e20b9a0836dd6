//! In-memory object store
//!
//! [`ObjectStore`] owns every entity of the code model behind one
//! `RwLock<StoreData>`. Inside, each entity sits in an arena slot with a lock
//! of its own:
//! - readers take the store read lock and then lock single entities
//! - writers take the store write lock and reach entities through `get_mut`
//!   without further locking
//!
//! Entities refer to each other by typed ids, never by reference.

pub mod arena;
mod edges;
pub mod entities;
mod removal;

pub use arena::{Arena, ArenaId};
pub use entities::*;

use crate::kinds::{ErrorKind, State};
use entities::push_unique;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod ids {
    use super::arena::arena_id;

    arena_id!(
        RepositoryId,
        PackageId,
        ComponentId,
        FileId,
        NamespaceId,
        TypeId,
        FunctionId,
        MethodId,
        FieldId,
        VariableId,
        ErrorId,
    );
}

pub use ids::*;

/// Any entity id, used to track what a cascading removal already visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Repository(RepositoryId),
    Package(PackageId),
    Component(ComponentId),
    File(FileId),
    Namespace(NamespaceId),
    Type(TypeId),
    Function(FunctionId),
    Method(MethodId),
    Field(FieldId),
    Variable(VariableId),
}

/// Everything guarded by the store lock.
#[derive(Default)]
pub struct StoreData {
    pub repositories: Arena<RepositoryId, Repository>,
    pub packages: Arena<PackageId, Package>,
    pub components: Arena<ComponentId, Component>,
    pub files: Arena<FileId, File>,
    pub namespaces: Arena<NamespaceId, Namespace>,
    pub types: Arena<TypeId, Type>,
    pub functions: Arena<FunctionId, Function>,
    pub methods: Arena<MethodId, Method>,
    pub fields: Arena<FieldId, Field>,
    pub variables: Arena<VariableId, Variable>,
    pub errors: Arena<ErrorId, ErrorRecord>,
    pub state: State,
}

impl StoreData {
    // ========== Physical entities ==========

    pub fn get_or_add_repository(&mut self, name: &str, disk_path: &str) -> RepositoryId {
        if let Some(id) = self.repositories.id_of(name) {
            return id;
        }
        self.repositories.insert(
            name.to_string(),
            Repository {
                name: name.to_string(),
                disk_path: disk_path.to_string(),
                packages: Vec::new(),
            },
        )
    }

    pub fn get_or_add_package(
        &mut self,
        qualified_name: &str,
        name: &str,
        disk_path: &str,
        parent: Option<PackageId>,
        repository: Option<RepositoryId>,
    ) -> PackageId {
        if let Some(id) = self.packages.id_of(qualified_name) {
            return id;
        }
        let id = self.packages.insert(
            qualified_name.to_string(),
            Package {
                qualified_name: qualified_name.to_string(),
                name: name.to_string(),
                disk_path: disk_path.to_string(),
                parent,
                repository,
                ..Default::default()
            },
        );
        if let Some(p) = parent.and_then(|p| self.packages.get_mut(p)) {
            push_unique(&mut p.children, id);
        }
        if let Some(r) = repository.and_then(|r| self.repositories.get_mut(r)) {
            push_unique(&mut r.packages, id);
        }
        id
    }

    pub fn get_or_add_component(
        &mut self,
        qualified_name: &str,
        name: &str,
        package: Option<PackageId>,
    ) -> ComponentId {
        if let Some(id) = self.components.id_of(qualified_name) {
            return id;
        }
        let id = self.components.insert(
            qualified_name.to_string(),
            Component {
                qualified_name: qualified_name.to_string(),
                name: name.to_string(),
                package,
                ..Default::default()
            },
        );
        if let Some(p) = package.and_then(|p| self.packages.get_mut(p)) {
            push_unique(&mut p.components, id);
        }
        id
    }

    pub fn get_or_add_file(
        &mut self,
        qualified_name: &str,
        name: &str,
        is_header: bool,
        hash: &str,
        package: Option<PackageId>,
        component: Option<ComponentId>,
    ) -> FileId {
        if let Some(id) = self.files.id_of(qualified_name) {
            return id;
        }
        let id = self.files.insert(
            qualified_name.to_string(),
            File {
                qualified_name: qualified_name.to_string(),
                name: name.to_string(),
                is_header,
                hash: hash.to_string(),
                package,
                component,
                ..Default::default()
            },
        );
        if let Some(c) = component.and_then(|c| self.components.get_mut(c)) {
            push_unique(&mut c.files, id);
        }
        id
    }

    pub fn get_or_add_error(
        &mut self,
        kind: ErrorKind,
        qualified_name: &str,
        message: &str,
        file_name: &str,
    ) -> ErrorId {
        let record = ErrorRecord {
            kind,
            qualified_name: qualified_name.to_string(),
            message: message.to_string(),
            file_name: file_name.to_string(),
        };
        self.errors.insert(record.storage_key(), record)
    }

    // ========== Logical entities ==========

    pub fn get_or_add_namespace(&mut self, namespace: Namespace) -> NamespaceId {
        if let Some(id) = self.namespaces.id_of(&namespace.qualified_name) {
            return id;
        }
        let parent = namespace.parent;
        let id = self
            .namespaces
            .insert(namespace.qualified_name.clone(), namespace);
        if let Some(p) = parent.and_then(|p| self.namespaces.get_mut(p)) {
            push_unique(&mut p.children, id);
        }
        id
    }

    pub fn get_or_add_type(&mut self, udt: Type) -> TypeId {
        if let Some(id) = self.types.id_of(&udt.qualified_name) {
            return id;
        }
        let (namespace, parent, package) = (udt.parent_namespace, udt.parent, udt.package);
        let id = self.types.insert(udt.qualified_name.clone(), udt);
        if let Some(ns) = namespace.and_then(|n| self.namespaces.get_mut(n)) {
            push_unique(&mut ns.types, id);
        }
        if let Some(p) = parent.and_then(|p| self.types.get_mut(p)) {
            push_unique(&mut p.children, id);
        }
        if let Some(p) = package.and_then(|p| self.packages.get_mut(p)) {
            push_unique(&mut p.types, id);
        }
        id
    }

    pub fn get_or_add_function(&mut self, function: Function) -> FunctionId {
        let key = function.storage_key();
        if let Some(id) = self.functions.id_of(&key) {
            return id;
        }
        let namespace = function.parent_namespace;
        let id = self.functions.insert(key, function);
        if let Some(ns) = namespace.and_then(|n| self.namespaces.get_mut(n)) {
            push_unique(&mut ns.functions, id);
        }
        id
    }

    pub fn get_or_add_method(&mut self, method: Method) -> MethodId {
        let key = method.storage_key();
        if let Some(id) = self.methods.id_of(&key) {
            return id;
        }
        let parent = method.parent;
        let id = self.methods.insert(key, method);
        if let Some(t) = parent.and_then(|t| self.types.get_mut(t)) {
            push_unique(&mut t.methods, id);
        }
        id
    }

    pub fn get_or_add_field(&mut self, field: Field) -> FieldId {
        if let Some(id) = self.fields.id_of(&field.qualified_name) {
            return id;
        }
        let parent = field.parent;
        let id = self.fields.insert(field.qualified_name.clone(), field);
        if let Some(t) = parent.and_then(|t| self.types.get_mut(t)) {
            push_unique(&mut t.fields, id);
        }
        id
    }

    pub fn get_or_add_variable(&mut self, variable: Variable) -> VariableId {
        if let Some(id) = self.variables.id_of(&variable.qualified_name) {
            return id;
        }
        let namespace = variable.parent_namespace;
        let id = self
            .variables
            .insert(variable.qualified_name.clone(), variable);
        if let Some(ns) = namespace.and_then(|n| self.namespaces.get_mut(n)) {
            push_unique(&mut ns.variables, id);
        }
        id
    }

    // ========== Lookups ==========

    pub fn get_repository(&self, name: &str) -> Option<RepositoryId> {
        self.repositories.id_of(name)
    }

    pub fn get_package(&self, qualified_name: &str) -> Option<PackageId> {
        self.packages.id_of(qualified_name)
    }

    pub fn get_component(&self, qualified_name: &str) -> Option<ComponentId> {
        self.components.id_of(qualified_name)
    }

    pub fn get_file(&self, qualified_name: &str) -> Option<FileId> {
        self.files.id_of(qualified_name)
    }

    pub fn get_namespace(&self, qualified_name: &str) -> Option<NamespaceId> {
        self.namespaces.id_of(qualified_name)
    }

    pub fn get_type(&self, qualified_name: &str) -> Option<TypeId> {
        self.types.id_of(qualified_name)
    }

    pub fn get_function(
        &self,
        qualified_name: &str,
        signature: &str,
        template_parameters: &str,
        return_type: &str,
    ) -> Option<FunctionId> {
        self.functions
            .id_of(&callable_key(qualified_name, signature, template_parameters, return_type))
    }

    pub fn get_method(
        &self,
        qualified_name: &str,
        signature: &str,
        template_parameters: &str,
        return_type: &str,
    ) -> Option<MethodId> {
        self.methods
            .id_of(&callable_key(qualified_name, signature, template_parameters, return_type))
    }

    pub fn get_field(&self, qualified_name: &str) -> Option<FieldId> {
        self.fields.id_of(qualified_name)
    }

    pub fn get_variable(&self, qualified_name: &str) -> Option<VariableId> {
        self.variables.id_of(qualified_name)
    }

    pub fn get_error(&self, qualified_name: &str, message: &str, file_name: &str) -> Option<ErrorId> {
        self.errors.id_of(&error_key(qualified_name, message, file_name))
    }

    /// Qualified name of a package, empty when it no longer exists.
    pub fn package_name(&self, id: PackageId) -> String {
        self.packages
            .read(id)
            .map(|p| p.qualified_name.clone())
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        *self = StoreData::default();
    }
}

/// Concurrent container of the whole code model.
#[derive(Default)]
pub struct ObjectStore {
    data: RwLock<StoreData>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_read<R>(&self, f: impl FnOnce(&StoreData) -> R) -> R {
        f(&self.read())
    }

    pub fn with_write<R>(&self, f: impl FnOnce(&mut StoreData) -> R) -> R {
        f(&mut self.write())
    }

    /// Swap in a fully built model.
    pub fn replace(&self, data: StoreData) {
        *self.write() = data;
    }

    pub fn state(&self) -> State {
        self.read().state
    }

    pub fn set_state(&self, state: State) {
        self.write().state = state;
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Load a database written by [`ObjectStore::write_to_database`].
    ///
    /// On failure the store is left untouched.
    pub fn read_from_database(&self, path: &Path) -> crate::Result<()> {
        let db = crate::storage::SqliteStore::open_existing(path)?;
        db.read_into(self)
    }

    pub fn write_to_database(&self, path: &Path) -> crate::Result<()> {
        let mut db = crate::storage::SqliteStore::open(path)?;
        db.write_store(self)
    }

    // ========== Locking wrappers ==========

    pub fn get_or_add_repository(&self, name: &str, disk_path: &str) -> RepositoryId {
        self.write().get_or_add_repository(name, disk_path)
    }

    pub fn get_or_add_package(
        &self,
        qualified_name: &str,
        name: &str,
        disk_path: &str,
        parent: Option<PackageId>,
        repository: Option<RepositoryId>,
    ) -> PackageId {
        self.write()
            .get_or_add_package(qualified_name, name, disk_path, parent, repository)
    }

    pub fn get_or_add_component(&self, qualified_name: &str, name: &str, package: Option<PackageId>) -> ComponentId {
        self.write().get_or_add_component(qualified_name, name, package)
    }

    pub fn get_or_add_file(
        &self,
        qualified_name: &str,
        name: &str,
        is_header: bool,
        hash: &str,
        package: Option<PackageId>,
        component: Option<ComponentId>,
    ) -> FileId {
        self.write()
            .get_or_add_file(qualified_name, name, is_header, hash, package, component)
    }

    pub fn get_or_add_error(&self, kind: ErrorKind, qualified_name: &str, message: &str, file_name: &str) -> ErrorId {
        self.write().get_or_add_error(kind, qualified_name, message, file_name)
    }

    pub fn get_or_add_namespace(&self, namespace: Namespace) -> NamespaceId {
        self.write().get_or_add_namespace(namespace)
    }

    pub fn get_or_add_type(&self, udt: Type) -> TypeId {
        self.write().get_or_add_type(udt)
    }

    pub fn get_or_add_function(&self, function: Function) -> FunctionId {
        self.write().get_or_add_function(function)
    }

    pub fn get_or_add_method(&self, method: Method) -> MethodId {
        self.write().get_or_add_method(method)
    }

    pub fn get_or_add_field(&self, field: Field) -> FieldId {
        self.write().get_or_add_field(field)
    }

    pub fn get_or_add_variable(&self, variable: Variable) -> VariableId {
        self.write().get_or_add_variable(variable)
    }

    pub fn get_package(&self, qualified_name: &str) -> Option<PackageId> {
        self.read().get_package(qualified_name)
    }

    pub fn get_file(&self, qualified_name: &str) -> Option<FileId> {
        self.read().get_file(qualified_name)
    }

    pub fn all_packages(&self) -> Vec<PackageId> {
        self.read().packages.ids()
    }

    pub fn all_files(&self) -> Vec<FileId> {
        self.read().files.ids()
    }

    pub fn all_types(&self) -> Vec<TypeId> {
        self.read().types.ids()
    }

    /// Snapshot of the qualified names of every file, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let data = self.read();
        let mut names: Vec<String> = data
            .files
            .ids()
            .into_iter()
            .filter_map(|id| data.files.read(id).map(|f| f.qualified_name.clone()))
            .collect();
        names.sort();
        names
    }

    /// Snapshot of the qualified names of every package, sorted.
    pub fn package_names(&self) -> Vec<String> {
        let data = self.read();
        let mut names: Vec<String> = data
            .packages
            .ids()
            .into_iter()
            .map(|id| data.package_name(id))
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::UdtKind;

    #[test]
    fn test_get_or_add_is_idempotent() {
        let store = ObjectStore::new();
        let repo = store.get_or_add_repository("repo", "/repo");
        let grp = store.get_or_add_package("groups/one", "one", "", None, Some(repo));
        let pkg = store.get_or_add_package("groups/one/onepkg", "onepkg", "", Some(grp), None);
        assert_eq!(store.get_or_add_package("groups/one/onepkg", "other", "x", None, None), pkg);

        let comp = store.get_or_add_component("groups/one/onepkg/onepkg_a", "onepkg_a", Some(pkg));
        let file = store.get_or_add_file("groups/one/onepkg/onepkg_a.cpp", "onepkg_a.cpp", false, "h", Some(pkg), Some(comp));
        assert_eq!(
            store.get_or_add_file("groups/one/onepkg/onepkg_a.cpp", "x", true, "", None, None),
            file
        );

        store.with_read(|data| {
            assert_eq!(data.packages.read(grp).unwrap().children, vec![pkg]);
            assert_eq!(data.repositories.read(repo).unwrap().packages, vec![grp]);
            assert_eq!(data.packages.read(pkg).unwrap().components, vec![comp]);
            assert_eq!(data.components.read(comp).unwrap().files, vec![file]);
            assert_eq!(data.packages.read(pkg).unwrap().name, "onepkg");
        });
        assert_eq!(store.package_names(), vec!["groups/one", "groups/one/onepkg"]);
    }

    #[test]
    fn test_concurrent_get_or_add_is_idempotent() {
        let store = ObjectStore::new();
        let grp = store.get_or_add_package("groups/one", "one", "", None, None);

        let seen: Vec<Vec<(PackageId, ComponentId)>> = crossbeam::scope(|s| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|_| {
                        (0..40)
                            .map(|i| {
                                let name = format!("onepkg{}", i % 8);
                                let qname = format!("groups/one/{name}");
                                let pkg = store.get_or_add_package(&qname, &name, "", Some(grp), None);
                                let comp = store.get_or_add_component(&format!("{qname}/{name}_a"), "a", Some(pkg));
                                assert_eq!(store.get_package(&qname), Some(pkg));
                                (pkg, comp)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        })
        .unwrap();

        for ids in &seen[1..] {
            assert_eq!(ids, &seen[0]);
        }
        assert_eq!(store.all_packages().len(), 9);
        store.with_read(|data| {
            assert_eq!(data.packages.read(grp).unwrap().children.len(), 8);
            assert_eq!(data.components.ids().len(), 8);
            for &(pkg, _) in &seen[0] {
                assert_eq!(data.packages.read(pkg).unwrap().components.len(), 1);
            }
        });
    }

    #[test]
    fn test_callables_use_composite_key() {
        let store = ObjectStore::new();
        let ns = store.get_or_add_namespace(Namespace::new("ns", "ns"));
        let f1 = store.get_or_add_function(Function::new("ns::f", "f").with_signature("f(int)", "void", "").in_namespace(Some(ns)));
        let f2 = store.get_or_add_function(Function::new("ns::f", "f").with_signature("f(char)", "void", "").in_namespace(Some(ns)));
        assert_ne!(f1, f2);
        assert_eq!(
            store.get_or_add_function(Function::new("ns::f", "f").with_signature("f(int)", "void", "")),
            f1
        );
        store.with_read(|data| {
            assert_eq!(data.get_function("ns::f", "f(char)", "", "void"), Some(f2));
            assert_eq!(data.namespaces.read(ns).unwrap().functions, vec![f1, f2]);
        });
    }

    #[test]
    fn test_errors_use_composite_key() {
        let store = ObjectStore::new();
        let a = store.get_or_add_error(ErrorKind::ParserError, "", "Unknown file extension", "a.txt");
        let b = store.get_or_add_error(ErrorKind::ParserError, "", "Unknown file extension", "b.txt");
        assert_ne!(a, b);
        assert_eq!(store.get_or_add_error(ErrorKind::CompilerError, "", "Unknown file extension", "a.txt"), a);
    }

    #[test]
    fn test_logical_parents_are_wired() {
        let store = ObjectStore::new();
        let ns = store.get_or_add_namespace(Namespace::new("ns", "ns"));
        let inner = store.get_or_add_namespace(Namespace::new("ns::inner", "inner").with_parent(Some(ns)));
        let outer = store.get_or_add_type(Type::new("ns::Outer", "Outer", UdtKind::Class).in_namespace(Some(ns)));
        let nested = store.get_or_add_type(Type::new("ns::Outer::Nested", "Nested", UdtKind::Struct).nested_in(Some(outer)));
        let method = store.get_or_add_method(Method::new("ns::Outer::run", "run", Some(outer)).with_signature("run()", "void", ""));
        let field = store.get_or_add_field(Field::new("ns::Outer::x", "x", Some(outer)));
        let var = store.get_or_add_variable(Variable::new("ns::inner::v", "v").in_namespace(Some(inner)).global(true));

        store.with_read(|data| {
            assert_eq!(data.namespaces.read(ns).unwrap().children, vec![inner]);
            assert_eq!(data.namespaces.read(ns).unwrap().types, vec![outer]);
            let outer = data.types.read(outer).unwrap();
            assert_eq!(outer.children, vec![nested]);
            assert_eq!(outer.methods, vec![method]);
            assert_eq!(outer.fields, vec![field]);
            assert_eq!(data.namespaces.read(inner).unwrap().variables, vec![var]);
        });
    }

    #[test]
    fn test_state_and_clear() {
        let store = ObjectStore::new();
        assert_eq!(store.state(), State::NoneReady);
        store.set_state(State::PhysicalReady);
        store.get_or_add_repository("r", "");
        store.clear();
        assert_eq!(store.state(), State::NoneReady);
        assert!(store.read().repositories.is_empty());
    }
}
