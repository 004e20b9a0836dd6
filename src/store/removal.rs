//! Cascading removal.
//!
//! Every operation takes the set of entities already visited so that cycles
//! (mutual includes, a package group emptied by removing its last package)
//! terminate. Removing a file, component or package returns the qualified
//! names of every file that went with it.

use super::entities::remove_id;
use super::ids::*;
use super::{EntityRef, StoreData};
use std::collections::HashSet;

impl StoreData {
    /// Remove a file, the files including it, and whatever is left empty.
    pub fn remove_file(&mut self, id: FileId, visited: &mut HashSet<EntityRef>) -> Vec<String> {
        if !visited.insert(EntityRef::File(id)) {
            return Vec::new();
        }
        let Some(file) = self.files.remove(id) else {
            return Vec::new();
        };
        let mut removed = Vec::new();

        for &ns in &file.namespaces {
            let empty = self
                .namespaces
                .get_mut(ns)
                .map(|n| {
                    remove_id(&mut n.files, id);
                    n.files.is_empty()
                })
                .unwrap_or(false);
            if empty {
                self.remove_namespace(ns, visited);
            }
        }

        for &t in &file.types {
            let empty = self
                .types
                .get_mut(t)
                .map(|t| {
                    remove_id(&mut t.files, id);
                    t.files.is_empty()
                })
                .unwrap_or(false);
            if empty {
                self.remove_type(t, visited);
            }
        }

        for &f in &file.functions {
            if let Some(f) = self.functions.get_mut(f) {
                remove_id(&mut f.files, id);
            }
        }

        for &included in &file.includes {
            if let Some(inc) = self.files.get_mut(included) {
                remove_id(&mut inc.included_by, id);
            }
        }

        // Includers must be parsed again
        for &includer in &file.included_by {
            removed.extend(self.remove_file(includer, visited));
        }

        if let Some(component) = file.component {
            let empty = self
                .components
                .get_mut(component)
                .map(|c| {
                    remove_id(&mut c.files, id);
                    c.files.is_empty()
                })
                .unwrap_or(false);
            if empty {
                removed.extend(self.remove_component(component, visited));
            }
        }

        tracing::debug!("Removed file {}", file.qualified_name);
        removed.push(file.qualified_name);
        removed
    }

    /// Remove a component with its files; its package goes too once it has
    /// neither components nor child packages.
    pub fn remove_component(&mut self, id: ComponentId, visited: &mut HashSet<EntityRef>) -> Vec<String> {
        if !visited.insert(EntityRef::Component(id)) {
            return Vec::new();
        }
        let Some(component) = self.components.remove(id) else {
            return Vec::new();
        };
        let mut removed = Vec::new();

        for &file in &component.files {
            removed.extend(self.remove_file(file, visited));
        }
        for &t in &component.types {
            if let Some(t) = self.types.get_mut(t) {
                remove_id(&mut t.components, id);
            }
        }
        for &p in &component.providers {
            if let Some(p) = self.components.get_mut(p) {
                remove_id(&mut p.clients, id);
            }
        }
        for &c in &component.clients {
            if let Some(c) = self.components.get_mut(c) {
                remove_id(&mut c.providers, id);
            }
        }

        if let Some(package) = component.package {
            let empty = self
                .packages
                .get_mut(package)
                .map(|p| {
                    remove_id(&mut p.components, id);
                    p.components.is_empty() && p.children.is_empty()
                })
                .unwrap_or(false);
            if empty {
                removed.extend(self.remove_package(package, visited));
            }
        }
        removed
    }

    /// Remove a package with its child packages and components; an emptied
    /// parent goes too.
    pub fn remove_package(&mut self, id: PackageId, visited: &mut HashSet<EntityRef>) -> Vec<String> {
        if !visited.insert(EntityRef::Package(id)) {
            return Vec::new();
        }
        let Some(package) = self.packages.remove(id) else {
            return Vec::new();
        };
        let mut removed = Vec::new();

        for &child in &package.children {
            removed.extend(self.remove_package(child, visited));
        }
        for &component in &package.components {
            removed.extend(self.remove_component(component, visited));
        }
        for &t in &package.types {
            if let Some(t) = self.types.get_mut(t) {
                if t.package == Some(id) {
                    t.package = None;
                }
            }
        }
        for &p in &package.providers {
            if let Some(p) = self.packages.get_mut(p) {
                remove_id(&mut p.clients, id);
            }
        }
        for &c in &package.clients {
            if let Some(c) = self.packages.get_mut(c) {
                remove_id(&mut c.providers, id);
            }
        }
        for &p in &package.allowed_providers {
            if let Some(p) = self.packages.get_mut(p) {
                remove_id(&mut p.allowed_clients, id);
            }
        }
        for &c in &package.allowed_clients {
            if let Some(c) = self.packages.get_mut(c) {
                remove_id(&mut c.allowed_providers, id);
            }
        }
        if let Some(repo) = package.repository.and_then(|r| self.repositories.get_mut(r)) {
            remove_id(&mut repo.packages, id);
        }

        if let Some(parent) = package.parent {
            let empty = self
                .packages
                .get_mut(parent)
                .map(|p| {
                    remove_id(&mut p.children, id);
                    p.children.is_empty() && p.components.is_empty()
                })
                .unwrap_or(false);
            if empty {
                removed.extend(self.remove_package(parent, visited));
            }
        }

        tracing::debug!("Removed package {}", package.qualified_name);
        removed
    }

    /// Remove a type with its nested types, methods and fields.
    pub fn remove_type(&mut self, id: TypeId, visited: &mut HashSet<EntityRef>) {
        if !visited.insert(EntityRef::Type(id)) {
            return;
        }
        let Some(udt) = self.types.remove(id) else {
            return;
        };

        if let Some(ns) = udt.parent_namespace.and_then(|n| self.namespaces.get_mut(n)) {
            remove_id(&mut ns.types, id);
        }
        if let Some(pkg) = udt.package.and_then(|p| self.packages.get_mut(p)) {
            remove_id(&mut pkg.types, id);
        }
        if let Some(parent) = udt.parent.and_then(|p| self.types.get_mut(p)) {
            remove_id(&mut parent.children, id);
        }

        for &child in &udt.children {
            self.remove_type(child, visited);
        }
        for &method in &udt.methods {
            self.remove_method(method, visited);
        }
        for &field in &udt.fields {
            self.remove_field(field, visited);
        }

        let peers = [
            (&udt.super_types, PeerList::SubTypes),
            (&udt.sub_types, PeerList::SuperTypes),
            (&udt.uses_in_interface, PeerList::UsedInInterfaceBy),
            (&udt.used_in_interface_by, PeerList::UsesInInterface),
            (&udt.uses_in_implementation, PeerList::UsedInImplementationBy),
            (&udt.used_in_implementation_by, PeerList::UsesInImplementation),
        ];
        for (list, reverse) in peers {
            for &other in list {
                if let Some(other) = self.types.get_mut(other) {
                    remove_id(reverse.of(other), id);
                }
            }
        }

        for &file in &udt.files {
            if let Some(f) = self.files.get_mut(file) {
                remove_id(&mut f.types, id);
            }
        }
        for &component in &udt.components {
            if let Some(c) = self.components.get_mut(component) {
                remove_id(&mut c.types, id);
            }
        }
        for &method in &udt.argument_of {
            if let Some(m) = self.methods.get_mut(method) {
                remove_id(&mut m.argument_types, id);
            }
        }
        for &field in &udt.field_type_of {
            if let Some(f) = self.fields.get_mut(field) {
                remove_id(&mut f.variable_types, id);
            }
        }
    }

    /// Remove a namespace with its children, types, functions and variables.
    pub fn remove_namespace(&mut self, id: NamespaceId, visited: &mut HashSet<EntityRef>) {
        if !visited.insert(EntityRef::Namespace(id)) {
            return;
        }
        let Some(ns) = self.namespaces.remove(id) else {
            return;
        };

        for &child in &ns.children {
            self.remove_namespace(child, visited);
        }
        for &t in &ns.types {
            self.remove_type(t, visited);
        }
        for &f in &ns.functions {
            self.remove_function(f, visited);
        }
        for &v in &ns.variables {
            self.remove_variable(v, visited);
        }
        if let Some(parent) = ns.parent.and_then(|p| self.namespaces.get_mut(p)) {
            remove_id(&mut parent.children, id);
        }
        for &file in &ns.files {
            if let Some(f) = self.files.get_mut(file) {
                remove_id(&mut f.namespaces, id);
            }
        }
    }

    pub fn remove_function(&mut self, id: FunctionId, visited: &mut HashSet<EntityRef>) {
        if !visited.insert(EntityRef::Function(id)) {
            return;
        }
        let Some(function) = self.functions.remove(id) else {
            return;
        };

        if let Some(ns) = function.parent_namespace.and_then(|n| self.namespaces.get_mut(n)) {
            remove_id(&mut ns.functions, id);
        }
        for &callee in &function.callees {
            if let Some(f) = self.functions.get_mut(callee) {
                remove_id(&mut f.callers, id);
            }
        }
        for &caller in &function.callers {
            if let Some(f) = self.functions.get_mut(caller) {
                remove_id(&mut f.callees, id);
            }
        }
        for &file in &function.files {
            if let Some(f) = self.files.get_mut(file) {
                remove_id(&mut f.functions, id);
            }
        }
    }

    pub fn remove_variable(&mut self, id: VariableId, visited: &mut HashSet<EntityRef>) {
        if !visited.insert(EntityRef::Variable(id)) {
            return;
        }
        let Some(variable) = self.variables.remove(id) else {
            return;
        };
        if let Some(ns) = variable.parent_namespace.and_then(|n| self.namespaces.get_mut(n)) {
            remove_id(&mut ns.variables, id);
        }
    }

    pub fn remove_method(&mut self, id: MethodId, visited: &mut HashSet<EntityRef>) {
        if !visited.insert(EntityRef::Method(id)) {
            return;
        }
        let Some(method) = self.methods.remove(id) else {
            return;
        };
        if let Some(parent) = method.parent.and_then(|t| self.types.get_mut(t)) {
            remove_id(&mut parent.methods, id);
        }
        for &t in &method.argument_types {
            if let Some(t) = self.types.get_mut(t) {
                remove_id(&mut t.argument_of, id);
            }
        }
    }

    pub fn remove_field(&mut self, id: FieldId, visited: &mut HashSet<EntityRef>) {
        if !visited.insert(EntityRef::Field(id)) {
            return;
        }
        let Some(field) = self.fields.remove(id) else {
            return;
        };
        if let Some(parent) = field.parent.and_then(|t| self.types.get_mut(t)) {
            remove_id(&mut parent.fields, id);
        }
        for &t in &field.variable_types {
            if let Some(t) = self.types.get_mut(t) {
                remove_id(&mut t.field_type_of, id);
            }
        }
    }
}

/// Type-to-type list on the far end of an edge.
#[derive(Clone, Copy)]
enum PeerList {
    SuperTypes,
    SubTypes,
    UsesInInterface,
    UsedInInterfaceBy,
    UsesInImplementation,
    UsedInImplementationBy,
}

impl PeerList {
    fn of(self, udt: &mut super::Type) -> &mut Vec<TypeId> {
        match self {
            PeerList::SuperTypes => &mut udt.super_types,
            PeerList::SubTypes => &mut udt.sub_types,
            PeerList::UsesInInterface => &mut udt.uses_in_interface,
            PeerList::UsedInInterfaceBy => &mut udt.used_in_interface_by,
            PeerList::UsesInImplementation => &mut udt.uses_in_implementation,
            PeerList::UsedInImplementationBy => &mut udt.used_in_implementation_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::UdtKind;
    use crate::store::{Field, Method, Namespace, ObjectStore, Type};

    /// groups/one/{onepkg, twopkg}, one component each with a header and a source.
    fn physical_fixture(store: &ObjectStore) -> (PackageId, PackageId, PackageId) {
        let mut data = store.write();
        let grp = data.get_or_add_package("groups/one", "one", "", None, None);
        let one = data.get_or_add_package("groups/one/onepkg", "onepkg", "", Some(grp), None);
        let two = data.get_or_add_package("groups/one/twopkg", "twopkg", "", Some(grp), None);
        for (pkg, name) in [(one, "onepkg"), (two, "twopkg")] {
            let comp_q = format!("groups/one/{name}/{name}_a");
            let comp = data.get_or_add_component(&comp_q, &format!("{name}_a"), Some(pkg));
            for ext in ["h", "cpp"] {
                let q = format!("groups/one/{name}/{name}_a.{ext}");
                data.get_or_add_file(&q, &q, ext == "h", "", Some(pkg), Some(comp));
            }
        }
        (grp, one, two)
    }

    #[test]
    fn test_remove_single_file_keeps_component() {
        let store = ObjectStore::new();
        physical_fixture(&store);
        let mut data = store.write();
        let file = data.get_file("groups/one/onepkg/onepkg_a.cpp").unwrap();

        let removed = data.remove_file(file, &mut HashSet::new());
        assert_eq!(removed, vec!["groups/one/onepkg/onepkg_a.cpp".to_string()]);
        assert!(data.get_component("groups/one/onepkg/onepkg_a").is_some());
        assert_eq!(data.files.len(), 3);
    }

    #[test]
    fn test_remove_last_files_cascades_to_group() {
        let store = ObjectStore::new();
        let (grp, one, two) = physical_fixture(&store);
        let mut data = store.write();
        let mut visited = HashSet::new();

        for pkg in ["onepkg", "twopkg"] {
            for ext in ["h", "cpp"] {
                let id = data.get_file(&format!("groups/one/{pkg}/{pkg}_a.{ext}")).unwrap();
                data.remove_file(id, &mut visited);
            }
        }

        assert!(data.files.is_empty());
        assert!(data.components.is_empty());
        assert!(!data.packages.contains(one));
        assert!(!data.packages.contains(two));
        assert!(!data.packages.contains(grp));
        assert!(visited.contains(&EntityRef::Package(grp)));
    }

    #[test]
    fn test_remove_file_removes_includers() {
        let store = ObjectStore::new();
        physical_fixture(&store);
        let mut data = store.write();
        let header = data.get_file("groups/one/onepkg/onepkg_a.h").unwrap();
        let source = data.get_file("groups/one/onepkg/onepkg_a.cpp").unwrap();
        let other = data.get_file("groups/one/twopkg/twopkg_a.cpp").unwrap();
        data.add_include(source, header);
        data.add_include(other, header);
        data.add_include(header, other);

        let mut removed = data.remove_file(header, &mut HashSet::new());
        removed.sort();
        assert_eq!(
            removed,
            vec![
                "groups/one/onepkg/onepkg_a.cpp",
                "groups/one/onepkg/onepkg_a.h",
                "groups/one/twopkg/twopkg_a.cpp",
            ]
        );
        // onepkg lost its only component, twopkg still has its header
        assert!(data.get_package("groups/one/onepkg").is_none());
        assert!(data.get_package("groups/one/twopkg").is_some());
        let twoh = data.get_file("groups/one/twopkg/twopkg_a.h").unwrap();
        assert!(data.files.read(twoh).unwrap().included_by.is_empty());
    }

    #[test]
    fn test_remove_type_detaches_everything() {
        let store = ObjectStore::new();
        let mut data = store.write();
        let ns = data.get_or_add_namespace(Namespace::new("ns", "ns"));
        let base = data.get_or_add_type(Type::new("ns::Base", "Base", UdtKind::Class).in_namespace(Some(ns)));
        let derived = data.get_or_add_type(Type::new("ns::Derived", "Derived", UdtKind::Class).in_namespace(Some(ns)));
        let nested = data.get_or_add_type(Type::new("ns::Base::Inner", "Inner", UdtKind::Struct).nested_in(Some(base)));
        let method = data.get_or_add_method(Method::new("ns::Derived::take", "take", Some(derived)));
        let field = data.get_or_add_field(Field::new("ns::Derived::b", "b", Some(derived)));
        let base_method = data.get_or_add_method(Method::new("ns::Base::run", "run", Some(base)));
        data.add_is_a(derived, base);
        data.add_uses_in_interface(derived, base);
        data.add_method_argument_type(method, base);
        data.add_field_type(field, base);

        data.remove_type(base, &mut HashSet::new());

        assert!(!data.types.contains(base));
        assert!(!data.types.contains(nested));
        assert!(!data.methods.contains(base_method));
        let d = data.types.read(derived).unwrap();
        assert!(d.super_types.is_empty());
        assert!(d.uses_in_interface.is_empty());
        drop(d);
        assert!(data.methods.read(method).unwrap().argument_types.is_empty());
        assert!(data.fields.read(field).unwrap().variable_types.is_empty());
        assert_eq!(data.namespaces.read(ns).unwrap().types, vec![derived]);
    }

    #[test]
    fn test_file_removal_drops_orphaned_namespace() {
        let store = ObjectStore::new();
        physical_fixture(&store);
        let mut data = store.write();
        let file = data.get_file("groups/one/onepkg/onepkg_a.h").unwrap();
        let keep = data.get_file("groups/one/twopkg/twopkg_a.h").unwrap();
        let lonely = data.get_or_add_namespace(Namespace::new("lonely", "lonely"));
        let shared = data.get_or_add_namespace(Namespace::new("shared", "shared"));
        let udt = data.get_or_add_type(Type::new("lonely::T", "T", UdtKind::Class).in_namespace(Some(lonely)));
        data.add_namespace_file(lonely, file);
        data.add_namespace_file(shared, file);
        data.add_namespace_file(shared, keep);
        data.add_type_file(udt, file);

        data.remove_file(file, &mut HashSet::new());

        assert!(!data.namespaces.contains(lonely));
        assert!(!data.types.contains(udt));
        assert_eq!(data.namespaces.read(shared).unwrap().files, vec![keep]);
    }
}
