//! Relationship helpers. Every edge is stored on both ends, self edges are
//! skipped and duplicates ignored.

use super::entities::push_unique;
use super::ids::*;
use super::StoreData;

/// Edge between two entities of the same kind.
macro_rules! peer_edge {
    ($(#[$meta:meta])* $fn_name:ident, $arena:ident, $id:ty, $forward:ident, $reverse:ident) => {
        $(#[$meta])*
        pub fn $fn_name(&mut self, source: $id, target: $id) {
            if source == target || !self.$arena.contains(source) || !self.$arena.contains(target) {
                return;
            }
            if let Some(s) = self.$arena.get_mut(source) {
                push_unique(&mut s.$forward, target);
            }
            if let Some(t) = self.$arena.get_mut(target) {
                push_unique(&mut t.$reverse, source);
            }
        }
    };
}

/// Edge between two entities of different kinds.
macro_rules! link_edge {
    ($(#[$meta:meta])* $fn_name:ident, $a_arena:ident, $a_id:ty, $a_list:ident, $b_arena:ident, $b_id:ty, $b_list:ident) => {
        $(#[$meta])*
        pub fn $fn_name(&mut self, a: $a_id, b: $b_id) {
            if !self.$a_arena.contains(a) || !self.$b_arena.contains(b) {
                return;
            }
            if let Some(x) = self.$a_arena.get_mut(a) {
                push_unique(&mut x.$a_list, b);
            }
            if let Some(y) = self.$b_arena.get_mut(b) {
                push_unique(&mut y.$b_list, a);
            }
        }
    };
}

impl StoreData {
    peer_edge!(
        /// Physical dependency between packages of the same level
        add_package_dependency, packages, PackageId, providers, clients
    );
    peer_edge!(
        /// Dependency declared in a `.dep` file but not necessarily used
        add_allowed_package_dependency, packages, PackageId, allowed_providers, allowed_clients
    );
    peer_edge!(add_component_dependency, components, ComponentId, providers, clients);
    peer_edge!(add_include, files, FileId, includes, included_by);
    peer_edge!(
        /// `sub` derives from `sup`
        add_is_a, types, TypeId, super_types, sub_types
    );
    peer_edge!(add_uses_in_interface, types, TypeId, uses_in_interface, used_in_interface_by);
    peer_edge!(
        add_uses_in_implementation, types, TypeId, uses_in_implementation, used_in_implementation_by
    );
    peer_edge!(add_function_call, functions, FunctionId, callees, callers);

    link_edge!(add_method_argument_type, methods, MethodId, argument_types, types, TypeId, argument_of);
    link_edge!(add_field_type, fields, FieldId, variable_types, types, TypeId, field_type_of);
    link_edge!(add_type_file, types, TypeId, files, files, FileId, types);
    link_edge!(add_type_component, types, TypeId, components, components, ComponentId, types);
    link_edge!(add_namespace_file, namespaces, NamespaceId, files, files, FileId, namespaces);
    link_edge!(add_function_file, functions, FunctionId, files, files, FileId, functions);

    /// Record `from` including `to` and lift the relation to the components
    /// and, level by level, to the packages containing them.
    pub fn add_include_with_propagation(&mut self, from: FileId, to: FileId) {
        self.add_include(from, to);

        let component_of = |data: &StoreData, f: FileId| data.files.read(f).and_then(|f| f.component);
        let (Some(from_comp), Some(to_comp)) = (component_of(self, from), component_of(self, to)) else {
            return;
        };
        self.add_component_dependency(from_comp, to_comp);

        let package_of = |data: &StoreData, c: ComponentId| data.components.read(c).and_then(|c| c.package);
        let mut from_pkg = package_of(self, from_comp);
        let mut to_pkg = package_of(self, to_comp);
        while let (Some(source), Some(target)) = (from_pkg, to_pkg) {
            self.add_package_dependency(source, target);
            from_pkg = self.packages.read(source).and_then(|p| p.parent);
            to_pkg = self.packages.read(target).and_then(|p| p.parent);
        }
    }
}
