//! Entities of the code model. Cross references are ids into the store.

use super::ids::*;
use crate::kinds::{AccessSpecifier, ErrorKind, UdtKind};
use serde::Serialize;

/// Append `id` unless already present.
pub(crate) fn push_unique<T: PartialEq>(list: &mut Vec<T>, id: T) {
    if !list.contains(&id) {
        list.push(id);
    }
}

pub(crate) fn remove_id<T: PartialEq>(list: &mut Vec<T>, id: T) {
    list.retain(|x| *x != id);
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Repository {
    pub name: String,
    pub disk_path: String,
    pub packages: Vec<PackageId>,
}

impl Repository {
    pub fn qualified_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Package {
    pub qualified_name: String,
    pub name: String,
    pub disk_path: String,
    pub parent: Option<PackageId>,
    pub repository: Option<RepositoryId>,
    pub children: Vec<PackageId>,
    pub components: Vec<ComponentId>,
    pub types: Vec<TypeId>,
    pub providers: Vec<PackageId>,
    pub clients: Vec<PackageId>,
    pub allowed_providers: Vec<PackageId>,
    pub allowed_clients: Vec<PackageId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Component {
    pub qualified_name: String,
    pub name: String,
    pub package: Option<PackageId>,
    pub files: Vec<FileId>,
    pub types: Vec<TypeId>,
    pub providers: Vec<ComponentId>,
    pub clients: Vec<ComponentId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct File {
    /// Path relative to the source prefix
    pub qualified_name: String,
    pub name: String,
    pub is_header: bool,
    /// blake3 of the contents, empty when the file could not be read
    pub hash: String,
    pub package: Option<PackageId>,
    pub component: Option<ComponentId>,
    pub includes: Vec<FileId>,
    pub included_by: Vec<FileId>,
    pub namespaces: Vec<NamespaceId>,
    pub types: Vec<TypeId>,
    pub functions: Vec<FunctionId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Namespace {
    pub qualified_name: String,
    pub name: String,
    pub parent: Option<NamespaceId>,
    pub children: Vec<NamespaceId>,
    pub types: Vec<TypeId>,
    pub files: Vec<FileId>,
    pub functions: Vec<FunctionId>,
    pub variables: Vec<VariableId>,
}

impl Namespace {
    pub fn new(qualified_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: Option<NamespaceId>) -> Self {
        self.parent = parent;
        self
    }
}

/// A user defined type
#[derive(Debug, Clone, Default, Serialize)]
pub struct Type {
    pub qualified_name: String,
    pub name: String,
    pub kind: UdtKind,
    pub access: AccessSpecifier,
    pub parent_namespace: Option<NamespaceId>,
    /// Enclosing type of a nested type
    pub parent: Option<TypeId>,
    pub package: Option<PackageId>,
    pub children: Vec<TypeId>,
    /// isA: this type derives from these
    pub super_types: Vec<TypeId>,
    pub sub_types: Vec<TypeId>,
    pub uses_in_interface: Vec<TypeId>,
    pub used_in_interface_by: Vec<TypeId>,
    pub uses_in_implementation: Vec<TypeId>,
    pub used_in_implementation_by: Vec<TypeId>,
    pub files: Vec<FileId>,
    pub components: Vec<ComponentId>,
    pub methods: Vec<MethodId>,
    pub fields: Vec<FieldId>,
    /// Methods taking this type as an argument
    pub argument_of: Vec<MethodId>,
    /// Fields of this type
    pub field_type_of: Vec<FieldId>,
}

impl Type {
    pub fn new(qualified_name: impl Into<String>, name: impl Into<String>, kind: UdtKind) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn with_access(mut self, access: AccessSpecifier) -> Self {
        self.access = access;
        self
    }

    pub fn in_namespace(mut self, namespace: Option<NamespaceId>) -> Self {
        self.parent_namespace = namespace;
        self
    }

    pub fn nested_in(mut self, parent: Option<TypeId>) -> Self {
        self.parent = parent;
        self
    }

    pub fn in_package(mut self, package: Option<PackageId>) -> Self {
        self.package = package;
        self
    }
}

/// A free function
#[derive(Debug, Clone, Default, Serialize)]
pub struct Function {
    pub qualified_name: String,
    pub name: String,
    pub signature: String,
    pub return_type: String,
    pub template_parameters: String,
    pub parent_namespace: Option<NamespaceId>,
    pub callees: Vec<FunctionId>,
    pub callers: Vec<FunctionId>,
    pub files: Vec<FileId>,
}

impl Function {
    pub fn new(qualified_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_signature(
        mut self,
        signature: impl Into<String>,
        return_type: impl Into<String>,
        template_parameters: impl Into<String>,
    ) -> Self {
        self.signature = signature.into();
        self.return_type = return_type.into();
        self.template_parameters = template_parameters.into();
        self
    }

    pub fn in_namespace(mut self, namespace: Option<NamespaceId>) -> Self {
        self.parent_namespace = namespace;
        self
    }

    pub fn storage_key(&self) -> String {
        callable_key(
            &self.qualified_name,
            &self.signature,
            &self.template_parameters,
            &self.return_type,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Method {
    pub qualified_name: String,
    pub name: String,
    pub signature: String,
    pub return_type: String,
    pub template_parameters: String,
    pub access: AccessSpecifier,
    pub is_virtual: bool,
    pub is_pure: bool,
    pub is_static: bool,
    pub is_const: bool,
    pub parent: Option<TypeId>,
    pub argument_types: Vec<TypeId>,
}

impl Method {
    pub fn new(qualified_name: impl Into<String>, name: impl Into<String>, parent: Option<TypeId>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            name: name.into(),
            parent,
            ..Default::default()
        }
    }

    pub fn with_signature(
        mut self,
        signature: impl Into<String>,
        return_type: impl Into<String>,
        template_parameters: impl Into<String>,
    ) -> Self {
        self.signature = signature.into();
        self.return_type = return_type.into();
        self.template_parameters = template_parameters.into();
        self
    }

    pub fn with_access(mut self, access: AccessSpecifier) -> Self {
        self.access = access;
        self
    }

    pub fn with_flags(mut self, is_virtual: bool, is_pure: bool, is_static: bool, is_const: bool) -> Self {
        self.is_virtual = is_virtual;
        self.is_pure = is_pure;
        self.is_static = is_static;
        self.is_const = is_const;
        self
    }

    pub fn storage_key(&self) -> String {
        callable_key(
            &self.qualified_name,
            &self.signature,
            &self.template_parameters,
            &self.return_type,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Field {
    pub qualified_name: String,
    pub name: String,
    pub signature: String,
    pub access: AccessSpecifier,
    pub is_static: bool,
    pub parent: Option<TypeId>,
    pub variable_types: Vec<TypeId>,
}

impl Field {
    pub fn new(qualified_name: impl Into<String>, name: impl Into<String>, parent: Option<TypeId>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            name: name.into(),
            parent,
            ..Default::default()
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_access(mut self, access: AccessSpecifier) -> Self {
        self.access = access;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Variable {
    pub qualified_name: String,
    pub name: String,
    pub signature: String,
    pub is_global: bool,
    pub parent_namespace: Option<NamespaceId>,
}

impl Variable {
    pub fn new(qualified_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn global(mut self, is_global: bool) -> Self {
        self.is_global = is_global;
        self
    }

    pub fn in_namespace(mut self, namespace: Option<NamespaceId>) -> Self {
        self.parent_namespace = namespace;
        self
    }
}

/// A problem found while scanning or parsing
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub qualified_name: String,
    pub message: String,
    pub file_name: String,
}

impl ErrorRecord {
    pub fn storage_key(&self) -> String {
        error_key(&self.qualified_name, &self.message, &self.file_name)
    }
}

pub fn callable_key(qualified_name: &str, signature: &str, template_parameters: &str, return_type: &str) -> String {
    format!("{qualified_name}\n{signature}\n{template_parameters}\n{return_type}")
}

pub fn error_key(qualified_name: &str, message: &str, file_name: &str) -> String {
    format!("{qualified_name}\n{message}\n{file_name}")
}
