//! Rule violations reported by the node storage
//!
//! Every enum carries a `Storage` variant for database failures, so callers
//! can tell a rejected edit apart from a broken database.

#[derive(Debug, thiserror::Error)]
pub enum ErrorRemoveEntity {
    #[error("Cannot remove an entity that still has providers")]
    CannotRemoveWithProviders,

    #[error("Cannot remove an entity that still has clients")]
    CannotRemoveWithClients,

    #[error("Cannot remove an entity that still has children")]
    CannotRemoveWithChildren,

    #[error(transparent)]
    Storage(#[from] crate::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorAddPhysicalDependency {
    #[error("Physical dependencies only connect packages or components")]
    InvalidType,

    #[error("An entity cannot depend on itself")]
    SelfRelation,

    #[error("Source and target are not on the same hierarchy level")]
    HierarchyLevelMismatch,

    #[error("The parents must depend on each other first")]
    MissingParentDependency,

    #[error("Dependency already exists")]
    DependencyAlreadyExists,

    #[error(transparent)]
    Storage(#[from] crate::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorRemovePhysicalDependency {
    #[error("There is no such dependency")]
    InexistentRelation,

    #[error(transparent)]
    Storage(#[from] crate::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorAddComponent {
    #[error("A component needs a parent package")]
    MissingParent,

    #[error("Qualified name already registered")]
    QualifiedNameAlreadyRegistered,

    #[error("Components cannot be added to a package group")]
    CannotAddComponentToPkgGroup,

    #[error(transparent)]
    Storage(#[from] crate::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorAddPackage {
    #[error("Qualified name already registered")]
    QualifiedNameAlreadyRegistered,

    #[error("Packages cannot be added to a standalone package")]
    CannotAddPackageToStandalonePackage,

    #[error("{0} cannot hold packages")]
    CantAddChildren(String),

    #[error(transparent)]
    Storage(#[from] crate::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorAddUdt {
    #[error("Types live in a component or in a class or struct")]
    BadParentType,

    #[error(transparent)]
    Storage(#[from] crate::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorAddLogicalRelation {
    #[error("Logical relations only connect types")]
    InvalidRelation,

    #[error("A type cannot relate to itself")]
    SelfRelation,

    #[error("Not a logical relation: {0}")]
    InvalidLakosRelationType(crate::LakosRelationType),

    #[error("The relation already exists")]
    AlreadyHaveDependency,

    #[error("The components must depend on each other first")]
    ComponentDependencyRequired,

    #[error("The parents must depend on each other first")]
    ParentDependencyRequired,

    #[error(transparent)]
    Storage(#[from] crate::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorRemoveLogicalRelation {
    #[error("There is no such relation")]
    InexistentRelation,

    #[error("Not a logical relation: {0}")]
    InvalidLakosRelationType(crate::LakosRelationType),

    #[error(transparent)]
    Storage(#[from] crate::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorReparentEntity {
    #[error("Only components can be moved")]
    InvalidEntity,

    #[error("Components can only move to a package")]
    InvalidParent,

    #[error(transparent)]
    Storage(#[from] crate::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorLoadAllowedDependencies {
    #[error("Could not open {path}: {source}")]
    AllowedDependencyFileCouldNotBeOpen {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Unexpected error adding allowed dependency {source_name} -> {target_name}: {reason}")]
    UnexpectedErrorAddingPhysicalDependency {
        source_name: String,
        target_name: String,
        reason: ErrorAddPhysicalDependency,
    },

    #[error(transparent)]
    Storage(#[from] crate::Error),
}
