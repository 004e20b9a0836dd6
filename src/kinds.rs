//! Enumerations shared across the store, the database and the node storage.
//!
//! Integer discriminants are persisted; do not reorder.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declare an integer-backed enum with `as_i64`, `from_i64` and `as_str`.
macro_rules! persisted_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident {
            $($variant:ident = $value:expr => $label:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn as_i64(self) -> i64 {
                self as i64
            }

            /// Unknown discriminants map to the default variant.
            pub fn from_i64(value: i64) -> Self {
                match value {
                    $(v if v == $value => $name::$variant,)+
                    _ => $name::$default,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$($name::$variant),+]
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

persisted_enum! {
    /// C++ access specifier of a type, method or field
    AccessSpecifier, default = None {
        Public = 0 => "public",
        Protected = 1 => "protected",
        Private = 2 => "private",
        None = 3 => "none",
    }
}

persisted_enum! {
    /// Kind of user defined type
    UdtKind, default = Unknown {
        Class = 0 => "class",
        Enum = 1 => "enum",
        Struct = 2 => "struct",
        TypeAlias = 3 => "type alias",
        Union = 4 => "union",
        Unknown = 5 => "unknown",
    }
}

persisted_enum! {
    /// Origin of an error record
    ErrorKind, default = ParserError {
        ParserError = 0 => "parser error",
        CompilerError = 1 => "compiler error",
    }
}

persisted_enum! {
    /// Kind of node addressed by a `UniqueId`
    DiagramType, default = None {
        None = 0 => "none",
        Class = 1 => "class",
        Component = 10 => "component",
        Package = 100 => "package",
        Repository = 1000 => "repository",
        FreeFunction = 10000 => "free function",
    }
}

persisted_enum! {
    /// Readiness of the stored graph, persisted in `db_option`
    State, default = NoneReady {
        Error = 0 => "error",
        ManuallyStopped = 1 => "manually stopped",
        NoneReady = 2 => "none ready",
        PhysicalReady = 3 => "physical ready",
        PhysicalError = 4 => "physical error",
        AllReady = 5 => "all ready",
        LogicalError = 6 => "logical error",
    }
}

/// Relationship between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LakosRelationType {
    IsA,
    UsesInTheInterface,
    UsesInTheImplementation,
    UsesInNameOnly,
    PackageDependency,
}

impl LakosRelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LakosRelationType::IsA => "is-a",
            LakosRelationType::UsesInTheInterface => "uses in the interface",
            LakosRelationType::UsesInTheImplementation => "uses in the implementation",
            LakosRelationType::UsesInNameOnly => "uses in name only",
            LakosRelationType::PackageDependency => "package dependency",
        }
    }

    /// Relations that can be added between two types.
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            LakosRelationType::IsA
                | LakosRelationType::UsesInTheInterface
                | LakosRelationType::UsesInTheImplementation
        )
    }
}

impl fmt::Display for LakosRelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of a path by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Header,
    Source,
    /// A recognised non-C++ file, skipped silently
    KnownUnknown,
    /// An extension no one expects to see in a compilation database
    UnknownUnknown,
}

impl FileType {
    pub fn is_cpp(&self) -> bool {
        matches!(self, FileType::Header | FileType::Source)
    }
}

/// Kind of physical dependency between two packages or components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalDependencyType {
    /// A dependency actually present in the code
    Concrete,
    /// A dependency declared as allowed but not yet used
    Allowed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_values() {
        assert_eq!(DiagramType::Package.as_i64(), 100);
        assert_eq!(DiagramType::from_i64(1000), DiagramType::Repository);
        assert_eq!(DiagramType::from_i64(42), DiagramType::None);
        assert_eq!(UdtKind::from_i64(2), UdtKind::Struct);
        assert_eq!(AccessSpecifier::default(), AccessSpecifier::None);
        assert_eq!(ErrorKind::CompilerError.as_i64(), 1);
    }

    #[test]
    fn test_all_roundtrip() {
        for kind in UdtKind::all() {
            assert_eq!(UdtKind::from_i64(kind.as_i64()), *kind);
        }
        for access in AccessSpecifier::all() {
            assert_eq!(AccessSpecifier::from_i64(access.as_i64()), *access);
        }
    }

    #[test]
    fn test_logical_relations() {
        assert!(LakosRelationType::IsA.is_logical());
        assert!(!LakosRelationType::PackageDependency.is_logical());
        assert!(!LakosRelationType::UsesInNameOnly.is_logical());
    }
}
