use crate::kinds::DiagramType;

pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const FILE: &str = "📄";
    pub const NEW: &str = "✨";
    pub const MOD: &str = "📝";
    pub const DEL: &str = "🗑️";
    pub const REPOSITORY: &str = "🏛️";
    pub const GROUP: &str = "🗂️";
    pub const PACKAGE: &str = "📦";
    pub const COMPONENT: &str = "🧩";
    pub const CLASS: &str = "🔷";
    pub const FUNCTION: &str = "🔹";
    pub const CLOCK: &str = "⏱️";

    /// Icon of a node in the package tree.
    pub fn for_node(kind: DiagramType, is_group: bool) -> &'static str {
        match kind {
            DiagramType::Repository => Self::REPOSITORY,
            DiagramType::Package if is_group => Self::GROUP,
            DiagramType::Package => Self::PACKAGE,
            DiagramType::Component => Self::COMPONENT,
            DiagramType::Class => Self::CLASS,
            DiagramType::FreeFunction | DiagramType::None => Self::FUNCTION,
        }
    }
}
