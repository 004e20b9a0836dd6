use crate::kinds::{DiagramType, LakosRelationType, UdtKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Database identity of a node: its kind plus the row id in that kind's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueId {
    pub kind: DiagramType,
    pub id: i64,
}

impl UniqueId {
    pub fn new(kind: DiagramType, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// One provider or client of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LakosianEdge {
    pub relation: LakosRelationType,
    pub other: UniqueId,
}

impl LakosianEdge {
    pub fn new(relation: LakosRelationType, other: UniqueId) -> Self {
        Self { relation, other }
    }
}

/// A cached node. Children, providers and clients are loaded on first use
/// and dropped again whenever an edit touches them.
#[derive(Debug, Clone)]
pub struct LakosianNode {
    uid: UniqueId,
    name: String,
    qualified_name: String,
    parent: Option<UniqueId>,
    udt_kind: Option<UdtKind>,
    pub(super) children: Option<Vec<UniqueId>>,
    pub(super) providers: Option<Vec<LakosianEdge>>,
    pub(super) clients: Option<Vec<LakosianEdge>>,
}

impl LakosianNode {
    pub(super) fn new(uid: UniqueId, name: String, qualified_name: String, parent: Option<UniqueId>) -> Self {
        Self {
            uid,
            name,
            qualified_name,
            parent,
            udt_kind: None,
            children: None,
            providers: None,
            clients: None,
        }
    }

    pub(super) fn with_udt_kind(mut self, kind: UdtKind) -> Self {
        self.udt_kind = Some(kind);
        self
    }

    pub fn uid(&self) -> UniqueId {
        self.uid
    }

    pub fn kind(&self) -> DiagramType {
        self.uid.kind
    }

    pub fn id(&self) -> i64 {
        self.uid.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn parent(&self) -> Option<UniqueId> {
        self.parent
    }

    /// Only set for types.
    pub fn udt_kind(&self) -> Option<UdtKind> {
        self.udt_kind
    }

    /// Separator between the segments of this kind's qualified names.
    pub fn separator(&self) -> &'static str {
        match self.uid.kind {
            DiagramType::Class | DiagramType::FreeFunction => "::",
            _ => "/",
        }
    }

    /// Rename the node, replacing the last segment of its qualified name.
    pub(super) fn set_name(&mut self, name: &str) {
        let sep = self.separator();
        self.qualified_name = match self.qualified_name.rfind(sep) {
            Some(pos) => format!("{}{}{}", &self.qualified_name[..pos], sep, name),
            None => name.to_string(),
        };
        self.name = name.to_string();
    }

    pub(super) fn set_parent(&mut self, parent: Option<UniqueId>) {
        self.parent = parent;
    }

    pub(super) fn invalidate_children(&mut self) {
        self.children = None;
    }

    pub(super) fn invalidate_providers(&mut self) {
        self.providers = None;
    }

    pub(super) fn invalidate_clients(&mut self) {
        self.clients = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_name_replaces_last_segment() {
        let mut pkg = LakosianNode::new(
            UniqueId::new(DiagramType::Package, 1),
            "onea".into(),
            "groups/one/onea".into(),
            None,
        );
        pkg.set_name("oneb");
        assert_eq!(pkg.name(), "oneb");
        assert_eq!(pkg.qualified_name(), "groups/one/oneb");

        let mut udt = LakosianNode::new(UniqueId::new(DiagramType::Class, 2), "Foo".into(), "a::b::Foo".into(), None)
            .with_udt_kind(UdtKind::Struct);
        udt.set_name("Bar");
        assert_eq!(udt.qualified_name(), "a::b::Bar");
        assert_eq!(udt.udt_kind(), Some(UdtKind::Struct));

        let mut top = LakosianNode::new(UniqueId::new(DiagramType::Package, 3), "a".into(), "a".into(), None);
        top.set_name("c");
        assert_eq!(top.qualified_name(), "c");
    }

    #[test]
    fn test_unique_id_display() {
        assert_eq!(UniqueId::new(DiagramType::Component, 7).to_string(), "component#7");
    }
}
