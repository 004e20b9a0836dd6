//! Change notifications of the node storage
//!
//! Every subscriber gets its own channel and sees every event after it
//! subscribed. Subscribers that dropped their receiver are forgotten on the
//! next emission.

use super::node::UniqueId;
use crate::kinds::{LakosRelationType, PhysicalDependencyType};
use crossbeam::channel::{unbounded, Receiver, Sender};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeStorageEvent {
    StorageCleared,
    StorageChanged,
    NodeAdded {
        node: UniqueId,
        /// Opaque payload handed to `add_package`
        userdata: Option<serde_json::Value>,
    },
    NodeRemoved(UniqueId),
    NodeRenamed(UniqueId),
    PhysicalDependencyAdded {
        source: UniqueId,
        target: UniqueId,
        dependency: PhysicalDependencyType,
    },
    PhysicalDependencyRemoved {
        source: UniqueId,
        target: UniqueId,
        dependency: PhysicalDependencyType,
    },
    LogicalRelationAdded {
        source: UniqueId,
        target: UniqueId,
        relation: LakosRelationType,
    },
    LogicalRelationRemoved {
        source: UniqueId,
        target: UniqueId,
        relation: LakosRelationType,
    },
    EntityReparented {
        entity: UniqueId,
        old_parent: UniqueId,
        new_parent: UniqueId,
    },
}

#[derive(Default)]
pub(super) struct Signals {
    subscribers: Vec<Sender<NodeStorageEvent>>,
}

impl Signals {
    pub(super) fn subscribe(&mut self) -> Receiver<NodeStorageEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub(super) fn emit(&mut self, event: NodeStorageEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
