//! Type secondary index.
//!
//! Tracks, per type topic, the topics it is an instance type of and the
//! typed constructs (associations, roles, occurrences, names) it types.
//! Consumed by the merge engine ("replace `source` as a type everywhere")
//! and by the topic-removal in-use check.

use std::collections::{BTreeMap, BTreeSet};

use crate::events::Event;
use crate::map::Store;
use crate::types::{ConstructId, TopicId};

/// Reverse index from type topics to what they type.
#[derive(Debug, Default)]
pub struct TypeIndex {
    /// type -> topics carrying it in their `types` set.
    instances: BTreeMap<TopicId, BTreeSet<TopicId>>,
    /// type -> typed constructs (never topics).
    typed: BTreeMap<TopicId, BTreeSet<ConstructId>>,
}

impl TypeIndex {
    /// Topics that are instances of `typ`, in handle order.
    pub fn topics_of_type(&self, typ: TopicId) -> Vec<TopicId> {
        self.instances
            .get(&typ)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Typed constructs whose type is `typ`, in handle order.
    pub fn constructs_of_type(&self, typ: TopicId) -> Vec<ConstructId> {
        self.typed
            .get(&typ)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether anything in the map uses `topic` as its type.
    pub fn is_used_as_type(&self, topic: TopicId) -> bool {
        self.instances.contains_key(&topic) || self.typed.contains_key(&topic)
    }

    pub(crate) fn apply(&mut self, store: &Store, event: &Event) {
        match event {
            Event::TypeAdded { topic, typ } => {
                self.instances.entry(*typ).or_default().insert(*topic);
            }
            Event::TypeRemoved { topic, typ } => {
                if let Some(set) = self.instances.get_mut(typ) {
                    set.remove(topic);
                    if set.is_empty() {
                        self.instances.remove(typ);
                    }
                }
            }
            Event::AssociationAdded(a) => {
                if let Some(data) = store.associations.get(a) {
                    self.insert(data.typ, ConstructId::Association(*a));
                }
            }
            Event::AssociationRemoved(a) => {
                if let Some(data) = store.associations.get(a) {
                    self.remove(data.typ, ConstructId::Association(*a));
                }
            }
            Event::RoleAdded(r) => {
                if let Some(data) = store.roles.get(r) {
                    self.insert(data.typ, ConstructId::Role(*r));
                }
            }
            Event::RoleRemoved(r) => {
                if let Some(data) = store.roles.get(r) {
                    self.remove(data.typ, ConstructId::Role(*r));
                }
            }
            Event::OccurrenceAdded(o) => {
                if let Some(data) = store.occurrences.get(o) {
                    self.insert(data.typ, ConstructId::Occurrence(*o));
                }
            }
            Event::OccurrenceRemoved(o) => {
                if let Some(data) = store.occurrences.get(o) {
                    self.remove(data.typ, ConstructId::Occurrence(*o));
                }
            }
            Event::NameAdded(n) => {
                if let Some(data) = store.names.get(n) {
                    self.insert(data.typ, ConstructId::Name(*n));
                }
            }
            Event::NameRemoved(n) => {
                if let Some(data) = store.names.get(n) {
                    self.remove(data.typ, ConstructId::Name(*n));
                }
            }
            Event::TypeChanged {
                construct,
                old,
                new,
            } => {
                self.remove(*old, *construct);
                self.insert(*new, *construct);
            }
            _ => {}
        }
    }

    fn insert(&mut self, typ: TopicId, construct: ConstructId) {
        self.typed.entry(typ).or_default().insert(construct);
    }

    fn remove(&mut self, typ: TopicId, construct: ConstructId) {
        if let Some(set) = self.typed.get_mut(&typ) {
            set.remove(&construct);
            if set.is_empty() {
                self.typed.remove(&typ);
            }
        }
    }
}
