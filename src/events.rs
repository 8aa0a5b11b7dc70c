//! Pre-change event notifications.
//!
//! Every mutator publishes an event describing the change it is *about to*
//! make, and only commits once every built-in handler has accepted it.
//! Dispatch is synchronous, single-threaded, and ordered:
//!
//! 1. The identity index checks constraints and updates its tables; an error
//!    here aborts the mutation before any structural change.
//! 2. The type and scope indexes update.
//! 3. External observers are notified (they cannot veto).
//! 4. The decomposer re-expresses composite events as their constituent
//!    primitives, each re-published through the same pipeline.
//!
//! The decomposer is what lets a construct arrive either empty-then-populated
//! or pre-populated-then-attached without the indexes seeing different
//! histories: attaching a name that already carries item identifiers and
//! variants emits one `ItemIdentifierAdded` per identifier and one
//! `VariantAdded` per variant, exactly as if they had been added one by one.
//! Decomposition recursion is bounded by the construct tree (map, topic,
//! name, variant is the deepest chain); cascading merge work is never run
//! from handlers, the merge engine queues it on an explicit worklist.

use serde::Serialize;

use crate::map::Store;
use crate::types::{
    AssociationId, ConstructId, Iri, Literal, NameId, OccurrenceId, RoleId, TopicId, VariantId,
};

/// Enumerated event kinds, used for dispatch and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[allow(missing_docs)]
pub enum EventKind {
    TopicAdded,
    TopicRemoved,
    AssociationAdded,
    AssociationRemoved,
    RoleAdded,
    RoleRemoved,
    OccurrenceAdded,
    OccurrenceRemoved,
    NameAdded,
    NameRemoved,
    VariantAdded,
    VariantRemoved,
    ItemIdentifierAdded,
    ItemIdentifierRemoved,
    SubjectIdentifierAdded,
    SubjectIdentifierRemoved,
    SubjectLocatorAdded,
    SubjectLocatorRemoved,
    TypeAdded,
    TypeRemoved,
    ThemeAdded,
    ThemeRemoved,
    PlayerChanged,
    TypeChanged,
    ValueChanged,
    ReifierChanged,
}

/// A change about to be applied to the graph.
///
/// Payloads carry handles and interned values only, never borrows into the
/// map, so handlers and observers may be invoked re-entrantly during nested
/// dispatch.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum Event {
    TopicAdded(TopicId),
    TopicRemoved(TopicId),
    AssociationAdded(AssociationId),
    AssociationRemoved(AssociationId),
    RoleAdded(RoleId),
    RoleRemoved(RoleId),
    OccurrenceAdded(OccurrenceId),
    OccurrenceRemoved(OccurrenceId),
    NameAdded(NameId),
    NameRemoved(NameId),
    VariantAdded(VariantId),
    VariantRemoved(VariantId),
    ItemIdentifierAdded { construct: ConstructId, iri: Iri },
    ItemIdentifierRemoved { construct: ConstructId, iri: Iri },
    SubjectIdentifierAdded { topic: TopicId, iri: Iri },
    SubjectIdentifierRemoved { topic: TopicId, iri: Iri },
    SubjectLocatorAdded { topic: TopicId, iri: Iri },
    SubjectLocatorRemoved { topic: TopicId, iri: Iri },
    TypeAdded { topic: TopicId, typ: TopicId },
    TypeRemoved { topic: TopicId, typ: TopicId },
    ThemeAdded { construct: ConstructId, theme: TopicId },
    ThemeRemoved { construct: ConstructId, theme: TopicId },
    PlayerChanged { role: RoleId, old: TopicId, new: TopicId },
    TypeChanged { construct: ConstructId, old: TopicId, new: TopicId },
    ValueChanged { construct: ConstructId, old: Literal, new: Literal },
    ReifierChanged {
        construct: ConstructId,
        old: Option<TopicId>,
        new: Option<TopicId>,
    },
}

impl Event {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::TopicAdded(_) => EventKind::TopicAdded,
            Event::TopicRemoved(_) => EventKind::TopicRemoved,
            Event::AssociationAdded(_) => EventKind::AssociationAdded,
            Event::AssociationRemoved(_) => EventKind::AssociationRemoved,
            Event::RoleAdded(_) => EventKind::RoleAdded,
            Event::RoleRemoved(_) => EventKind::RoleRemoved,
            Event::OccurrenceAdded(_) => EventKind::OccurrenceAdded,
            Event::OccurrenceRemoved(_) => EventKind::OccurrenceRemoved,
            Event::NameAdded(_) => EventKind::NameAdded,
            Event::NameRemoved(_) => EventKind::NameRemoved,
            Event::VariantAdded(_) => EventKind::VariantAdded,
            Event::VariantRemoved(_) => EventKind::VariantRemoved,
            Event::ItemIdentifierAdded { .. } => EventKind::ItemIdentifierAdded,
            Event::ItemIdentifierRemoved { .. } => EventKind::ItemIdentifierRemoved,
            Event::SubjectIdentifierAdded { .. } => EventKind::SubjectIdentifierAdded,
            Event::SubjectIdentifierRemoved { .. } => EventKind::SubjectIdentifierRemoved,
            Event::SubjectLocatorAdded { .. } => EventKind::SubjectLocatorAdded,
            Event::SubjectLocatorRemoved { .. } => EventKind::SubjectLocatorRemoved,
            Event::TypeAdded { .. } => EventKind::TypeAdded,
            Event::TypeRemoved { .. } => EventKind::TypeRemoved,
            Event::ThemeAdded { .. } => EventKind::ThemeAdded,
            Event::ThemeRemoved { .. } => EventKind::ThemeRemoved,
            Event::PlayerChanged { .. } => EventKind::PlayerChanged,
            Event::TypeChanged { .. } => EventKind::TypeChanged,
            Event::ValueChanged { .. } => EventKind::ValueChanged,
            Event::ReifierChanged { .. } => EventKind::ReifierChanged,
        }
    }
}

/// Registered external observers, notified after the built-in indexes accept
/// an event and before the mutation commits.
#[derive(Default)]
pub(crate) struct ObserverSet {
    observers: Vec<Box<dyn FnMut(&Event)>>,
}

impl ObserverSet {
    pub(crate) fn subscribe(&mut self, observer: Box<dyn FnMut(&Event)>) {
        self.observers.push(observer);
    }

    pub(crate) fn notify(&mut self, event: &Event) {
        for observer in &mut self.observers {
            observer(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Re-express a composite event as its constituent primitive events.
///
/// Returns the derived events in a stable order: identities first, then
/// types, then owned children (parents before their own children; the
/// recursion happens through re-publication, not here).
pub(crate) fn decompose(store: &Store, event: &Event) -> Vec<Event> {
    let mut derived = Vec::new();
    match event {
        Event::TopicAdded(t) => {
            let Some(data) = store.topics.get(t) else {
                return derived;
            };
            for iri in &data.subject_identifiers {
                derived.push(Event::SubjectIdentifierAdded {
                    topic: *t,
                    iri: iri.clone(),
                });
            }
            for iri in &data.subject_locators {
                derived.push(Event::SubjectLocatorAdded {
                    topic: *t,
                    iri: iri.clone(),
                });
            }
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierAdded {
                    construct: ConstructId::Topic(*t),
                    iri: iri.clone(),
                });
            }
            for typ in &data.types {
                derived.push(Event::TypeAdded {
                    topic: *t,
                    typ: *typ,
                });
            }
            for occ in &data.occurrences {
                derived.push(Event::OccurrenceAdded(*occ));
            }
            for name in &data.names {
                derived.push(Event::NameAdded(*name));
            }
        }
        Event::TopicRemoved(t) => {
            let Some(data) = store.topics.get(t) else {
                return derived;
            };
            for iri in &data.subject_identifiers {
                derived.push(Event::SubjectIdentifierRemoved {
                    topic: *t,
                    iri: iri.clone(),
                });
            }
            for iri in &data.subject_locators {
                derived.push(Event::SubjectLocatorRemoved {
                    topic: *t,
                    iri: iri.clone(),
                });
            }
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierRemoved {
                    construct: ConstructId::Topic(*t),
                    iri: iri.clone(),
                });
            }
            for typ in &data.types {
                derived.push(Event::TypeRemoved {
                    topic: *t,
                    typ: *typ,
                });
            }
            for occ in &data.occurrences {
                derived.push(Event::OccurrenceRemoved(*occ));
            }
            for name in &data.names {
                derived.push(Event::NameRemoved(*name));
            }
        }
        Event::AssociationAdded(a) => {
            let Some(data) = store.associations.get(a) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierAdded {
                    construct: ConstructId::Association(*a),
                    iri: iri.clone(),
                });
            }
            for role in &data.roles {
                derived.push(Event::RoleAdded(*role));
            }
        }
        Event::AssociationRemoved(a) => {
            let Some(data) = store.associations.get(a) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierRemoved {
                    construct: ConstructId::Association(*a),
                    iri: iri.clone(),
                });
            }
            for role in &data.roles {
                derived.push(Event::RoleRemoved(*role));
            }
        }
        Event::RoleAdded(r) => {
            let Some(data) = store.roles.get(r) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierAdded {
                    construct: ConstructId::Role(*r),
                    iri: iri.clone(),
                });
            }
        }
        Event::RoleRemoved(r) => {
            let Some(data) = store.roles.get(r) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierRemoved {
                    construct: ConstructId::Role(*r),
                    iri: iri.clone(),
                });
            }
        }
        Event::OccurrenceAdded(o) => {
            let Some(data) = store.occurrences.get(o) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierAdded {
                    construct: ConstructId::Occurrence(*o),
                    iri: iri.clone(),
                });
            }
        }
        Event::OccurrenceRemoved(o) => {
            let Some(data) = store.occurrences.get(o) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierRemoved {
                    construct: ConstructId::Occurrence(*o),
                    iri: iri.clone(),
                });
            }
        }
        Event::NameAdded(n) => {
            let Some(data) = store.names.get(n) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierAdded {
                    construct: ConstructId::Name(*n),
                    iri: iri.clone(),
                });
            }
            for variant in &data.variants {
                derived.push(Event::VariantAdded(*variant));
            }
        }
        Event::NameRemoved(n) => {
            let Some(data) = store.names.get(n) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierRemoved {
                    construct: ConstructId::Name(*n),
                    iri: iri.clone(),
                });
            }
            for variant in &data.variants {
                derived.push(Event::VariantRemoved(*variant));
            }
        }
        Event::VariantAdded(v) => {
            let Some(data) = store.variants.get(v) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierAdded {
                    construct: ConstructId::Variant(*v),
                    iri: iri.clone(),
                });
            }
        }
        Event::VariantRemoved(v) => {
            let Some(data) = store.variants.get(v) else {
                return derived;
            };
            for iri in &data.item_identifiers {
                derived.push(Event::ItemIdentifierRemoved {
                    construct: ConstructId::Variant(*v),
                    iri: iri.clone(),
                });
            }
        }
        // Primitive events decompose to nothing.
        _ => {}
    }
    derived
}
