//! The identity index: four lookup tables and the uniqueness constraints.
//!
//! Subscribed to every identity-affecting event. The index performs **strict
//! rejection**: discovering that an identifier is already bound to a
//! different construct raises [`ModelError::IdentityConstraint`] instead of
//! silently merging the two topics. Merge responsibility stays with the
//! caller (the merge engine, or a deserialization driver such as
//! [`crate::GraphBuilder`]), which must detect the collision *before*
//! assigning the identity.

use std::collections::BTreeMap;

use crate::error::ModelError;
use crate::events::Event;
use crate::map::Store;
use crate::types::{ConstructId, Iri, TopicId};

/// Identifier lookup tables for one map.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    /// Registration id -> construct; the stable per-map ordinal numbering
    /// canonical writers rely on.
    by_id: BTreeMap<u64, ConstructId>,
    subject_identifiers: BTreeMap<Iri, TopicId>,
    subject_locators: BTreeMap<Iri, TopicId>,
    item_identifiers: BTreeMap<Iri, ConstructId>,
}

impl IdentityIndex {
    /// Resolve a construct by its registration id.
    pub fn construct_by_id(&self, id: u64) -> Option<ConstructId> {
        self.by_id.get(&id).copied()
    }

    /// Resolve a topic by subject identifier.
    pub fn topic_by_subject_identifier(&self, iri: &Iri) -> Option<TopicId> {
        self.subject_identifiers.get(iri).copied()
    }

    /// Resolve a topic by subject locator.
    pub fn topic_by_subject_locator(&self, iri: &Iri) -> Option<TopicId> {
        self.subject_locators.get(iri).copied()
    }

    /// Resolve a construct by item identifier.
    pub fn construct_by_item_identifier(&self, iri: &Iri) -> Option<ConstructId> {
        self.item_identifiers.get(iri).copied()
    }

    /// Number of registered constructs.
    pub fn construct_count(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn register_map(&mut self, serial: u64) {
        self.by_id.insert(serial, ConstructId::Map);
    }

    /// Handle one event. Constraint violations reject the mutation; the
    /// tables are updated only on acceptance.
    pub(crate) fn apply(&mut self, store: &Store, event: &Event) -> Result<(), ModelError> {
        match event {
            Event::TopicAdded(t) => self.register(store, ConstructId::Topic(*t)),
            Event::AssociationAdded(a) => self.register(store, ConstructId::Association(*a)),
            Event::RoleAdded(r) => self.register(store, ConstructId::Role(*r)),
            Event::OccurrenceAdded(o) => self.register(store, ConstructId::Occurrence(*o)),
            Event::NameAdded(n) => self.register(store, ConstructId::Name(*n)),
            Event::VariantAdded(v) => self.register(store, ConstructId::Variant(*v)),

            Event::TopicRemoved(t) => self.unregister(store, ConstructId::Topic(*t)),
            Event::AssociationRemoved(a) => self.unregister(store, ConstructId::Association(*a)),
            Event::RoleRemoved(r) => self.unregister(store, ConstructId::Role(*r)),
            Event::OccurrenceRemoved(o) => self.unregister(store, ConstructId::Occurrence(*o)),
            Event::NameRemoved(n) => self.unregister(store, ConstructId::Name(*n)),
            Event::VariantRemoved(v) => self.unregister(store, ConstructId::Variant(*v)),

            Event::SubjectIdentifierAdded { topic, iri } => {
                self.check_add_subject_identifier(*topic, iri)?;
                self.subject_identifiers.insert(iri.clone(), *topic);
                Ok(())
            }
            Event::SubjectIdentifierRemoved { topic, iri } => {
                if self.subject_identifiers.get(iri) == Some(topic) {
                    self.subject_identifiers.remove(iri);
                }
                Ok(())
            }
            Event::SubjectLocatorAdded { topic, iri } => {
                if let Some(existing) = self.subject_locators.get(iri) {
                    if existing != topic {
                        return Err(ModelError::IdentityConstraint {
                            iri: iri.clone(),
                            existing: ConstructId::Topic(*existing),
                            adding: ConstructId::Topic(*topic),
                        });
                    }
                }
                self.subject_locators.insert(iri.clone(), *topic);
                Ok(())
            }
            Event::SubjectLocatorRemoved { topic, iri } => {
                if self.subject_locators.get(iri) == Some(topic) {
                    self.subject_locators.remove(iri);
                }
                Ok(())
            }
            Event::ItemIdentifierAdded { construct, iri } => {
                self.check_add_item_identifier(*construct, iri)?;
                self.item_identifiers.insert(iri.clone(), *construct);
                Ok(())
            }
            Event::ItemIdentifierRemoved { construct, iri } => {
                if self.item_identifiers.get(iri) == Some(construct) {
                    self.item_identifiers.remove(iri);
                }
                Ok(())
            }
            Event::ReifierChanged {
                construct,
                new: Some(reifier),
                ..
            } => {
                if let Some(data) = store.topics.get(reifier) {
                    if let Some(reified) = data.reified {
                        if reified != *construct {
                            return Err(ModelError::ReifierConflict {
                                topic: *reifier,
                                reified,
                                requested: *construct,
                            });
                        }
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// A subject identifier may not be bound to a different topic, and may
    /// not equal a *non-topic* construct's item identifier. A different
    /// *topic* holding the IRI as an item identifier is tolerated here; per
    /// the model those two topics denote the same subject and it is the
    /// caller's job to merge them.
    fn check_add_subject_identifier(&self, topic: TopicId, iri: &Iri) -> Result<(), ModelError> {
        if let Some(existing) = self.subject_identifiers.get(iri) {
            if *existing != topic {
                return Err(ModelError::IdentityConstraint {
                    iri: iri.clone(),
                    existing: ConstructId::Topic(*existing),
                    adding: ConstructId::Topic(topic),
                });
            }
        }
        if let Some(existing) = self.item_identifiers.get(iri) {
            if *existing != ConstructId::Topic(topic) && !existing.is_topic() {
                return Err(ModelError::IdentityConstraint {
                    iri: iri.clone(),
                    existing: *existing,
                    adding: ConstructId::Topic(topic),
                });
            }
        }
        Ok(())
    }

    /// Mirror image of the subject-identifier check: the item identifier may
    /// not be bound to a different construct, and a non-topic construct may
    /// not take an item identifier equal to some topic's subject identifier.
    fn check_add_item_identifier(&self, construct: ConstructId, iri: &Iri) -> Result<(), ModelError> {
        if let Some(existing) = self.item_identifiers.get(iri) {
            if *existing != construct {
                return Err(ModelError::IdentityConstraint {
                    iri: iri.clone(),
                    existing: *existing,
                    adding: construct,
                });
            }
        }
        if let Some(existing) = self.subject_identifiers.get(iri) {
            if ConstructId::Topic(*existing) != construct && !construct.is_topic() {
                return Err(ModelError::IdentityConstraint {
                    iri: iri.clone(),
                    existing: ConstructId::Topic(*existing),
                    adding: construct,
                });
            }
        }
        Ok(())
    }

    fn register(&mut self, store: &Store, construct: ConstructId) -> Result<(), ModelError> {
        if let Some(serial) = store.serial_of(construct) {
            self.by_id.insert(serial, construct);
        }
        Ok(())
    }

    fn unregister(&mut self, store: &Store, construct: ConstructId) -> Result<(), ModelError> {
        if let Some(serial) = store.serial_of(construct) {
            self.by_id.remove(&serial);
        }
        Ok(())
    }
}
