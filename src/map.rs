//! The construct graph: arena storage, factories, mutators, and accessors.
//!
//! A [`TopicMap`] owns every construct created through it. Constructs live in
//! `BTreeMap` arenas keyed by integer handles, so iteration order is
//! deterministic and handle comparison is trivial. Every mutator that changes
//! an observable property publishes a pre-change [`Event`] and only commits
//! once the built-in index handlers have accepted it; a constraint violation
//! rejects the mutation with the graph unchanged.
//!
//! ## Ownership
//!
//! The map owns topics and associations; topics own names and occurrences;
//! names own variants; associations own roles. Type, player, theme, and
//! reifier links are non-owning references between constructs of the same
//! map.
//!
//! ## Threading
//!
//! A map is a single-writer structure with no internal locking. Only the
//! [`InternPool`] it shares with sibling maps synchronizes.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{ModelError, TopicUsage};
use crate::events::{decompose, Event, ObserverSet};
use crate::index::{IdentityIndex, ScopeIndex, TypeIndex};
use crate::intern::InternPool;
use crate::types::scope::ScopeTable;
use crate::types::{
    AssociationId, ConstructId, Iri, Literal, NameId, OccurrenceId, RoleId, ScopeId, TopicId,
    VariantId,
};

#[derive(Debug)]
pub(crate) struct TopicData {
    pub(crate) serial: u64,
    pub(crate) item_identifiers: BTreeSet<Iri>,
    pub(crate) subject_identifiers: BTreeSet<Iri>,
    pub(crate) subject_locators: BTreeSet<Iri>,
    pub(crate) types: BTreeSet<TopicId>,
    pub(crate) occurrences: Vec<OccurrenceId>,
    pub(crate) names: Vec<NameId>,
    pub(crate) roles_played: BTreeSet<RoleId>,
    /// The construct this topic reifies, if any.
    pub(crate) reified: Option<ConstructId>,
}

#[derive(Debug)]
pub(crate) struct AssociationData {
    pub(crate) serial: u64,
    pub(crate) typ: TopicId,
    pub(crate) scope: ScopeId,
    pub(crate) roles: Vec<RoleId>,
    pub(crate) reifier: Option<TopicId>,
    pub(crate) item_identifiers: BTreeSet<Iri>,
}

#[derive(Debug)]
pub(crate) struct RoleData {
    pub(crate) serial: u64,
    pub(crate) parent: AssociationId,
    pub(crate) typ: TopicId,
    pub(crate) player: TopicId,
    pub(crate) reifier: Option<TopicId>,
    pub(crate) item_identifiers: BTreeSet<Iri>,
}

#[derive(Debug)]
pub(crate) struct OccurrenceData {
    pub(crate) serial: u64,
    pub(crate) parent: TopicId,
    pub(crate) typ: TopicId,
    pub(crate) value: Literal,
    pub(crate) scope: ScopeId,
    pub(crate) reifier: Option<TopicId>,
    pub(crate) item_identifiers: BTreeSet<Iri>,
}

#[derive(Debug)]
pub(crate) struct NameData {
    pub(crate) serial: u64,
    pub(crate) parent: TopicId,
    pub(crate) typ: TopicId,
    pub(crate) value: Literal,
    pub(crate) scope: ScopeId,
    pub(crate) variants: Vec<VariantId>,
    pub(crate) reifier: Option<TopicId>,
    pub(crate) item_identifiers: BTreeSet<Iri>,
}

#[derive(Debug)]
pub(crate) struct VariantData {
    pub(crate) serial: u64,
    pub(crate) parent: NameId,
    pub(crate) value: Literal,
    pub(crate) scope: ScopeId,
    pub(crate) reifier: Option<TopicId>,
    pub(crate) item_identifiers: BTreeSet<Iri>,
}

/// Arena storage for one map's constructs.
#[derive(Debug)]
pub(crate) struct Store {
    pub(crate) topics: BTreeMap<TopicId, TopicData>,
    pub(crate) associations: BTreeMap<AssociationId, AssociationData>,
    pub(crate) roles: BTreeMap<RoleId, RoleData>,
    pub(crate) occurrences: BTreeMap<OccurrenceId, OccurrenceData>,
    pub(crate) names: BTreeMap<NameId, NameData>,
    pub(crate) variants: BTreeMap<VariantId, VariantData>,
    pub(crate) scopes: ScopeTable,
    pub(crate) map_item_identifiers: BTreeSet<Iri>,
    pub(crate) map_reifier: Option<TopicId>,
    pub(crate) map_serial: u64,
    next_serial: u64,
    next_topic: u32,
    next_association: u32,
    next_role: u32,
    next_occurrence: u32,
    next_name: u32,
    next_variant: u32,
}

impl Store {
    fn new() -> Self {
        Self {
            topics: BTreeMap::new(),
            associations: BTreeMap::new(),
            roles: BTreeMap::new(),
            occurrences: BTreeMap::new(),
            names: BTreeMap::new(),
            variants: BTreeMap::new(),
            scopes: ScopeTable::new(),
            map_item_identifiers: BTreeSet::new(),
            map_reifier: None,
            map_serial: 1,
            next_serial: 1,
            next_topic: 0,
            next_association: 0,
            next_role: 0,
            next_occurrence: 0,
            next_name: 0,
            next_variant: 0,
        }
    }

    fn mint_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    /// Registration id of a live construct.
    pub(crate) fn serial_of(&self, construct: ConstructId) -> Option<u64> {
        match construct {
            ConstructId::Map => Some(self.map_serial),
            ConstructId::Topic(t) => self.topics.get(&t).map(|d| d.serial),
            ConstructId::Association(a) => self.associations.get(&a).map(|d| d.serial),
            ConstructId::Role(r) => self.roles.get(&r).map(|d| d.serial),
            ConstructId::Occurrence(o) => self.occurrences.get(&o).map(|d| d.serial),
            ConstructId::Name(n) => self.names.get(&n).map(|d| d.serial),
            ConstructId::Variant(v) => self.variants.get(&v).map(|d| d.serial),
        }
    }

    pub(crate) fn scope_of(&self, construct: ConstructId) -> Option<ScopeId> {
        match construct {
            ConstructId::Association(a) => self.associations.get(&a).map(|d| d.scope),
            ConstructId::Occurrence(o) => self.occurrences.get(&o).map(|d| d.scope),
            ConstructId::Name(n) => self.names.get(&n).map(|d| d.scope),
            ConstructId::Variant(v) => self.variants.get(&v).map(|d| d.scope),
            _ => None,
        }
    }

    fn set_scope_of(&mut self, construct: ConstructId, scope: ScopeId) {
        match construct {
            ConstructId::Association(a) => {
                if let Some(d) = self.associations.get_mut(&a) {
                    d.scope = scope;
                }
            }
            ConstructId::Occurrence(o) => {
                if let Some(d) = self.occurrences.get_mut(&o) {
                    d.scope = scope;
                }
            }
            ConstructId::Name(n) => {
                if let Some(d) = self.names.get_mut(&n) {
                    d.scope = scope;
                }
            }
            ConstructId::Variant(v) => {
                if let Some(d) = self.variants.get_mut(&v) {
                    d.scope = scope;
                }
            }
            _ => {}
        }
    }

    pub(crate) fn reifier_of(&self, construct: ConstructId) -> Option<TopicId> {
        match construct {
            ConstructId::Map => self.map_reifier,
            ConstructId::Topic(_) => None,
            ConstructId::Association(a) => self.associations.get(&a).and_then(|d| d.reifier),
            ConstructId::Role(r) => self.roles.get(&r).and_then(|d| d.reifier),
            ConstructId::Occurrence(o) => self.occurrences.get(&o).and_then(|d| d.reifier),
            ConstructId::Name(n) => self.names.get(&n).and_then(|d| d.reifier),
            ConstructId::Variant(v) => self.variants.get(&v).and_then(|d| d.reifier),
        }
    }

    fn set_reifier_of(&mut self, construct: ConstructId, reifier: Option<TopicId>) {
        match construct {
            ConstructId::Map => self.map_reifier = reifier,
            ConstructId::Topic(_) => {}
            ConstructId::Association(a) => {
                if let Some(d) = self.associations.get_mut(&a) {
                    d.reifier = reifier;
                }
            }
            ConstructId::Role(r) => {
                if let Some(d) = self.roles.get_mut(&r) {
                    d.reifier = reifier;
                }
            }
            ConstructId::Occurrence(o) => {
                if let Some(d) = self.occurrences.get_mut(&o) {
                    d.reifier = reifier;
                }
            }
            ConstructId::Name(n) => {
                if let Some(d) = self.names.get_mut(&n) {
                    d.reifier = reifier;
                }
            }
            ConstructId::Variant(v) => {
                if let Some(d) = self.variants.get_mut(&v) {
                    d.reifier = reifier;
                }
            }
        }
    }

    pub(crate) fn item_identifiers_of(&self, construct: ConstructId) -> Option<&BTreeSet<Iri>> {
        match construct {
            ConstructId::Map => Some(&self.map_item_identifiers),
            ConstructId::Topic(t) => self.topics.get(&t).map(|d| &d.item_identifiers),
            ConstructId::Association(a) => self.associations.get(&a).map(|d| &d.item_identifiers),
            ConstructId::Role(r) => self.roles.get(&r).map(|d| &d.item_identifiers),
            ConstructId::Occurrence(o) => self.occurrences.get(&o).map(|d| &d.item_identifiers),
            ConstructId::Name(n) => self.names.get(&n).map(|d| &d.item_identifiers),
            ConstructId::Variant(v) => self.variants.get(&v).map(|d| &d.item_identifiers),
        }
    }

    fn item_identifiers_mut(&mut self, construct: ConstructId) -> Option<&mut BTreeSet<Iri>> {
        match construct {
            ConstructId::Map => Some(&mut self.map_item_identifiers),
            ConstructId::Topic(t) => self.topics.get_mut(&t).map(|d| &mut d.item_identifiers),
            ConstructId::Association(a) => {
                self.associations.get_mut(&a).map(|d| &mut d.item_identifiers)
            }
            ConstructId::Role(r) => self.roles.get_mut(&r).map(|d| &mut d.item_identifiers),
            ConstructId::Occurrence(o) => {
                self.occurrences.get_mut(&o).map(|d| &mut d.item_identifiers)
            }
            ConstructId::Name(n) => self.names.get_mut(&n).map(|d| &mut d.item_identifiers),
            ConstructId::Variant(v) => self.variants.get_mut(&v).map(|d| &mut d.item_identifiers),
        }
    }

    fn contains(&self, construct: ConstructId) -> bool {
        match construct {
            ConstructId::Map => true,
            ConstructId::Topic(t) => self.topics.contains_key(&t),
            ConstructId::Association(a) => self.associations.contains_key(&a),
            ConstructId::Role(r) => self.roles.contains_key(&r),
            ConstructId::Occurrence(o) => self.occurrences.contains_key(&o),
            ConstructId::Name(n) => self.names.contains_key(&n),
            ConstructId::Variant(v) => self.variants.contains_key(&v),
        }
    }
}

/// Per-kind construct counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MapStats {
    /// Number of topics.
    pub topics: usize,
    /// Number of associations.
    pub associations: usize,
    /// Number of roles.
    pub roles: usize,
    /// Number of occurrences.
    pub occurrences: usize,
    /// Number of names.
    pub names: usize,
    /// Number of variants.
    pub variants: usize,
}

/// An in-memory topic map.
///
/// Root of the construct graph; owns the arenas, the identity index, the
/// type/scope secondary indexes, and the observer list. See the crate docs
/// for the mutation/event contract.
pub struct TopicMap {
    pub(crate) store: Store,
    pub(crate) identity: IdentityIndex,
    pub(crate) typed: TypeIndex,
    pub(crate) scoped: ScopeIndex,
    pub(crate) observers: ObserverSet,
    pool: InternPool,
}

impl TopicMap {
    /// Create a map with its own private interning pool.
    pub fn new() -> Self {
        Self::with_pool(InternPool::new())
    }

    /// Create a map bound to a shared interning pool.
    pub fn with_pool(pool: InternPool) -> Self {
        let store = Store::new();
        let mut identity = IdentityIndex::default();
        identity.register_map(store.map_serial);
        Self {
            store,
            identity,
            typed: TypeIndex::default(),
            scoped: ScopeIndex::default(),
            observers: ObserverSet::default(),
            pool,
        }
    }

    /// The interning pool this map allocates values from.
    pub fn pool(&self) -> &InternPool {
        &self.pool
    }

    /// Register an external observer, notified of every accepted event
    /// (primitive and decomposed) before the mutation commits. Observers
    /// cannot veto a mutation.
    pub fn subscribe(&mut self, observer: impl FnMut(&Event) + 'static) {
        self.observers.subscribe(Box::new(observer));
    }

    /// Publish a pre-change event through the handler pipeline.
    ///
    /// Index handlers run first (the identity index may reject), then
    /// observers, then the decomposer's derived events recurse through the
    /// same pipeline.
    pub(crate) fn publish(&mut self, event: &Event) -> Result<(), ModelError> {
        self.identity.apply(&self.store, event)?;
        self.typed.apply(&self.store, event);
        self.scoped.apply(&self.store, event);
        self.observers.notify(event);
        for derived in decompose(&self.store, event) {
            self.publish(&derived)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------

    /// Create a fresh topic with no identity.
    pub fn create_topic(&mut self) -> Result<TopicId, ModelError> {
        let serial = self.store.mint_serial();
        let id = TopicId(self.store.next_topic);
        self.store.next_topic += 1;
        self.store.topics.insert(
            id,
            TopicData {
                serial,
                item_identifiers: BTreeSet::new(),
                subject_identifiers: BTreeSet::new(),
                subject_locators: BTreeSet::new(),
                types: BTreeSet::new(),
                occurrences: Vec::new(),
                names: Vec::new(),
                roles_played: BTreeSet::new(),
                reified: None,
            },
        );
        self.publish(&Event::TopicAdded(id))?;
        Ok(id)
    }

    /// Get or create the topic with the given subject identifier.
    ///
    /// If a topic already carries the IRI as an item identifier, the subject
    /// identifier is added to that topic instead of minting a new one.
    pub fn create_topic_by_subject_identifier(
        &mut self,
        iri: &Iri,
    ) -> Result<TopicId, ModelError> {
        if let Some(t) = self.identity.topic_by_subject_identifier(iri) {
            return Ok(t);
        }
        if let Some(t) = self
            .identity
            .construct_by_item_identifier(iri)
            .and_then(|c| c.as_topic())
        {
            self.add_subject_identifier(t, iri.clone())?;
            return Ok(t);
        }
        let t = self.create_topic()?;
        if let Err(e) = self.add_subject_identifier(t, iri.clone()) {
            let _ = self.remove_topic(t);
            return Err(e);
        }
        Ok(t)
    }

    /// Get or create the topic with the given subject locator.
    pub fn create_topic_by_subject_locator(&mut self, iri: &Iri) -> Result<TopicId, ModelError> {
        if let Some(t) = self.identity.topic_by_subject_locator(iri) {
            return Ok(t);
        }
        let t = self.create_topic()?;
        self.add_subject_locator(t, iri.clone())?;
        Ok(t)
    }

    /// Get or create the topic with the given item identifier.
    ///
    /// If a topic already carries the IRI as a subject identifier, the item
    /// identifier is added to that topic. If the IRI identifies a non-topic
    /// construct, the call fails with an identity-constraint error.
    pub fn create_topic_by_item_identifier(&mut self, iri: &Iri) -> Result<TopicId, ModelError> {
        if let Some(t) = self
            .identity
            .construct_by_item_identifier(iri)
            .and_then(|c| c.as_topic())
        {
            return Ok(t);
        }
        if let Some(t) = self.identity.topic_by_subject_identifier(iri) {
            self.add_item_identifier(ConstructId::Topic(t), iri.clone())?;
            return Ok(t);
        }
        let t = self.create_topic()?;
        if let Err(e) = self.add_item_identifier(ConstructId::Topic(t), iri.clone()) {
            let _ = self.remove_topic(t);
            return Err(e);
        }
        Ok(t)
    }

    /// Create an association of the given type and scope.
    pub fn create_association(
        &mut self,
        typ: TopicId,
        themes: &[TopicId],
    ) -> Result<AssociationId, ModelError> {
        self.require_topic(typ)?;
        for theme in themes {
            self.require_topic(*theme)?;
        }
        let scope = self.store.scopes.intern(themes);
        let serial = self.store.mint_serial();
        let id = AssociationId(self.store.next_association);
        self.store.next_association += 1;
        self.store.associations.insert(
            id,
            AssociationData {
                serial,
                typ,
                scope,
                roles: Vec::new(),
                reifier: None,
                item_identifiers: BTreeSet::new(),
            },
        );
        self.publish(&Event::AssociationAdded(id))?;
        Ok(id)
    }

    /// Create a role within an association.
    pub fn create_role(
        &mut self,
        association: AssociationId,
        typ: TopicId,
        player: TopicId,
    ) -> Result<RoleId, ModelError> {
        self.require_association(association)?;
        self.require_topic(typ)?;
        self.require_topic(player)?;
        let serial = self.store.mint_serial();
        let id = RoleId(self.store.next_role);
        self.store.next_role += 1;
        self.store.roles.insert(
            id,
            RoleData {
                serial,
                parent: association,
                typ,
                player,
                reifier: None,
                item_identifiers: BTreeSet::new(),
            },
        );
        self.publish(&Event::RoleAdded(id))?;
        if let Some(a) = self.store.associations.get_mut(&association) {
            a.roles.push(id);
        }
        if let Some(p) = self.store.topics.get_mut(&player) {
            p.roles_played.insert(id);
        }
        Ok(id)
    }

    /// Create an occurrence of a topic.
    pub fn create_occurrence(
        &mut self,
        topic: TopicId,
        typ: TopicId,
        value: Literal,
        themes: &[TopicId],
    ) -> Result<OccurrenceId, ModelError> {
        self.require_topic(topic)?;
        self.require_topic(typ)?;
        for theme in themes {
            self.require_topic(*theme)?;
        }
        let value = self.pool.literal(value.value(), value.datatype());
        let scope = self.store.scopes.intern(themes);
        let serial = self.store.mint_serial();
        let id = OccurrenceId(self.store.next_occurrence);
        self.store.next_occurrence += 1;
        self.store.occurrences.insert(
            id,
            OccurrenceData {
                serial,
                parent: topic,
                typ,
                value,
                scope,
                reifier: None,
                item_identifiers: BTreeSet::new(),
            },
        );
        self.publish(&Event::OccurrenceAdded(id))?;
        if let Some(t) = self.store.topics.get_mut(&topic) {
            t.occurrences.push(id);
        }
        Ok(id)
    }

    /// Create a name with the default name type.
    pub fn create_name(
        &mut self,
        topic: TopicId,
        value: &str,
        themes: &[TopicId],
    ) -> Result<NameId, ModelError> {
        let typ = self.default_name_type()?;
        self.create_typed_name(topic, typ, value, themes)
    }

    /// Create a name with an explicit type.
    pub fn create_typed_name(
        &mut self,
        topic: TopicId,
        typ: TopicId,
        value: &str,
        themes: &[TopicId],
    ) -> Result<NameId, ModelError> {
        self.require_topic(topic)?;
        self.require_topic(typ)?;
        for theme in themes {
            self.require_topic(*theme)?;
        }
        let value = self.pool.string(value);
        let scope = self.store.scopes.intern(themes);
        let serial = self.store.mint_serial();
        let id = NameId(self.store.next_name);
        self.store.next_name += 1;
        self.store.names.insert(
            id,
            NameData {
                serial,
                parent: topic,
                typ,
                value,
                scope,
                variants: Vec::new(),
                reifier: None,
                item_identifiers: BTreeSet::new(),
            },
        );
        self.publish(&Event::NameAdded(id))?;
        if let Some(t) = self.store.topics.get_mut(&topic) {
            t.names.push(id);
        }
        Ok(id)
    }

    /// Create a variant of a name.
    ///
    /// The variant's effective scope is the union of the parent name's scope
    /// and `themes`, and must properly extend the name's scope: at least one
    /// theme not already on the name is required.
    pub fn create_variant(
        &mut self,
        name: NameId,
        value: Literal,
        themes: &[TopicId],
    ) -> Result<VariantId, ModelError> {
        let name_scope = self.require_name(name)?.scope;
        for theme in themes {
            self.require_topic(*theme)?;
        }
        let mut combined: Vec<TopicId> = self.store.scopes.themes(name_scope).to_vec();
        combined.extend_from_slice(themes);
        let scope = self.store.scopes.intern(&combined);
        if !self.store.scopes.is_proper_superset(scope, name_scope) {
            return Err(ModelError::VariantScopeNotExtended { name });
        }
        let value = self.pool.literal(value.value(), value.datatype());
        let serial = self.store.mint_serial();
        let id = VariantId(self.store.next_variant);
        self.store.next_variant += 1;
        self.store.variants.insert(
            id,
            VariantData {
                serial,
                parent: name,
                value,
                scope,
                reifier: None,
                item_identifiers: BTreeSet::new(),
            },
        );
        self.publish(&Event::VariantAdded(id))?;
        if let Some(n) = self.store.names.get_mut(&name) {
            n.variants.push(id);
        }
        Ok(id)
    }

    /// Get or create the default name type topic
    /// (`http://psi.topicmaps.org/iso13250/model/topic-name`).
    pub fn default_name_type(&mut self) -> Result<TopicId, ModelError> {
        let iri = self.pool.iri(crate::TOPIC_NAME_TYPE)?;
        self.create_topic_by_subject_identifier(&iri)
    }

    // ------------------------------------------------------------------
    // Identity mutators
    // ------------------------------------------------------------------

    /// Add an item identifier to any construct.
    pub fn add_item_identifier(
        &mut self,
        construct: ConstructId,
        iri: Iri,
    ) -> Result<(), ModelError> {
        self.require_construct(construct)?;
        if self
            .store
            .item_identifiers_of(construct)
            .is_some_and(|set| set.contains(&iri))
        {
            return Ok(());
        }
        self.publish(&Event::ItemIdentifierAdded {
            construct,
            iri: iri.clone(),
        })?;
        if let Some(set) = self.store.item_identifiers_mut(construct) {
            set.insert(iri);
        }
        Ok(())
    }

    /// Remove an item identifier. Unknown identifiers are ignored.
    pub fn remove_item_identifier(
        &mut self,
        construct: ConstructId,
        iri: &Iri,
    ) -> Result<(), ModelError> {
        self.require_construct(construct)?;
        if !self
            .store
            .item_identifiers_of(construct)
            .is_some_and(|set| set.contains(iri))
        {
            return Ok(());
        }
        self.publish(&Event::ItemIdentifierRemoved {
            construct,
            iri: iri.clone(),
        })?;
        if let Some(set) = self.store.item_identifiers_mut(construct) {
            set.remove(iri);
        }
        Ok(())
    }

    /// Add a subject identifier to a topic.
    pub fn add_subject_identifier(&mut self, topic: TopicId, iri: Iri) -> Result<(), ModelError> {
        if self.require_topic(topic)?.subject_identifiers.contains(&iri) {
            return Ok(());
        }
        self.publish(&Event::SubjectIdentifierAdded {
            topic,
            iri: iri.clone(),
        })?;
        if let Some(t) = self.store.topics.get_mut(&topic) {
            t.subject_identifiers.insert(iri);
        }
        Ok(())
    }

    /// Remove a subject identifier. Unknown identifiers are ignored.
    pub fn remove_subject_identifier(
        &mut self,
        topic: TopicId,
        iri: &Iri,
    ) -> Result<(), ModelError> {
        if !self.require_topic(topic)?.subject_identifiers.contains(iri) {
            return Ok(());
        }
        self.publish(&Event::SubjectIdentifierRemoved {
            topic,
            iri: iri.clone(),
        })?;
        if let Some(t) = self.store.topics.get_mut(&topic) {
            t.subject_identifiers.remove(iri);
        }
        Ok(())
    }

    /// Add a subject locator to a topic.
    pub fn add_subject_locator(&mut self, topic: TopicId, iri: Iri) -> Result<(), ModelError> {
        if self.require_topic(topic)?.subject_locators.contains(&iri) {
            return Ok(());
        }
        self.publish(&Event::SubjectLocatorAdded {
            topic,
            iri: iri.clone(),
        })?;
        if let Some(t) = self.store.topics.get_mut(&topic) {
            t.subject_locators.insert(iri);
        }
        Ok(())
    }

    /// Remove a subject locator. Unknown locators are ignored.
    pub fn remove_subject_locator(
        &mut self,
        topic: TopicId,
        iri: &Iri,
    ) -> Result<(), ModelError> {
        if !self.require_topic(topic)?.subject_locators.contains(iri) {
            return Ok(());
        }
        self.publish(&Event::SubjectLocatorRemoved {
            topic,
            iri: iri.clone(),
        })?;
        if let Some(t) = self.store.topics.get_mut(&topic) {
            t.subject_locators.remove(iri);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Type, scope, reifier, player, value mutators
    // ------------------------------------------------------------------

    /// Add a type to a topic. Re-adding a present type is a no-op.
    pub fn add_type(&mut self, topic: TopicId, typ: TopicId) -> Result<(), ModelError> {
        self.require_topic(typ)?;
        if self.require_topic(topic)?.types.contains(&typ) {
            return Ok(());
        }
        self.publish(&Event::TypeAdded { topic, typ })?;
        if let Some(t) = self.store.topics.get_mut(&topic) {
            t.types.insert(typ);
        }
        Ok(())
    }

    /// Remove a type from a topic. Absent types are ignored.
    pub fn remove_type(&mut self, topic: TopicId, typ: TopicId) -> Result<(), ModelError> {
        if !self.require_topic(topic)?.types.contains(&typ) {
            return Ok(());
        }
        self.publish(&Event::TypeRemoved { topic, typ })?;
        if let Some(t) = self.store.topics.get_mut(&topic) {
            t.types.remove(&typ);
        }
        Ok(())
    }

    /// Add a theme to a scoped construct's scope. Present themes are a no-op.
    ///
    /// Widening a name's scope is not re-validated against its variants; the
    /// proper-superset invariant is enforced on variant-side mutations only.
    pub fn add_theme(&mut self, construct: ConstructId, theme: TopicId) -> Result<(), ModelError> {
        self.require_topic(theme)?;
        let scope = self.require_scoped(construct)?;
        if self.store.scopes.contains(scope, theme) {
            return Ok(());
        }
        self.publish(&Event::ThemeAdded { construct, theme })?;
        let widened = self.store.scopes.with_theme(scope, theme);
        self.store.set_scope_of(construct, widened);
        Ok(())
    }

    /// Remove a theme from a scoped construct's scope. Absent themes are
    /// ignored. For a variant, the remaining scope must still properly
    /// extend the parent name's scope.
    pub fn remove_theme(
        &mut self,
        construct: ConstructId,
        theme: TopicId,
    ) -> Result<(), ModelError> {
        let scope = self.require_scoped(construct)?;
        if !self.store.scopes.contains(scope, theme) {
            return Ok(());
        }
        if let ConstructId::Variant(v) = construct {
            let narrowed = self.store.scopes.without_theme(scope, theme);
            let name = self.store.variants[&v].parent;
            let name_scope = self.require_name(name)?.scope;
            if !self.store.scopes.is_proper_superset(narrowed, name_scope) {
                return Err(ModelError::VariantScopeNotExtended { name });
            }
        }
        self.publish(&Event::ThemeRemoved { construct, theme })?;
        let narrowed = self.store.scopes.without_theme(scope, theme);
        self.store.set_scope_of(construct, narrowed);
        Ok(())
    }

    /// Set or clear the reifier of a reifiable construct.
    ///
    /// Setting a topic that already reifies a different construct is
    /// rejected; setting the current reifier again is a no-op.
    pub fn set_reifier(
        &mut self,
        construct: ConstructId,
        reifier: Option<TopicId>,
    ) -> Result<(), ModelError> {
        if construct.is_topic() {
            return Err(ModelError::NotReifiable(construct));
        }
        self.require_construct(construct)?;
        if let Some(r) = reifier {
            self.require_topic(r)?;
        }
        let old = self.store.reifier_of(construct);
        if old == reifier {
            return Ok(());
        }
        self.publish(&Event::ReifierChanged {
            construct,
            old,
            new: reifier,
        })?;
        if let Some(previous) = old {
            if let Some(t) = self.store.topics.get_mut(&previous) {
                t.reified = None;
            }
        }
        if let Some(next) = reifier {
            if let Some(t) = self.store.topics.get_mut(&next) {
                t.reified = Some(construct);
            }
        }
        self.store.set_reifier_of(construct, reifier);
        Ok(())
    }

    /// Reassign a role's player.
    pub fn set_player(&mut self, role: RoleId, player: TopicId) -> Result<(), ModelError> {
        self.require_topic(player)?;
        let old = self.require_role(role)?.player;
        if old == player {
            return Ok(());
        }
        self.publish(&Event::PlayerChanged {
            role,
            old,
            new: player,
        })?;
        if let Some(t) = self.store.topics.get_mut(&old) {
            t.roles_played.remove(&role);
        }
        if let Some(t) = self.store.topics.get_mut(&player) {
            t.roles_played.insert(role);
        }
        if let Some(r) = self.store.roles.get_mut(&role) {
            r.player = player;
        }
        Ok(())
    }

    /// Set the type of a typed construct (association, role, occurrence, or
    /// name).
    pub fn set_type(&mut self, construct: ConstructId, typ: TopicId) -> Result<(), ModelError> {
        self.require_topic(typ)?;
        let old = self.type_of(construct)?;
        if old == typ {
            return Ok(());
        }
        self.publish(&Event::TypeChanged {
            construct,
            old,
            new: typ,
        })?;
        match construct {
            ConstructId::Association(a) => {
                if let Some(d) = self.store.associations.get_mut(&a) {
                    d.typ = typ;
                }
            }
            ConstructId::Role(r) => {
                if let Some(d) = self.store.roles.get_mut(&r) {
                    d.typ = typ;
                }
            }
            ConstructId::Occurrence(o) => {
                if let Some(d) = self.store.occurrences.get_mut(&o) {
                    d.typ = typ;
                }
            }
            ConstructId::Name(n) => {
                if let Some(d) = self.store.names.get_mut(&n) {
                    d.typ = typ;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Set the literal value of an occurrence, name, or variant.
    pub fn set_value(&mut self, construct: ConstructId, value: Literal) -> Result<(), ModelError> {
        let old = self.value(construct)?;
        let value = self.pool.literal(value.value(), value.datatype());
        if old == value {
            return Ok(());
        }
        self.publish(&Event::ValueChanged {
            construct,
            old,
            new: value.clone(),
        })?;
        match construct {
            ConstructId::Occurrence(o) => {
                if let Some(d) = self.store.occurrences.get_mut(&o) {
                    d.value = value;
                }
            }
            ConstructId::Name(n) => {
                if let Some(d) = self.store.names.get_mut(&n) {
                    d.value = value;
                }
            }
            ConstructId::Variant(v) => {
                if let Some(d) = self.store.variants.get_mut(&v) {
                    d.value = value;
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove a topic and the characteristics it owns.
    ///
    /// Rejected with [`ModelError::TopicInUse`] while the topic is referenced
    /// as a type, role player, reifier, or scope theme anywhere in the map.
    pub fn remove_topic(&mut self, topic: TopicId) -> Result<(), ModelError> {
        let data = self.require_topic(topic)?;
        if !data.roles_played.is_empty() {
            return Err(ModelError::TopicInUse {
                topic,
                usage: TopicUsage::Player,
            });
        }
        if data.reified.is_some() {
            return Err(ModelError::TopicInUse {
                topic,
                usage: TopicUsage::Reifier,
            });
        }
        if self.typed.is_used_as_type(topic) {
            return Err(ModelError::TopicInUse {
                topic,
                usage: TopicUsage::Type,
            });
        }
        if self.scoped.is_used_as_theme(topic) {
            return Err(ModelError::TopicInUse {
                topic,
                usage: TopicUsage::Theme,
            });
        }
        self.publish(&Event::TopicRemoved(topic))?;
        let data = match self.store.topics.remove(&topic) {
            Some(data) => data,
            None => return Ok(()),
        };
        for occ in data.occurrences {
            self.drop_occurrence_record(occ);
        }
        for name in data.names {
            self.drop_name_record(name);
        }
        Ok(())
    }

    /// Remove an association and its roles.
    pub fn remove_association(&mut self, association: AssociationId) -> Result<(), ModelError> {
        self.require_association(association)?;
        self.publish(&Event::AssociationRemoved(association))?;
        let data = match self.store.associations.remove(&association) {
            Some(data) => data,
            None => return Ok(()),
        };
        for role in data.roles {
            self.drop_role_record(role);
        }
        self.clear_reifier_link(data.reifier);
        Ok(())
    }

    /// Remove a role from its association.
    pub fn remove_role(&mut self, role: RoleId) -> Result<(), ModelError> {
        self.require_role(role)?;
        self.publish(&Event::RoleRemoved(role))?;
        let parent = self.store.roles.get(&role).map(|d| d.parent);
        if let Some(parent) = parent {
            if let Some(a) = self.store.associations.get_mut(&parent) {
                a.roles.retain(|r| *r != role);
            }
        }
        self.drop_role_record(role);
        Ok(())
    }

    /// Remove an occurrence from its topic.
    pub fn remove_occurrence(&mut self, occurrence: OccurrenceId) -> Result<(), ModelError> {
        self.require_occurrence(occurrence)?;
        self.publish(&Event::OccurrenceRemoved(occurrence))?;
        let parent = self.store.occurrences.get(&occurrence).map(|d| d.parent);
        if let Some(parent) = parent {
            if let Some(t) = self.store.topics.get_mut(&parent) {
                t.occurrences.retain(|o| *o != occurrence);
            }
        }
        self.drop_occurrence_record(occurrence);
        Ok(())
    }

    /// Remove a name and its variants from its topic.
    pub fn remove_name(&mut self, name: NameId) -> Result<(), ModelError> {
        self.require_name(name)?;
        self.publish(&Event::NameRemoved(name))?;
        let parent = self.store.names.get(&name).map(|d| d.parent);
        if let Some(parent) = parent {
            if let Some(t) = self.store.topics.get_mut(&parent) {
                t.names.retain(|n| *n != name);
            }
        }
        self.drop_name_record(name);
        Ok(())
    }

    /// Remove a variant from its name.
    pub fn remove_variant(&mut self, variant: VariantId) -> Result<(), ModelError> {
        self.require_variant(variant)?;
        self.publish(&Event::VariantRemoved(variant))?;
        let parent = self.store.variants.get(&variant).map(|d| d.parent);
        if let Some(parent) = parent {
            if let Some(n) = self.store.names.get_mut(&parent) {
                n.variants.retain(|v| *v != variant);
            }
        }
        self.drop_variant_record(variant);
        Ok(())
    }

    fn drop_occurrence_record(&mut self, occurrence: OccurrenceId) {
        if let Some(data) = self.store.occurrences.remove(&occurrence) {
            self.clear_reifier_link(data.reifier);
        }
    }

    fn drop_name_record(&mut self, name: NameId) {
        if let Some(data) = self.store.names.remove(&name) {
            for variant in data.variants {
                self.drop_variant_record(variant);
            }
            self.clear_reifier_link(data.reifier);
        }
    }

    fn drop_variant_record(&mut self, variant: VariantId) {
        if let Some(data) = self.store.variants.remove(&variant) {
            self.clear_reifier_link(data.reifier);
        }
    }

    fn drop_role_record(&mut self, role: RoleId) {
        if let Some(data) = self.store.roles.remove(&role) {
            if let Some(t) = self.store.topics.get_mut(&data.player) {
                t.roles_played.remove(&role);
            }
            self.clear_reifier_link(data.reifier);
        }
    }

    fn clear_reifier_link(&mut self, reifier: Option<TopicId>) {
        if let Some(r) = reifier {
            if let Some(t) = self.store.topics.get_mut(&r) {
                t.reified = None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Reparenting (merge-engine primitives)
    // ------------------------------------------------------------------

    /// Move an occurrence to a new parent topic, re-registering its
    /// identities through the event pipeline.
    pub(crate) fn reparent_occurrence(
        &mut self,
        occurrence: OccurrenceId,
        new_parent: TopicId,
    ) -> Result<(), ModelError> {
        self.publish(&Event::OccurrenceRemoved(occurrence))?;
        let old_parent = self.store.occurrences.get(&occurrence).map(|d| d.parent);
        if let Some(old) = old_parent {
            if let Some(t) = self.store.topics.get_mut(&old) {
                t.occurrences.retain(|o| *o != occurrence);
            }
        }
        if let Some(d) = self.store.occurrences.get_mut(&occurrence) {
            d.parent = new_parent;
        }
        self.publish(&Event::OccurrenceAdded(occurrence))?;
        if let Some(t) = self.store.topics.get_mut(&new_parent) {
            t.occurrences.push(occurrence);
        }
        Ok(())
    }

    /// Move a name (with its variants) to a new parent topic.
    pub(crate) fn reparent_name(
        &mut self,
        name: NameId,
        new_parent: TopicId,
    ) -> Result<(), ModelError> {
        self.publish(&Event::NameRemoved(name))?;
        let old_parent = self.store.names.get(&name).map(|d| d.parent);
        if let Some(old) = old_parent {
            if let Some(t) = self.store.topics.get_mut(&old) {
                t.names.retain(|n| *n != name);
            }
        }
        if let Some(d) = self.store.names.get_mut(&name) {
            d.parent = new_parent;
        }
        self.publish(&Event::NameAdded(name))?;
        if let Some(t) = self.store.topics.get_mut(&new_parent) {
            t.names.push(name);
        }
        Ok(())
    }

    /// Move a variant to a new parent name.
    pub(crate) fn reparent_variant(
        &mut self,
        variant: VariantId,
        new_parent: NameId,
    ) -> Result<(), ModelError> {
        self.publish(&Event::VariantRemoved(variant))?;
        let old_parent = self.store.variants.get(&variant).map(|d| d.parent);
        if let Some(old) = old_parent {
            if let Some(n) = self.store.names.get_mut(&old) {
                n.variants.retain(|v| *v != variant);
            }
        }
        if let Some(d) = self.store.variants.get_mut(&variant) {
            d.parent = new_parent;
        }
        self.publish(&Event::VariantAdded(variant))?;
        if let Some(n) = self.store.names.get_mut(&new_parent) {
            n.variants.push(variant);
        }
        Ok(())
    }

    /// Swap one theme for another on a scoped construct, bypassing the
    /// variant superset check (merge replaces the theme on name and variant
    /// alike, preserving the relation).
    pub(crate) fn replace_theme(
        &mut self,
        construct: ConstructId,
        old: TopicId,
        new: TopicId,
    ) -> Result<(), ModelError> {
        let scope = self.require_scoped(construct)?;
        self.publish(&Event::ThemeRemoved {
            construct,
            theme: old,
        })?;
        self.publish(&Event::ThemeAdded {
            construct,
            theme: new,
        })?;
        let replaced = self.store.scopes.replace_theme(scope, old, new);
        self.store.set_scope_of(construct, replaced);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// All topics, in handle order.
    pub fn topics(&self) -> Vec<TopicId> {
        self.store.topics.keys().copied().collect()
    }

    /// All associations, in handle order.
    pub fn associations(&self) -> Vec<AssociationId> {
        self.store.associations.keys().copied().collect()
    }

    /// Whether the topic handle is live in this map.
    pub fn contains_topic(&self, topic: TopicId) -> bool {
        self.store.topics.contains_key(&topic)
    }

    /// Occurrences of a topic, in creation order.
    pub fn occurrences(&self, topic: TopicId) -> Result<Vec<OccurrenceId>, ModelError> {
        Ok(self.require_topic(topic)?.occurrences.clone())
    }

    /// Names of a topic, in creation order.
    pub fn names(&self, topic: TopicId) -> Result<Vec<NameId>, ModelError> {
        Ok(self.require_topic(topic)?.names.clone())
    }

    /// Variants of a name, in creation order.
    pub fn variants(&self, name: NameId) -> Result<Vec<VariantId>, ModelError> {
        Ok(self.require_name(name)?.variants.clone())
    }

    /// Roles of an association, in creation order.
    pub fn roles(&self, association: AssociationId) -> Result<Vec<RoleId>, ModelError> {
        Ok(self.require_association(association)?.roles.clone())
    }

    /// Roles a topic plays, in handle order.
    pub fn roles_played(&self, topic: TopicId) -> Result<Vec<RoleId>, ModelError> {
        Ok(self.require_topic(topic)?.roles_played.iter().copied().collect())
    }

    /// Types of a topic, in handle order.
    pub fn topic_types(&self, topic: TopicId) -> Result<Vec<TopicId>, ModelError> {
        Ok(self.require_topic(topic)?.types.iter().copied().collect())
    }

    /// Subject identifiers of a topic.
    pub fn subject_identifiers(&self, topic: TopicId) -> Result<Vec<Iri>, ModelError> {
        Ok(self
            .require_topic(topic)?
            .subject_identifiers
            .iter()
            .cloned()
            .collect())
    }

    /// Subject locators of a topic.
    pub fn subject_locators(&self, topic: TopicId) -> Result<Vec<Iri>, ModelError> {
        Ok(self
            .require_topic(topic)?
            .subject_locators
            .iter()
            .cloned()
            .collect())
    }

    /// Item identifiers of any construct.
    pub fn item_identifiers(&self, construct: ConstructId) -> Result<Vec<Iri>, ModelError> {
        self.store
            .item_identifiers_of(construct)
            .map(|set| set.iter().cloned().collect())
            .ok_or(ModelError::UnknownConstruct(construct))
    }

    /// Literal value of an occurrence, name, or variant.
    pub fn value(&self, construct: ConstructId) -> Result<Literal, ModelError> {
        match construct {
            ConstructId::Occurrence(o) => Ok(self.require_occurrence(o)?.value.clone()),
            ConstructId::Name(n) => Ok(self.require_name(n)?.value.clone()),
            ConstructId::Variant(v) => Ok(self.require_variant(v)?.value.clone()),
            _ => Err(ModelError::NotValued(construct)),
        }
    }

    /// Scope themes of a scoped construct, in handle order.
    pub fn scope(&self, construct: ConstructId) -> Result<Vec<TopicId>, ModelError> {
        let scope = self.require_scoped(construct)?;
        Ok(self.store.scopes.themes(scope).to_vec())
    }

    /// Type of a typed construct (association, role, occurrence, or name).
    pub fn type_of(&self, construct: ConstructId) -> Result<TopicId, ModelError> {
        match construct {
            ConstructId::Association(a) => Ok(self.require_association(a)?.typ),
            ConstructId::Role(r) => Ok(self.require_role(r)?.typ),
            ConstructId::Occurrence(o) => Ok(self.require_occurrence(o)?.typ),
            ConstructId::Name(n) => Ok(self.require_name(n)?.typ),
            _ => Err(ModelError::NotTyped(construct)),
        }
    }

    /// Player of a role.
    pub fn player(&self, role: RoleId) -> Result<TopicId, ModelError> {
        Ok(self.require_role(role)?.player)
    }

    /// Owning parent of a construct (the map itself for topics and
    /// associations).
    pub fn parent(&self, construct: ConstructId) -> Result<ConstructId, ModelError> {
        match construct {
            ConstructId::Map => Ok(ConstructId::Map),
            ConstructId::Topic(t) => {
                self.require_topic(t)?;
                Ok(ConstructId::Map)
            }
            ConstructId::Association(a) => {
                self.require_association(a)?;
                Ok(ConstructId::Map)
            }
            ConstructId::Role(r) => Ok(ConstructId::Association(self.require_role(r)?.parent)),
            ConstructId::Occurrence(o) => {
                Ok(ConstructId::Topic(self.require_occurrence(o)?.parent))
            }
            ConstructId::Name(n) => Ok(ConstructId::Topic(self.require_name(n)?.parent)),
            ConstructId::Variant(v) => Ok(ConstructId::Name(self.require_variant(v)?.parent)),
        }
    }

    /// Reifier of a reifiable construct, if any.
    pub fn reifier(&self, construct: ConstructId) -> Result<Option<TopicId>, ModelError> {
        if construct.is_topic() {
            return Err(ModelError::NotReifiable(construct));
        }
        self.require_construct(construct)?;
        Ok(self.store.reifier_of(construct))
    }

    /// The construct a topic reifies, if any.
    pub fn reified(&self, topic: TopicId) -> Result<Option<ConstructId>, ModelError> {
        Ok(self.require_topic(topic)?.reified)
    }

    /// Stable registration id of a construct, the ordinal canonical writers
    /// order by.
    pub fn construct_id(&self, construct: ConstructId) -> Result<u64, ModelError> {
        self.store
            .serial_of(construct)
            .ok_or(ModelError::UnknownConstruct(construct))
    }

    /// The identity index (lookup by identifier / registration id).
    pub fn identity(&self) -> &IdentityIndex {
        &self.identity
    }

    /// The type secondary index.
    pub fn type_index(&self) -> &TypeIndex {
        &self.typed
    }

    /// The scope secondary index.
    pub fn scope_index(&self) -> &ScopeIndex {
        &self.scoped
    }

    /// Resolve a topic by subject identifier.
    pub fn topic_by_subject_identifier(&self, iri: &Iri) -> Option<TopicId> {
        self.identity.topic_by_subject_identifier(iri)
    }

    /// Resolve a topic by subject locator.
    pub fn topic_by_subject_locator(&self, iri: &Iri) -> Option<TopicId> {
        self.identity.topic_by_subject_locator(iri)
    }

    /// Resolve a construct by item identifier.
    pub fn construct_by_item_identifier(&self, iri: &Iri) -> Option<ConstructId> {
        self.identity.construct_by_item_identifier(iri)
    }

    /// Per-kind construct counts.
    pub fn stats(&self) -> MapStats {
        MapStats {
            topics: self.store.topics.len(),
            associations: self.store.associations.len(),
            roles: self.store.roles.len(),
            occurrences: self.store.occurrences.len(),
            names: self.store.names.len(),
            variants: self.store.variants.len(),
        }
    }

    // ------------------------------------------------------------------
    // Lookup guards
    // ------------------------------------------------------------------

    pub(crate) fn require_topic(&self, topic: TopicId) -> Result<&TopicData, ModelError> {
        self.store
            .topics
            .get(&topic)
            .ok_or(ModelError::UnknownConstruct(ConstructId::Topic(topic)))
    }

    pub(crate) fn require_association(
        &self,
        association: AssociationId,
    ) -> Result<&AssociationData, ModelError> {
        self.store
            .associations
            .get(&association)
            .ok_or(ModelError::UnknownConstruct(ConstructId::Association(
                association,
            )))
    }

    pub(crate) fn require_role(&self, role: RoleId) -> Result<&RoleData, ModelError> {
        self.store
            .roles
            .get(&role)
            .ok_or(ModelError::UnknownConstruct(ConstructId::Role(role)))
    }

    pub(crate) fn require_occurrence(
        &self,
        occurrence: OccurrenceId,
    ) -> Result<&OccurrenceData, ModelError> {
        self.store
            .occurrences
            .get(&occurrence)
            .ok_or(ModelError::UnknownConstruct(ConstructId::Occurrence(
                occurrence,
            )))
    }

    pub(crate) fn require_name(&self, name: NameId) -> Result<&NameData, ModelError> {
        self.store
            .names
            .get(&name)
            .ok_or(ModelError::UnknownConstruct(ConstructId::Name(name)))
    }

    pub(crate) fn require_variant(&self, variant: VariantId) -> Result<&VariantData, ModelError> {
        self.store
            .variants
            .get(&variant)
            .ok_or(ModelError::UnknownConstruct(ConstructId::Variant(variant)))
    }

    fn require_construct(&self, construct: ConstructId) -> Result<(), ModelError> {
        if self.store.contains(construct) {
            Ok(())
        } else {
            Err(ModelError::UnknownConstruct(construct))
        }
    }

    fn require_scoped(&self, construct: ConstructId) -> Result<ScopeId, ModelError> {
        match construct {
            ConstructId::Association(_)
            | ConstructId::Occurrence(_)
            | ConstructId::Name(_)
            | ConstructId::Variant(_) => self
                .store
                .scope_of(construct)
                .ok_or(ModelError::UnknownConstruct(construct)),
            _ => Err(ModelError::NotScoped(construct)),
        }
    }
}

impl Default for TopicMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TopicMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicMap")
            .field("stats", &self.stats())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Factory for maps sharing one interning pool.
///
/// Literals and IRIs intern process-wide through the shared pool, which keeps
/// cross-map copy cheap; each map remains an independently owned,
/// single-writer graph.
#[derive(Debug, Clone, Default)]
pub struct TopicMapSystem {
    pool: InternPool,
}

impl TopicMapSystem {
    /// Create a system with a fresh pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared interning pool.
    pub fn pool(&self) -> &InternPool {
        &self.pool
    }

    /// Mint a new map bound to the shared pool.
    pub fn create_map(&self) -> TopicMap {
        TopicMap::with_pool(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(map: &TopicMap, value: &str) -> Iri {
        map.pool().iri(value).unwrap()
    }

    #[test]
    fn create_topic_assigns_serial_at_registration() {
        let mut map = TopicMap::new();
        let a = map.create_topic().unwrap();
        let b = map.create_topic().unwrap();
        let sa = map.construct_id(ConstructId::Topic(a)).unwrap();
        let sb = map.construct_id(ConstructId::Topic(b)).unwrap();
        assert!(sb > sa);
        assert_eq!(
            map.identity().construct_by_id(sa),
            Some(ConstructId::Topic(a))
        );
    }

    #[test]
    fn subject_identifier_lookup_round_trip() {
        let mut map = TopicMap::new();
        let si = iri(&map, "http://example.org/thing");
        let t = map.create_topic_by_subject_identifier(&si).unwrap();
        assert_eq!(map.topic_by_subject_identifier(&si), Some(t));
        // Get-or-create returns the same topic.
        assert_eq!(map.create_topic_by_subject_identifier(&si).unwrap(), t);
        assert_eq!(map.stats().topics, 1);
    }

    #[test]
    fn colliding_subject_identifier_is_rejected_without_side_effects() {
        let mut map = TopicMap::new();
        let si = iri(&map, "http://example.org/thing");
        let a = map.create_topic().unwrap();
        let b = map.create_topic().unwrap();
        map.add_subject_identifier(a, si.clone()).unwrap();
        let err = map.add_subject_identifier(b, si.clone()).unwrap_err();
        assert!(matches!(err, ModelError::IdentityConstraint { .. }));
        assert!(map.subject_identifiers(b).unwrap().is_empty());
        assert_eq!(map.topic_by_subject_identifier(&si), Some(a));
    }

    #[test]
    fn item_identifier_of_non_topic_blocks_subject_identifier() {
        let mut map = TopicMap::new();
        let ii = iri(&map, "http://example.org/occ-1");
        let t = map.create_topic().unwrap();
        let typ = map.create_topic().unwrap();
        let value = map.pool().string("v");
        let o = map.create_occurrence(t, typ, value, &[]).unwrap();
        map.add_item_identifier(ConstructId::Occurrence(o), ii.clone())
            .unwrap();
        let err = map.add_subject_identifier(t, ii).unwrap_err();
        assert!(matches!(err, ModelError::IdentityConstraint { .. }));
    }

    #[test]
    fn topic_may_hold_item_identifier_equal_to_other_topics_subject_identifier() {
        // The two topics denote the same subject; the index tolerates the
        // state and leaves the merge to the caller.
        let mut map = TopicMap::new();
        let u = iri(&map, "http://example.org/u1");
        let s1 = map.create_topic().unwrap();
        let s2 = map.create_topic().unwrap();
        map.add_subject_identifier(s1, u.clone()).unwrap();
        map.add_item_identifier(ConstructId::Topic(s2), u.clone())
            .unwrap();
        assert_eq!(map.topic_by_subject_identifier(&u), Some(s1));
        assert_eq!(
            map.construct_by_item_identifier(&u),
            Some(ConstructId::Topic(s2))
        );
    }

    #[test]
    fn readding_identifier_is_a_noop() {
        let mut map = TopicMap::new();
        let si = iri(&map, "http://example.org/x");
        let t = map.create_topic().unwrap();
        map.add_subject_identifier(t, si.clone()).unwrap();
        map.add_subject_identifier(t, si.clone()).unwrap();
        assert_eq!(map.subject_identifiers(t).unwrap().len(), 1);
    }

    #[test]
    fn role_creation_tracks_roles_played() {
        let mut map = TopicMap::new();
        let at = map.create_topic().unwrap();
        let rt = map.create_topic().unwrap();
        let player = map.create_topic().unwrap();
        let a = map.create_association(at, &[]).unwrap();
        let r = map.create_role(a, rt, player).unwrap();
        assert_eq!(map.roles(a).unwrap(), vec![r]);
        assert_eq!(map.roles_played(player).unwrap(), vec![r]);
        assert_eq!(map.player(r).unwrap(), player);
    }

    #[test]
    fn set_player_moves_back_reference() {
        let mut map = TopicMap::new();
        let at = map.create_topic().unwrap();
        let rt = map.create_topic().unwrap();
        let p1 = map.create_topic().unwrap();
        let p2 = map.create_topic().unwrap();
        let a = map.create_association(at, &[]).unwrap();
        let r = map.create_role(a, rt, p1).unwrap();
        map.set_player(r, p2).unwrap();
        assert!(map.roles_played(p1).unwrap().is_empty());
        assert_eq!(map.roles_played(p2).unwrap(), vec![r]);
    }

    #[test]
    fn reifier_conflict_is_rejected() {
        let mut map = TopicMap::new();
        let at = map.create_topic().unwrap();
        let a1 = map.create_association(at, &[]).unwrap();
        let a2 = map.create_association(at, &[]).unwrap();
        let r = map.create_topic().unwrap();
        map.set_reifier(ConstructId::Association(a1), Some(r))
            .unwrap();
        let err = map
            .set_reifier(ConstructId::Association(a2), Some(r))
            .unwrap_err();
        assert!(matches!(err, ModelError::ReifierConflict { .. }));
        assert_eq!(map.reified(r).unwrap(), Some(ConstructId::Association(a1)));
    }

    #[test]
    fn reassigning_same_reifier_is_a_noop() {
        let mut map = TopicMap::new();
        let at = map.create_topic().unwrap();
        let a = map.create_association(at, &[]).unwrap();
        let r = map.create_topic().unwrap();
        map.set_reifier(ConstructId::Association(a), Some(r))
            .unwrap();
        map.set_reifier(ConstructId::Association(a), Some(r))
            .unwrap();
        map.set_reifier(ConstructId::Association(a), None).unwrap();
        assert_eq!(map.reified(r).unwrap(), None);
        assert_eq!(map.reifier(ConstructId::Association(a)).unwrap(), None);
    }

    #[test]
    fn variant_scope_must_properly_extend_name_scope() {
        let mut map = TopicMap::new();
        let t = map.create_topic().unwrap();
        let theme = map.create_topic().unwrap();
        let n = map.create_name(t, "Name", &[theme]).unwrap();
        let value = map.pool().string("variant");
        // Same scope as the name: rejected.
        let err = map.create_variant(n, value.clone(), &[theme]).unwrap_err();
        assert!(matches!(err, ModelError::VariantScopeNotExtended { .. }));
        let extra = map.create_topic().unwrap();
        let v = map.create_variant(n, value, &[extra]).unwrap();
        // Effective scope is the union of name scope and variant themes.
        assert_eq!(map.scope(ConstructId::Variant(v)).unwrap().len(), 2);
    }

    #[test]
    fn removing_theme_cannot_collapse_variant_scope() {
        let mut map = TopicMap::new();
        let t = map.create_topic().unwrap();
        let extra = map.create_topic().unwrap();
        let n = map.create_name(t, "Name", &[]).unwrap();
        let value = map.pool().string("variant");
        let v = map.create_variant(n, value, &[extra]).unwrap();
        let err = map
            .remove_theme(ConstructId::Variant(v), extra)
            .unwrap_err();
        assert!(matches!(err, ModelError::VariantScopeNotExtended { .. }));
    }

    #[test]
    fn topic_in_use_cannot_be_removed() {
        let mut map = TopicMap::new();
        let typ = map.create_topic().unwrap();
        let t = map.create_topic().unwrap();
        map.add_type(t, typ).unwrap();
        assert!(matches!(
            map.remove_topic(typ).unwrap_err(),
            ModelError::TopicInUse {
                usage: TopicUsage::Type,
                ..
            }
        ));
        map.remove_type(t, typ).unwrap();
        map.remove_topic(typ).unwrap();
        assert!(!map.contains_topic(typ));
    }

    #[test]
    fn theme_in_use_blocks_removal() {
        let mut map = TopicMap::new();
        let t = map.create_topic().unwrap();
        let theme = map.create_topic().unwrap();
        let n = map.create_name(t, "Name", &[theme]).unwrap();
        assert!(matches!(
            map.remove_topic(theme).unwrap_err(),
            ModelError::TopicInUse {
                usage: TopicUsage::Theme,
                ..
            }
        ));
        map.remove_name(n).unwrap();
        map.remove_topic(theme).unwrap();
    }

    #[test]
    fn removing_topic_unbinds_identities_and_children() {
        let mut map = TopicMap::new();
        let si = iri(&map, "http://example.org/s");
        let ii = iri(&map, "http://example.org/occ");
        let t = map.create_topic_by_subject_identifier(&si).unwrap();
        let typ = map.create_topic().unwrap();
        let value = map.pool().string("v");
        let o = map.create_occurrence(t, typ, value, &[]).unwrap();
        map.add_item_identifier(ConstructId::Occurrence(o), ii.clone())
            .unwrap();
        map.remove_topic(t).unwrap();
        assert_eq!(map.topic_by_subject_identifier(&si), None);
        assert_eq!(map.construct_by_item_identifier(&ii), None);
        assert_eq!(map.stats().occurrences, 0);
    }

    #[test]
    fn removing_association_cascades_to_roles() {
        let mut map = TopicMap::new();
        let at = map.create_topic().unwrap();
        let rt = map.create_topic().unwrap();
        let p = map.create_topic().unwrap();
        let a = map.create_association(at, &[]).unwrap();
        let _r = map.create_role(a, rt, p).unwrap();
        map.remove_association(a).unwrap();
        assert!(map.roles_played(p).unwrap().is_empty());
        assert_eq!(map.stats().roles, 0);
        // The player is no longer in use and can be removed.
        map.remove_topic(p).unwrap();
    }

    #[test]
    fn observers_see_decomposed_events() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut map = TopicMap::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            map.subscribe(move |ev| seen.borrow_mut().push(ev.kind()));
        }
        let si = iri(&map, "http://example.org/x");
        let t = map.create_topic_by_subject_identifier(&si).unwrap();
        let _ = t;
        use crate::events::EventKind;
        assert_eq!(
            *seen.borrow(),
            vec![EventKind::TopicAdded, EventKind::SubjectIdentifierAdded]
        );
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let mut map = TopicMap::new();
        let t = map.create_topic().unwrap();
        map.remove_topic(t).unwrap();
        assert!(matches!(
            map.add_type(t, t).unwrap_err(),
            ModelError::UnknownConstruct(_)
        ));
        assert!(map.occurrences(t).is_err());
    }

    #[test]
    fn system_maps_share_one_pool() {
        let system = TopicMapSystem::new();
        let map_a = system.create_map();
        let map_b = system.create_map();
        let ia = map_a.pool().iri("http://example.org/shared").unwrap();
        let ib = map_b.pool().iri("http://example.org/shared").unwrap();
        assert_eq!(ia.serial(), ib.serial());
        assert!(map_a.pool().same_pool(map_b.pool()));
    }
}
