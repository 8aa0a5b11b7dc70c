//! Topic merging, cross-map copying, and duplicate removal.
//!
//! All three operations ride on the structural signatures from
//! [`crate::signature`]: equal signatures under one parent mean duplicate
//! constructs, which are collapsed by unioning item identifiers and reifiers
//! into a survivor and discarding the rest.
//!
//! ## Cascades
//!
//! Merging two topics can create fresh duplicates elsewhere: reassigning a
//! role's player can make two associations structurally identical, and
//! collapsing two characteristics can reveal that their reifiers denote the
//! same subject. Derived merge work is never performed recursively; it is
//! pushed onto an explicit worklist of topic pairs and association pairs and
//! drained iteratively, with every dequeued pair re-validated (still live,
//! still duplicates) before it is merged.
//!
//! ## Failure semantics
//!
//! None of these operations are transactional. A reifier conflict or
//! identity-constraint violation partway through aborts the operation with
//! already-applied effects left in place; callers that need atomicity must
//! copy the map beforehand.

use std::collections::{BTreeMap, VecDeque};

use crate::error::ModelError;
use crate::map::TopicMap;
use crate::signature;
use crate::types::{
    AssociationId, ConstructId, NameId, OccurrenceId, RoleId, TopicId, VariantId,
};

/// Worklist of derived merge operations.
#[derive(Debug, Default)]
struct MergeQueue {
    topics: VecDeque<(TopicId, TopicId)>,
    associations: VecDeque<(AssociationId, AssociationId)>,
    /// merged-away topic -> its survivor, for resolving stale queue entries.
    aliases: BTreeMap<TopicId, TopicId>,
}

impl MergeQueue {
    fn resolve(&self, mut topic: TopicId) -> TopicId {
        while let Some(next) = self.aliases.get(&topic) {
            topic = *next;
        }
        topic
    }
}

fn map_topic(mapping: &BTreeMap<TopicId, TopicId>, topic: TopicId) -> Result<TopicId, ModelError> {
    mapping
        .get(&topic)
        .copied()
        .ok_or(ModelError::UnknownConstruct(ConstructId::Topic(topic)))
}

impl TopicMap {
    /// Merge `source` into `target`, then remove `source`.
    ///
    /// After the merge, `target` carries the union of both topics'
    /// identities, types, and characteristics (signature-deduplicated), and
    /// every reference to `source` (as a type, scope theme, role player, or
    /// reifier relationship) points at `target` instead. Associations made
    /// structurally identical by the player reassignment are collapsed,
    /// cascading as far as needed.
    ///
    /// `merge_topics(t, t)` is a no-op. A [`ModelError::MergeReifierConflict`]
    /// is fatal and leaves the map partially mutated.
    pub fn merge_topics(&mut self, source: TopicId, target: TopicId) -> Result<(), ModelError> {
        if source == target {
            return Ok(());
        }
        self.require_topic(source)?;
        self.require_topic(target)?;
        let mut queue = MergeQueue::default();
        queue.topics.push_back((source, target));
        self.drain_merge_queue(&mut queue)
    }

    /// Merge every construct of `source` into this map.
    ///
    /// Source topics are matched against this map's identity index by
    /// subject locator, subject identifier, and item identifier (including
    /// the item-identifier / subject-identifier cross-matches); matches reuse
    /// the existing topic, and when one source topic matches several existing
    /// topics those are merged immediately so the mapping stays a function.
    /// Unmatched topics are copied fresh. Characteristics and associations
    /// are copied through signature comparison, so structures the target
    /// already contains are folded rather than duplicated.
    pub fn copy_from(&mut self, source: &TopicMap) -> Result<(), ModelError> {
        tracing::debug!(source = ?source.stats(), target = ?self.stats(), "copying map");
        let mut queue = MergeQueue::default();

        // Resolve every source topic to a target topic.
        let mut mapping: BTreeMap<TopicId, TopicId> = BTreeMap::new();
        for s in source.topics() {
            let mut matches: Vec<TopicId> = Vec::new();
            for iri in source.subject_locators(s)? {
                if let Some(t) = self.topic_by_subject_locator(&iri) {
                    matches.push(t);
                }
            }
            for iri in source.subject_identifiers(s)? {
                if let Some(t) = self.topic_by_subject_identifier(&iri) {
                    matches.push(t);
                }
                if let Some(t) = self
                    .construct_by_item_identifier(&iri)
                    .and_then(|c| c.as_topic())
                {
                    matches.push(t);
                }
            }
            for iri in source.item_identifiers(ConstructId::Topic(s))? {
                if let Some(t) = self
                    .construct_by_item_identifier(&iri)
                    .and_then(|c| c.as_topic())
                {
                    matches.push(t);
                }
                if let Some(t) = self.topic_by_subject_identifier(&iri) {
                    matches.push(t);
                }
            }
            matches.sort_unstable();
            matches.dedup();
            let Some((&survivor, rest)) = matches.split_first() else {
                continue;
            };
            for other in rest {
                self.merge_topics(*other, survivor)?;
                for mapped in mapping.values_mut() {
                    if *mapped == *other {
                        *mapped = survivor;
                    }
                }
            }
            mapping.insert(s, survivor);
        }

        // Unmatched topics are copied fresh.
        for s in source.topics() {
            if !mapping.contains_key(&s) {
                let t = self.create_topic()?;
                mapping.insert(s, t);
            }
        }

        // Identities, types, and characteristics.
        for s in source.topics() {
            let t = map_topic(&mapping, s)?;
            for iri in source.subject_identifiers(s)? {
                self.add_subject_identifier(t, iri)?;
            }
            for iri in source.subject_locators(s)? {
                self.add_subject_locator(t, iri)?;
            }
            for iri in source.item_identifiers(ConstructId::Topic(s))? {
                self.add_item_identifier(ConstructId::Topic(t), iri)?;
            }
            for typ in source.topic_types(s)? {
                let typ = map_topic(&mapping, typ)?;
                self.add_type(t, typ)?;
            }
            self.copy_occurrences(source, s, t, &mapping, &mut queue)?;
            self.copy_names(source, s, t, &mapping, &mut queue)?;
        }

        // Associations last, once every player resolves.
        self.copy_associations(source, &mapping, &mut queue)?;

        self.drain_merge_queue(&mut queue)?;
        tracing::debug!(target = ?self.stats(), "map copy complete");
        Ok(())
    }

    /// Collapse every duplicate occurrence, name, variant, and association
    /// in the map. Intended as a normalization pass before canonical export
    /// or after bulk import.
    pub fn remove_duplicates(&mut self) -> Result<(), ModelError> {
        tracing::debug!(stats = ?self.stats(), "removing duplicates");
        let mut queue = MergeQueue::default();
        for topic in self.topics() {
            if !self.contains_topic(topic) {
                continue;
            }
            self.dedup_topic_inner(topic, &mut queue)?;
        }
        self.dedup_associations_inner(&mut queue)?;
        self.drain_merge_queue(&mut queue)
    }

    /// Collapse duplicate occurrences and names of one topic.
    pub fn dedup_topic(&mut self, topic: TopicId) -> Result<(), ModelError> {
        self.require_topic(topic)?;
        let mut queue = MergeQueue::default();
        self.dedup_topic_inner(topic, &mut queue)?;
        self.drain_merge_queue(&mut queue)
    }

    /// Collapse duplicate variants of one name.
    pub fn dedup_name(&mut self, name: NameId) -> Result<(), ModelError> {
        self.require_name(name)?;
        let mut queue = MergeQueue::default();
        self.dedup_name_inner(name, &mut queue)?;
        self.drain_merge_queue(&mut queue)
    }

    /// Collapse duplicate roles within one association.
    pub fn dedup_roles(&mut self, association: AssociationId) -> Result<(), ModelError> {
        self.require_association(association)?;
        let mut queue = MergeQueue::default();
        self.dedup_roles_inner(association, &mut queue)?;
        self.drain_merge_queue(&mut queue)
    }

    /// Collapse duplicate associations map-wide (deduplicating each
    /// association's roles first).
    pub fn dedup_associations(&mut self) -> Result<(), ModelError> {
        let mut queue = MergeQueue::default();
        self.dedup_associations_inner(&mut queue)?;
        self.drain_merge_queue(&mut queue)
    }

    // ------------------------------------------------------------------
    // Worklist
    // ------------------------------------------------------------------

    fn drain_merge_queue(&mut self, queue: &mut MergeQueue) -> Result<(), ModelError> {
        loop {
            if let Some((source, target)) = queue.topics.pop_front() {
                let source = queue.resolve(source);
                let target = queue.resolve(target);
                if source == target
                    || !self.contains_topic(source)
                    || !self.contains_topic(target)
                {
                    continue;
                }
                self.merge_topic_pair(source, target, queue)?;
                queue.aliases.insert(source, target);
                continue;
            }
            let Some((duplicate, survivor)) = queue.associations.pop_front() else {
                break;
            };
            if duplicate == survivor
                || !self.store.associations.contains_key(&duplicate)
                || !self.store.associations.contains_key(&survivor)
            {
                continue;
            }
            // Earlier merges may have changed either side; only collapse
            // pairs that are still structurally identical.
            if signature::association_signature(self, duplicate)?
                != signature::association_signature(self, survivor)?
            {
                continue;
            }
            self.merge_association_pair(duplicate, survivor, queue)?;
        }
        Ok(())
    }

    fn merge_topic_pair(
        &mut self,
        source: TopicId,
        target: TopicId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        let source_reified = self.require_topic(source)?.reified;
        let target_reified = self.require_topic(target)?.reified;
        if let (Some(a), Some(b)) = (source_reified, target_reified) {
            if a != b {
                return Err(ModelError::MergeReifierConflict { consumed: source, target });
            }
        }
        tracing::debug!(%source, %target, "merging topics");

        // Re-point the reified construct at the surviving topic.
        if let Some(construct) = source_reified {
            if target_reified.is_none() {
                self.set_reifier(construct, None)?;
                self.set_reifier(construct, Some(target))?;
            }
        }

        // Identities move wholesale; each one is unbound before rebinding so
        // the identity index never sees a collision with the source itself.
        for iri in self.item_identifiers(ConstructId::Topic(source))? {
            self.remove_item_identifier(ConstructId::Topic(source), &iri)?;
            self.add_item_identifier(ConstructId::Topic(target), iri)?;
        }
        for iri in self.subject_identifiers(source)? {
            self.remove_subject_identifier(source, &iri)?;
            self.add_subject_identifier(target, iri)?;
        }
        for iri in self.subject_locators(source)? {
            self.remove_subject_locator(source, &iri)?;
            self.add_subject_locator(target, iri)?;
        }

        // Replace source as a type and as a theme everywhere.
        for topic in self.typed.topics_of_type(source) {
            self.remove_type(topic, source)?;
            self.add_type(topic, target)?;
        }
        for construct in self.typed.constructs_of_type(source) {
            self.set_type(construct, target)?;
        }
        for construct in self.scoped.scoped_by_theme(source) {
            self.replace_theme(construct, source, target)?;
        }

        // Union instance types.
        for typ in self.topic_types(source)? {
            let typ = if typ == source { target } else { typ };
            self.add_type(target, typ)?;
        }

        // Characteristics, deduplicated against the target's children.
        let mut occurrence_sigs: BTreeMap<u64, OccurrenceId> = BTreeMap::new();
        for occurrence in self.occurrences(target)? {
            occurrence_sigs.insert(signature::occurrence_signature(self, occurrence)?, occurrence);
        }
        for occurrence in self.occurrences(source)? {
            let sig = signature::occurrence_signature(self, occurrence)?;
            match occurrence_sigs.get(&sig).copied() {
                Some(survivor) => self.absorb_occurrence(occurrence, survivor, queue)?,
                None => {
                    self.reparent_occurrence(occurrence, target)?;
                    occurrence_sigs.insert(sig, occurrence);
                }
            }
        }
        let mut name_sigs: BTreeMap<u64, NameId> = BTreeMap::new();
        for name in self.names(target)? {
            name_sigs.insert(signature::name_signature(self, name)?, name);
        }
        for name in self.names(source)? {
            let sig = signature::name_signature(self, name)?;
            match name_sigs.get(&sig).copied() {
                Some(survivor) => self.absorb_name(name, survivor, queue)?,
                None => {
                    self.reparent_name(name, target)?;
                    name_sigs.insert(sig, name);
                }
            }
        }

        // Reassign played roles; each reassignment may create a duplicate of
        // an association the target already participates in.
        let mut association_sigs: BTreeMap<u64, AssociationId> = BTreeMap::new();
        for role in self.roles_played(target)? {
            let parent = self.require_role(role)?.parent;
            let sig = signature::association_signature(self, parent)?;
            association_sigs.entry(sig).or_insert(parent);
        }
        for role in self.roles_played(source)? {
            self.set_player(role, target)?;
            let parent = self.require_role(role)?.parent;
            let sig = signature::association_signature(self, parent)?;
            match association_sigs.get(&sig).copied() {
                Some(existing) if existing != parent => {
                    tracing::trace!(%parent, %existing, "player reassignment created a duplicate association");
                    queue.associations.push_back((parent, existing));
                }
                _ => {
                    association_sigs.insert(sig, parent);
                }
            }
        }

        self.remove_topic(source)
    }

    fn merge_association_pair(
        &mut self,
        duplicate: AssociationId,
        survivor: AssociationId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        tracing::debug!(%duplicate, %survivor, "collapsing duplicate associations");
        self.move_item_identifiers(
            ConstructId::Association(duplicate),
            ConstructId::Association(survivor),
        )?;
        self.fold_reifier(
            ConstructId::Association(duplicate),
            ConstructId::Association(survivor),
            queue,
        )?;
        // Match roles pairwise by signature, consuming each counterpart so
        // duplicate roles fold by multiplicity.
        let mut survivor_roles: Vec<(u64, RoleId)> = Vec::new();
        for role in self.roles(survivor)? {
            survivor_roles.push((signature::role_signature(self, role)?, role));
        }
        for role in self.roles(duplicate)? {
            let sig = signature::role_signature(self, role)?;
            if let Some(pos) = survivor_roles.iter().position(|(s, _)| *s == sig) {
                let (_, counterpart) = survivor_roles.remove(pos);
                self.move_item_identifiers(ConstructId::Role(role), ConstructId::Role(counterpart))?;
                self.fold_reifier(
                    ConstructId::Role(role),
                    ConstructId::Role(counterpart),
                    queue,
                )?;
            }
        }
        self.remove_association(duplicate)
    }

    // ------------------------------------------------------------------
    // Characteristic folding
    // ------------------------------------------------------------------

    fn absorb_occurrence(
        &mut self,
        duplicate: OccurrenceId,
        survivor: OccurrenceId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        tracing::trace!(%duplicate, %survivor, "folding duplicate occurrence");
        self.move_item_identifiers(
            ConstructId::Occurrence(duplicate),
            ConstructId::Occurrence(survivor),
        )?;
        self.fold_reifier(
            ConstructId::Occurrence(duplicate),
            ConstructId::Occurrence(survivor),
            queue,
        )?;
        self.remove_occurrence(duplicate)
    }

    fn absorb_name(
        &mut self,
        duplicate: NameId,
        survivor: NameId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        tracing::trace!(%duplicate, %survivor, "folding duplicate name");
        self.move_item_identifiers(ConstructId::Name(duplicate), ConstructId::Name(survivor))?;
        self.fold_reifier(
            ConstructId::Name(duplicate),
            ConstructId::Name(survivor),
            queue,
        )?;
        let mut variant_sigs: BTreeMap<u64, VariantId> = BTreeMap::new();
        for variant in self.variants(survivor)? {
            variant_sigs.insert(signature::variant_signature(self, variant)?, variant);
        }
        for variant in self.variants(duplicate)? {
            let sig = signature::variant_signature(self, variant)?;
            match variant_sigs.get(&sig).copied() {
                Some(existing) => self.absorb_variant(variant, existing, queue)?,
                None => {
                    self.reparent_variant(variant, survivor)?;
                    variant_sigs.insert(sig, variant);
                }
            }
        }
        self.remove_name(duplicate)
    }

    fn absorb_variant(
        &mut self,
        duplicate: VariantId,
        survivor: VariantId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        self.move_item_identifiers(
            ConstructId::Variant(duplicate),
            ConstructId::Variant(survivor),
        )?;
        self.fold_reifier(
            ConstructId::Variant(duplicate),
            ConstructId::Variant(survivor),
            queue,
        )?;
        self.remove_variant(duplicate)
    }

    fn move_item_identifiers(
        &mut self,
        from: ConstructId,
        to: ConstructId,
    ) -> Result<(), ModelError> {
        for iri in self.item_identifiers(from)? {
            self.remove_item_identifier(from, &iri)?;
            self.add_item_identifier(to, iri)?;
        }
        Ok(())
    }

    /// Move a duplicate's reifier onto its survivor. When both carry
    /// reifiers, the two reifying topics denote the same subject and are
    /// queued for merging.
    fn fold_reifier(
        &mut self,
        duplicate: ConstructId,
        survivor: ConstructId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        let Some(reifier) = self.store.reifier_of(duplicate) else {
            return Ok(());
        };
        self.set_reifier(duplicate, None)?;
        match self.store.reifier_of(survivor) {
            None => self.set_reifier(survivor, Some(reifier)),
            Some(existing) if existing != reifier => {
                tracing::warn!(%reifier, %existing, "conflicting reifiers on duplicates; merging reifying topics");
                queue.topics.push_back((reifier, existing));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Attach a reifier to a copied construct, queueing a topic merge when a
    /// different reifier is already present.
    fn assign_reifier(
        &mut self,
        construct: ConstructId,
        reifier: TopicId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        match self.store.reifier_of(construct) {
            None => self.set_reifier(construct, Some(reifier)),
            Some(existing) if existing != reifier => {
                queue.topics.push_back((reifier, existing));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Copy helpers
    // ------------------------------------------------------------------

    fn copy_occurrences(
        &mut self,
        source: &TopicMap,
        s: TopicId,
        t: TopicId,
        mapping: &BTreeMap<TopicId, TopicId>,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        let mut sigs: BTreeMap<u64, OccurrenceId> = BTreeMap::new();
        for occurrence in self.occurrences(t)? {
            sigs.insert(signature::occurrence_signature(self, occurrence)?, occurrence);
        }
        for occurrence in source.occurrences(s)? {
            let c = ConstructId::Occurrence(occurrence);
            let typ = map_topic(mapping, source.type_of(c)?)?;
            let source_value = source.value(c)?;
            let value = self
                .pool()
                .literal(source_value.value(), source_value.datatype());
            let themes = self.map_themes(&source.scope(c)?, mapping)?;
            let sig = signature::occurrence_parts(
                self.topic_serial(typ)?,
                &self.topic_serials(&themes),
                value.serial(),
            );
            let target_occurrence = match sigs.get(&sig).copied() {
                Some(existing) => existing,
                None => {
                    let created = self.create_occurrence(t, typ, value, &themes)?;
                    sigs.insert(sig, created);
                    created
                }
            };
            for iri in source.item_identifiers(c)? {
                self.add_item_identifier(ConstructId::Occurrence(target_occurrence), iri)?;
            }
            if let Some(reifier) = source.reifier(c)? {
                let reifier = map_topic(mapping, reifier)?;
                self.assign_reifier(ConstructId::Occurrence(target_occurrence), reifier, queue)?;
            }
        }
        Ok(())
    }

    fn copy_names(
        &mut self,
        source: &TopicMap,
        s: TopicId,
        t: TopicId,
        mapping: &BTreeMap<TopicId, TopicId>,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        let mut sigs: BTreeMap<u64, NameId> = BTreeMap::new();
        for name in self.names(t)? {
            sigs.insert(signature::name_signature(self, name)?, name);
        }
        for name in source.names(s)? {
            let c = ConstructId::Name(name);
            let typ = map_topic(mapping, source.type_of(c)?)?;
            let source_value = source.value(c)?;
            let value = self.pool().string(source_value.value());
            let themes = self.map_themes(&source.scope(c)?, mapping)?;
            let sig = signature::name_parts(
                self.topic_serial(typ)?,
                &self.topic_serials(&themes),
                value.serial(),
            );
            let target_name = match sigs.get(&sig).copied() {
                Some(existing) => existing,
                None => {
                    let created = self.create_typed_name(t, typ, source_value.value(), &themes)?;
                    sigs.insert(sig, created);
                    created
                }
            };
            for iri in source.item_identifiers(c)? {
                self.add_item_identifier(ConstructId::Name(target_name), iri)?;
            }
            if let Some(reifier) = source.reifier(c)? {
                let reifier = map_topic(mapping, reifier)?;
                self.assign_reifier(ConstructId::Name(target_name), reifier, queue)?;
            }
            self.copy_variants(source, name, target_name, mapping, queue)?;
        }
        Ok(())
    }

    fn copy_variants(
        &mut self,
        source: &TopicMap,
        source_name: NameId,
        target_name: NameId,
        mapping: &BTreeMap<TopicId, TopicId>,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        let mut sigs: BTreeMap<u64, VariantId> = BTreeMap::new();
        for variant in self.variants(target_name)? {
            sigs.insert(signature::variant_signature(self, variant)?, variant);
        }
        for variant in source.variants(source_name)? {
            let c = ConstructId::Variant(variant);
            let source_value = source.value(c)?;
            let value = self
                .pool()
                .literal(source_value.value(), source_value.datatype());
            let themes = self.map_themes(&source.scope(c)?, mapping)?;
            let sig = signature::variant_parts(&self.topic_serials(&themes), value.serial());
            let target_variant = match sigs.get(&sig).copied() {
                Some(existing) => existing,
                None => {
                    let created = self.create_variant(target_name, value, &themes)?;
                    sigs.insert(sig, created);
                    created
                }
            };
            for iri in source.item_identifiers(c)? {
                self.add_item_identifier(ConstructId::Variant(target_variant), iri)?;
            }
            if let Some(reifier) = source.reifier(c)? {
                let reifier = map_topic(mapping, reifier)?;
                self.assign_reifier(ConstructId::Variant(target_variant), reifier, queue)?;
            }
        }
        Ok(())
    }

    fn copy_associations(
        &mut self,
        source: &TopicMap,
        mapping: &BTreeMap<TopicId, TopicId>,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        let mut sigs: BTreeMap<u64, AssociationId> = BTreeMap::new();
        for association in self.associations() {
            sigs.insert(
                signature::association_signature(self, association)?,
                association,
            );
        }
        for association in source.associations() {
            let c = ConstructId::Association(association);
            let typ = map_topic(mapping, source.type_of(c)?)?;
            let themes = self.map_themes(&source.scope(c)?, mapping)?;
            let mut mapped_roles: Vec<(TopicId, TopicId, RoleId)> = Vec::new();
            for role in source.roles(association)? {
                mapped_roles.push((
                    map_topic(mapping, source.type_of(ConstructId::Role(role))?)?,
                    map_topic(mapping, source.player(role)?)?,
                    role,
                ));
            }
            let mut role_sigs = Vec::with_capacity(mapped_roles.len());
            for (role_type, player, _) in &mapped_roles {
                role_sigs.push(signature::role_parts(
                    self.topic_serial(*role_type)?,
                    self.topic_serial(*player)?,
                ));
            }
            let sig = signature::association_parts(
                self.topic_serial(typ)?,
                &self.topic_serials(&themes),
                role_sigs.clone(),
            );
            match sigs.get(&sig).copied() {
                Some(existing) => {
                    // Fold into the structurally identical association.
                    for iri in source.item_identifiers(c)? {
                        self.add_item_identifier(ConstructId::Association(existing), iri)?;
                    }
                    if let Some(reifier) = source.reifier(c)? {
                        let reifier = map_topic(mapping, reifier)?;
                        self.assign_reifier(ConstructId::Association(existing), reifier, queue)?;
                    }
                    let mut survivor_roles: Vec<(u64, RoleId)> = Vec::new();
                    for role in self.roles(existing)? {
                        survivor_roles.push((signature::role_signature(self, role)?, role));
                    }
                    for (index, (_, _, source_role)) in mapped_roles.iter().enumerate() {
                        let role_sig = role_sigs[index];
                        if let Some(pos) =
                            survivor_roles.iter().position(|(s, _)| *s == role_sig)
                        {
                            let (_, counterpart) = survivor_roles.remove(pos);
                            for iri in
                                source.item_identifiers(ConstructId::Role(*source_role))?
                            {
                                self.add_item_identifier(ConstructId::Role(counterpart), iri)?;
                            }
                            if let Some(reifier) =
                                source.reifier(ConstructId::Role(*source_role))?
                            {
                                let reifier = map_topic(mapping, reifier)?;
                                self.assign_reifier(
                                    ConstructId::Role(counterpart),
                                    reifier,
                                    queue,
                                )?;
                            }
                        }
                    }
                }
                None => {
                    let created = self.create_association(typ, &themes)?;
                    for iri in source.item_identifiers(c)? {
                        self.add_item_identifier(ConstructId::Association(created), iri)?;
                    }
                    if let Some(reifier) = source.reifier(c)? {
                        let reifier = map_topic(mapping, reifier)?;
                        self.assign_reifier(ConstructId::Association(created), reifier, queue)?;
                    }
                    for (role_type, player, source_role) in &mapped_roles {
                        let new_role = self.create_role(created, *role_type, *player)?;
                        for iri in source.item_identifiers(ConstructId::Role(*source_role))? {
                            self.add_item_identifier(ConstructId::Role(new_role), iri)?;
                        }
                        if let Some(reifier) = source.reifier(ConstructId::Role(*source_role))? {
                            let reifier = map_topic(mapping, reifier)?;
                            self.assign_reifier(ConstructId::Role(new_role), reifier, queue)?;
                        }
                    }
                    sigs.insert(sig, created);
                }
            }
        }
        Ok(())
    }

    fn map_themes(
        &self,
        themes: &[TopicId],
        mapping: &BTreeMap<TopicId, TopicId>,
    ) -> Result<Vec<TopicId>, ModelError> {
        let mut mapped: Vec<TopicId> = themes
            .iter()
            .map(|theme| map_topic(mapping, *theme))
            .collect::<Result<_, _>>()?;
        // Target-side merges can collapse two source themes into one topic;
        // the signature parts must see the set the scope table will intern.
        mapped.sort_unstable();
        mapped.dedup();
        Ok(mapped)
    }

    fn topic_serial(&self, topic: TopicId) -> Result<u64, ModelError> {
        Ok(self.require_topic(topic)?.serial)
    }

    fn topic_serials(&self, topics: &[TopicId]) -> Vec<u64> {
        let mut serials: Vec<u64> = topics
            .iter()
            .filter_map(|topic| self.store.topics.get(topic).map(|d| d.serial))
            .collect();
        serials.sort_unstable();
        serials
    }

    // ------------------------------------------------------------------
    // Duplicate removal
    // ------------------------------------------------------------------

    fn dedup_topic_inner(
        &mut self,
        topic: TopicId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        let mut occurrence_sigs: BTreeMap<u64, OccurrenceId> = BTreeMap::new();
        for occurrence in self.occurrences(topic)? {
            let sig = signature::occurrence_signature(self, occurrence)?;
            match occurrence_sigs.get(&sig).copied() {
                Some(survivor) => self.absorb_occurrence(occurrence, survivor, queue)?,
                None => {
                    occurrence_sigs.insert(sig, occurrence);
                }
            }
        }
        let mut name_sigs: BTreeMap<u64, NameId> = BTreeMap::new();
        for name in self.names(topic)? {
            let sig = signature::name_signature(self, name)?;
            match name_sigs.get(&sig).copied() {
                Some(survivor) => self.absorb_name(name, survivor, queue)?,
                None => {
                    name_sigs.insert(sig, name);
                    self.dedup_name_inner(name, queue)?;
                }
            }
        }
        Ok(())
    }

    fn dedup_name_inner(
        &mut self,
        name: NameId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        let mut sigs: BTreeMap<u64, VariantId> = BTreeMap::new();
        for variant in self.variants(name)? {
            let sig = signature::variant_signature(self, variant)?;
            match sigs.get(&sig).copied() {
                Some(survivor) => self.absorb_variant(variant, survivor, queue)?,
                None => {
                    sigs.insert(sig, variant);
                }
            }
        }
        Ok(())
    }

    fn dedup_roles_inner(
        &mut self,
        association: AssociationId,
        queue: &mut MergeQueue,
    ) -> Result<(), ModelError> {
        let mut sigs: BTreeMap<u64, RoleId> = BTreeMap::new();
        for role in self.roles(association)? {
            let sig = signature::role_signature(self, role)?;
            match sigs.get(&sig).copied() {
                Some(survivor) => {
                    self.move_item_identifiers(
                        ConstructId::Role(role),
                        ConstructId::Role(survivor),
                    )?;
                    self.fold_reifier(
                        ConstructId::Role(role),
                        ConstructId::Role(survivor),
                        queue,
                    )?;
                    self.remove_role(role)?;
                }
                None => {
                    sigs.insert(sig, role);
                }
            }
        }
        Ok(())
    }

    fn dedup_associations_inner(&mut self, queue: &mut MergeQueue) -> Result<(), ModelError> {
        for association in self.associations() {
            self.dedup_roles_inner(association, queue)?;
        }
        let mut sigs: BTreeMap<u64, AssociationId> = BTreeMap::new();
        for association in self.associations() {
            if !self.store.associations.contains_key(&association) {
                continue;
            }
            let sig = signature::association_signature(self, association)?;
            match sigs.get(&sig).copied() {
                Some(survivor) => self.merge_association_pair(association, survivor, queue)?,
                None => {
                    sigs.insert(sig, association);
                }
            }
        }
        Ok(())
    }
}
