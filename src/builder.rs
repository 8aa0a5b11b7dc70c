//! Streaming construction protocol for format readers.
//!
//! A [`GraphBuilder`] wraps a map and exposes the begin/end surface a
//! deserializer drives: open a topic or association, attach identifiers and
//! characteristics to "the current construct", close it, move on. The
//! builder is the collaborator the strict identity index expects: it checks
//! every identity *before* assignment and, on collision with an existing
//! topic, merges the in-progress topic into the existing one instead of
//! letting the index reject the add.
//!
//! Variants are staged until their `end_variant`, because a variant's scope
//! must properly extend its name's scope and the protocol delivers themes
//! only after the variant opens.
//!
//! ```
//! use topicmap_engine::{GraphBuilder, TopicMap};
//!
//! let mut map = TopicMap::new();
//! let mut builder = GraphBuilder::new(&mut map);
//! builder.start_topic_by_subject_identifier("http://ex/a").unwrap();
//! builder.start_name("Thing").unwrap();
//! builder.end_name().unwrap();
//! builder.end_topic().unwrap();
//! let stats = builder.finish().unwrap();
//! assert_eq!(stats.topics, 1);
//! ```

use serde::Serialize;

use crate::error::ModelError;
use crate::map::TopicMap;
use crate::types::{AssociationId, ConstructId, Iri, Literal, NameId, TopicId, VariantId};

/// Errors raised by the streaming builder.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    /// The protocol was driven out of order (wrong or missing current
    /// construct, unbalanced begin/end).
    #[error("builder state error: {0}")]
    State(String),
    /// An underlying graph mutation failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Counts of what a build created, plus the merges it performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Topics created (reused topics are not counted).
    pub topics: usize,
    /// Associations created.
    pub associations: usize,
    /// Roles created.
    pub roles: usize,
    /// Occurrences created.
    pub occurrences: usize,
    /// Names created.
    pub names: usize,
    /// Variants created.
    pub variants: usize,
    /// Identity collisions resolved by merging during the build.
    pub merges: usize,
}

/// A variant staged until its scope is complete.
#[derive(Debug)]
struct PendingVariant {
    name: NameId,
    value: Literal,
    themes: Vec<TopicId>,
    item_identifiers: Vec<Iri>,
    reifier: Option<TopicId>,
}

#[derive(Debug)]
enum Open {
    Construct(ConstructId),
    Variant(PendingVariant),
}

/// Stack-machine builder over a [`TopicMap`].
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    map: &'a mut TopicMap,
    stack: Vec<Open>,
    stats: BuildStats,
}

impl<'a> GraphBuilder<'a> {
    /// Start building into `map`.
    pub fn new(map: &'a mut TopicMap) -> Self {
        Self {
            map,
            stack: Vec::new(),
            stats: BuildStats::default(),
        }
    }

    /// The map under construction.
    pub fn map(&self) -> &TopicMap {
        self.map
    }

    /// Open an anonymous topic.
    pub fn start_topic(&mut self) -> Result<TopicId, BuilderError> {
        self.require_top_level("topic")?;
        let t = self.map.create_topic()?;
        self.stats.topics += 1;
        self.stack.push(Open::Construct(ConstructId::Topic(t)));
        Ok(t)
    }

    /// Open the topic with the given subject identifier, creating it if
    /// needed.
    pub fn start_topic_by_subject_identifier(
        &mut self,
        iri: &str,
    ) -> Result<TopicId, BuilderError> {
        self.require_top_level("topic")?;
        let iri = self.map.pool().iri(iri)?;
        let existed = self.resolve_topic_identity(&iri).is_some();
        let t = self.map.create_topic_by_subject_identifier(&iri)?;
        if !existed {
            self.stats.topics += 1;
        }
        self.stack.push(Open::Construct(ConstructId::Topic(t)));
        Ok(t)
    }

    /// Open the topic with the given item identifier, creating it if needed.
    pub fn start_topic_by_item_identifier(&mut self, iri: &str) -> Result<TopicId, BuilderError> {
        self.require_top_level("topic")?;
        let iri = self.map.pool().iri(iri)?;
        let existed = self.resolve_topic_identity(&iri).is_some();
        let t = self.map.create_topic_by_item_identifier(&iri)?;
        if !existed {
            self.stats.topics += 1;
        }
        self.stack.push(Open::Construct(ConstructId::Topic(t)));
        Ok(t)
    }

    /// Open the topic with the given subject locator, creating it if needed.
    pub fn start_topic_by_subject_locator(&mut self, iri: &str) -> Result<TopicId, BuilderError> {
        self.require_top_level("topic")?;
        let iri = self.map.pool().iri(iri)?;
        let existed = self.map.topic_by_subject_locator(&iri).is_some();
        let t = self.map.create_topic_by_subject_locator(&iri)?;
        if !existed {
            self.stats.topics += 1;
        }
        self.stack.push(Open::Construct(ConstructId::Topic(t)));
        Ok(t)
    }

    /// Add a subject identifier to the current topic, merging into an
    /// existing topic when the identifier is already taken.
    pub fn add_subject_identifier(&mut self, iri: &str) -> Result<(), BuilderError> {
        let iri = self.map.pool().iri(iri)?;
        let current = self.current_topic()?;
        match self.resolve_topic_identity(&iri) {
            Some(existing) if existing != current => {
                self.merge_open_topic(current, existing)?;
                self.map.add_subject_identifier(existing, iri)?;
            }
            _ => self.map.add_subject_identifier(current, iri)?,
        }
        Ok(())
    }

    /// Add a subject locator to the current topic, merging on collision.
    pub fn add_subject_locator(&mut self, iri: &str) -> Result<(), BuilderError> {
        let iri = self.map.pool().iri(iri)?;
        let current = self.current_topic()?;
        match self.map.topic_by_subject_locator(&iri) {
            Some(existing) if existing != current => {
                self.merge_open_topic(current, existing)?;
                self.map.add_subject_locator(existing, iri)?;
            }
            _ => self.map.add_subject_locator(current, iri)?,
        }
        Ok(())
    }

    /// Add an item identifier to the current construct. For topics this
    /// merges on collision with another topic; for other constructs a
    /// collision surfaces as an identity-constraint error.
    pub fn add_item_identifier(&mut self, iri: &str) -> Result<(), BuilderError> {
        let iri = self.map.pool().iri(iri)?;
        match self.current_mut()? {
            Open::Variant(pending) => {
                pending.item_identifiers.push(iri);
                Ok(())
            }
            Open::Construct(ConstructId::Topic(current)) => {
                let current = *current;
                match self.resolve_topic_identity(&iri) {
                    Some(existing) if existing != current => {
                        self.merge_open_topic(current, existing)?;
                        self.map
                            .add_item_identifier(ConstructId::Topic(existing), iri)?;
                    }
                    _ => self
                        .map
                        .add_item_identifier(ConstructId::Topic(current), iri)?,
                }
                Ok(())
            }
            Open::Construct(construct) => {
                let construct = *construct;
                self.map.add_item_identifier(construct, iri)?;
                Ok(())
            }
        }
    }

    /// Open an association of the given type.
    pub fn start_association(&mut self, typ: TopicId) -> Result<AssociationId, BuilderError> {
        self.require_top_level("association")?;
        let a = self.map.create_association(typ, &[])?;
        self.stats.associations += 1;
        self.stack
            .push(Open::Construct(ConstructId::Association(a)));
        Ok(a)
    }

    /// Create a role on the current association.
    pub fn add_role(&mut self, typ: TopicId, player: TopicId) -> Result<(), BuilderError> {
        let association = match self.current_mut()? {
            Open::Construct(ConstructId::Association(a)) => *a,
            other => {
                return Err(BuilderError::State(format!(
                    "role requires an open association, current is {:?}",
                    other
                )))
            }
        };
        self.map.create_role(association, typ, player)?;
        self.stats.roles += 1;
        Ok(())
    }

    /// Open an occurrence on the current topic.
    pub fn start_occurrence(
        &mut self,
        typ: TopicId,
        value: Literal,
    ) -> Result<(), BuilderError> {
        let topic = self.current_topic()?;
        let o = self.map.create_occurrence(topic, typ, value, &[])?;
        self.stats.occurrences += 1;
        self.stack
            .push(Open::Construct(ConstructId::Occurrence(o)));
        Ok(())
    }

    /// Open a name with the default name type on the current topic.
    pub fn start_name(&mut self, value: &str) -> Result<(), BuilderError> {
        let topic = self.current_topic()?;
        let n = self.map.create_name(topic, value, &[])?;
        self.stats.names += 1;
        self.stack.push(Open::Construct(ConstructId::Name(n)));
        Ok(())
    }

    /// Open a name with an explicit type on the current topic.
    pub fn start_typed_name(&mut self, typ: TopicId, value: &str) -> Result<(), BuilderError> {
        let topic = self.current_topic()?;
        let n = self.map.create_typed_name(topic, typ, value, &[])?;
        self.stats.names += 1;
        self.stack.push(Open::Construct(ConstructId::Name(n)));
        Ok(())
    }

    /// Open a variant on the current name. The variant is created when it is
    /// closed, once its themes are known.
    pub fn start_variant(&mut self, value: Literal) -> Result<(), BuilderError> {
        let name = match self.current_mut()? {
            Open::Construct(ConstructId::Name(n)) => *n,
            other => {
                return Err(BuilderError::State(format!(
                    "variant requires an open name, current is {:?}",
                    other
                )))
            }
        };
        self.stack.push(Open::Variant(PendingVariant {
            name,
            value,
            themes: Vec::new(),
            item_identifiers: Vec::new(),
            reifier: None,
        }));
        Ok(())
    }

    /// Add a theme to the current scoped construct.
    pub fn add_theme(&mut self, theme: TopicId) -> Result<(), BuilderError> {
        match self.current_mut()? {
            Open::Variant(pending) => {
                pending.themes.push(theme);
                Ok(())
            }
            Open::Construct(construct) => {
                let construct = *construct;
                self.map.add_theme(construct, theme)?;
                Ok(())
            }
        }
    }

    /// Set the reifier of the current construct.
    pub fn set_reifier(&mut self, reifier: TopicId) -> Result<(), BuilderError> {
        match self.current_mut()? {
            Open::Variant(pending) => {
                pending.reifier = Some(reifier);
                Ok(())
            }
            Open::Construct(construct) => {
                let construct = *construct;
                self.map.set_reifier(construct, Some(reifier))?;
                Ok(())
            }
        }
    }

    /// Close the current topic.
    pub fn end_topic(&mut self) -> Result<TopicId, BuilderError> {
        match self.pop("topic")? {
            Open::Construct(ConstructId::Topic(t)) => Ok(t),
            other => Err(Self::unbalanced("topic", &other)),
        }
    }

    /// Close the current association.
    pub fn end_association(&mut self) -> Result<AssociationId, BuilderError> {
        match self.pop("association")? {
            Open::Construct(ConstructId::Association(a)) => Ok(a),
            other => Err(Self::unbalanced("association", &other)),
        }
    }

    /// Close the current occurrence.
    pub fn end_occurrence(&mut self) -> Result<(), BuilderError> {
        match self.pop("occurrence")? {
            Open::Construct(ConstructId::Occurrence(_)) => Ok(()),
            other => Err(Self::unbalanced("occurrence", &other)),
        }
    }

    /// Close the current name.
    pub fn end_name(&mut self) -> Result<(), BuilderError> {
        match self.pop("name")? {
            Open::Construct(ConstructId::Name(_)) => Ok(()),
            other => Err(Self::unbalanced("name", &other)),
        }
    }

    /// Close the current variant, creating it with the accumulated themes.
    pub fn end_variant(&mut self) -> Result<VariantId, BuilderError> {
        match self.pop("variant")? {
            Open::Variant(pending) => {
                let v = self
                    .map
                    .create_variant(pending.name, pending.value, &pending.themes)?;
                for iri in pending.item_identifiers {
                    self.map.add_item_identifier(ConstructId::Variant(v), iri)?;
                }
                if let Some(reifier) = pending.reifier {
                    self.map
                        .set_reifier(ConstructId::Variant(v), Some(reifier))?;
                }
                self.stats.variants += 1;
                Ok(v)
            }
            other => Err(Self::unbalanced("variant", &other)),
        }
    }

    /// Finish the build: the stack must be balanced. Runs a duplicate-removal
    /// pass over the map and returns the build statistics.
    pub fn finish(self) -> Result<BuildStats, BuilderError> {
        if !self.stack.is_empty() {
            return Err(BuilderError::State(format!(
                "{} construct(s) left open at finish",
                self.stack.len()
            )));
        }
        self.map.remove_duplicates()?;
        tracing::debug!(stats = ?self.stats, "build finished");
        Ok(self.stats)
    }

    fn resolve_topic_identity(&self, iri: &Iri) -> Option<TopicId> {
        self.map.topic_by_subject_identifier(iri).or_else(|| {
            self.map
                .construct_by_item_identifier(iri)
                .and_then(|c| c.as_topic())
        })
    }

    /// Merge the open topic into an existing owner of a colliding identity,
    /// rewriting stack references to the merged-away handle.
    fn merge_open_topic(
        &mut self,
        current: TopicId,
        existing: TopicId,
    ) -> Result<(), BuilderError> {
        tracing::debug!(%current, %existing, "identity collision during build; merging");
        self.map.merge_topics(current, existing)?;
        self.stats.merges += 1;
        if self.stats.topics > 0 {
            self.stats.topics -= 1;
        }
        for open in &mut self.stack {
            if let Open::Construct(ConstructId::Topic(t)) = open {
                if *t == current {
                    *open = Open::Construct(ConstructId::Topic(existing));
                }
            }
        }
        Ok(())
    }

    fn current_topic(&mut self) -> Result<TopicId, BuilderError> {
        match self.current_mut()? {
            Open::Construct(ConstructId::Topic(t)) => Ok(*t),
            other => Err(BuilderError::State(format!(
                "operation requires an open topic, current is {:?}",
                other
            ))),
        }
    }

    fn current_mut(&mut self) -> Result<&mut Open, BuilderError> {
        self.stack
            .last_mut()
            .ok_or_else(|| BuilderError::State("no open construct".to_string()))
    }

    fn require_top_level(&self, kind: &str) -> Result<(), BuilderError> {
        if self.stack.is_empty() {
            Ok(())
        } else {
            Err(BuilderError::State(format!(
                "{} must be opened at the top level",
                kind
            )))
        }
    }

    fn pop(&mut self, kind: &str) -> Result<Open, BuilderError> {
        self.stack
            .pop()
            .ok_or_else(|| BuilderError::State(format!("no open {} to close", kind)))
    }

    fn unbalanced(expected: &str, found: &Open) -> BuilderError {
        BuilderError::State(format!(
            "unbalanced protocol: expected open {}, found {:?}",
            expected, found
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_topic_with_characteristics() {
        let mut map = TopicMap::new();
        let mut builder = GraphBuilder::new(&mut map);
        // Types are resolved outside the begin/end nesting.
        builder
            .start_topic_by_subject_identifier("http://ex/note")
            .unwrap();
        let typ = builder.end_topic().unwrap();
        builder
            .start_topic_by_subject_identifier("http://ex/thing")
            .unwrap();
        let value = builder.map().pool().string("hello");
        builder.start_occurrence(typ, value).unwrap();
        builder.add_item_identifier("http://ex/thing/occ-1").unwrap();
        builder.end_occurrence().unwrap();
        builder.start_name("Thing").unwrap();
        builder.end_name().unwrap();
        builder.end_topic().unwrap();
        let stats = builder.finish().unwrap();

        assert_eq!(stats.occurrences, 1);
        assert_eq!(stats.names, 1);
        assert_eq!(stats.merges, 0);
        let t = map.topic_by_subject_identifier(&map.pool().iri("http://ex/thing").unwrap());
        assert!(t.is_some());
    }

    #[test]
    fn colliding_subject_identifiers_merge_during_build() {
        let mut map = TopicMap::new();
        let mut builder = GraphBuilder::new(&mut map);

        builder
            .start_topic_by_subject_identifier("http://ex/a")
            .unwrap();
        builder.start_name("First").unwrap();
        builder.end_name().unwrap();
        builder.end_topic().unwrap();

        // A second source block for the same subject under a different
        // primary identity.
        builder.start_topic().unwrap();
        builder.start_name("Second").unwrap();
        builder.end_name().unwrap();
        builder.add_subject_identifier("http://ex/a").unwrap();
        let survivor = builder.end_topic().unwrap();
        let stats = builder.finish().unwrap();

        assert_eq!(stats.merges, 1);
        assert_eq!(stats.topics, 1);
        assert_eq!(map.names(survivor).unwrap().len(), 2);
        assert_eq!(map.stats().topics, 2); // subject + default name type
    }

    #[test]
    fn finish_deduplicates_what_the_sources_repeated() {
        let mut map = TopicMap::new();
        let mut builder = GraphBuilder::new(&mut map);
        builder
            .start_topic_by_subject_identifier("http://ex/note")
            .unwrap();
        let typ = builder.end_topic().unwrap();

        for _ in 0..2 {
            builder
                .start_topic_by_subject_identifier("http://ex/thing")
                .unwrap();
            let value = builder.map().pool().string("same");
            builder.start_occurrence(typ, value).unwrap();
            builder.end_occurrence().unwrap();
            builder.end_topic().unwrap();
        }
        builder.finish().unwrap();

        let t = map
            .topic_by_subject_identifier(&map.pool().iri("http://ex/thing").unwrap())
            .unwrap();
        assert_eq!(map.occurrences(t).unwrap().len(), 1);
    }

    #[test]
    fn variant_scope_accumulates_before_creation() {
        let mut map = TopicMap::new();
        let mut builder = GraphBuilder::new(&mut map);
        builder
            .start_topic_by_subject_identifier("http://ex/display")
            .unwrap();
        let theme = builder.end_topic().unwrap();

        builder
            .start_topic_by_subject_identifier("http://ex/thing")
            .unwrap();
        builder.start_name("Thing").unwrap();
        let value = builder.map().pool().string("THING");
        builder.start_variant(value).unwrap();
        builder.add_theme(theme).unwrap();
        let v = builder.end_variant().unwrap();
        builder.end_name().unwrap();
        builder.end_topic().unwrap();
        let stats = builder.finish().unwrap();

        assert_eq!(stats.variants, 1);
        assert_eq!(map.scope(ConstructId::Variant(v)).unwrap(), vec![theme]);
    }

    #[test]
    fn association_roles_through_the_builder() {
        let mut map = TopicMap::new();
        let mut builder = GraphBuilder::new(&mut map);
        builder
            .start_topic_by_subject_identifier("http://ex/rel")
            .unwrap();
        let rel = builder.end_topic().unwrap();
        builder
            .start_topic_by_subject_identifier("http://ex/part")
            .unwrap();
        let part = builder.end_topic().unwrap();
        builder
            .start_topic_by_subject_identifier("http://ex/x")
            .unwrap();
        let x = builder.end_topic().unwrap();

        builder.start_association(rel).unwrap();
        builder.add_role(part, x).unwrap();
        builder.end_association().unwrap();
        let stats = builder.finish().unwrap();

        assert_eq!(stats.associations, 1);
        assert_eq!(stats.roles, 1);
        assert_eq!(map.roles_played(x).unwrap().len(), 1);
    }

    #[test]
    fn unbalanced_protocol_is_rejected() {
        let mut map = TopicMap::new();
        let mut builder = GraphBuilder::new(&mut map);
        builder.start_topic().unwrap();
        assert!(matches!(
            builder.start_topic().unwrap_err(),
            BuilderError::State(_)
        ));
        assert!(matches!(
            builder.end_name().unwrap_err(),
            BuilderError::State(_)
        ));
        drop(builder);
        let mut builder = GraphBuilder::new(&mut map);
        builder.start_topic().unwrap();
        assert!(matches!(builder.finish(), Err(BuilderError::State(_))));
    }
}
