//! Scope secondary index.
//!
//! Tracks, per theme topic, the scoped constructs carrying it. Consumed by
//! the merge engine ("replace `source` as a scope theme everywhere") and by
//! the topic-removal in-use check.

use std::collections::{BTreeMap, BTreeSet};

use crate::events::Event;
use crate::map::Store;
use crate::types::{ConstructId, ScopeId, TopicId};

/// Reverse index from theme topics to the constructs scoped by them.
#[derive(Debug, Default)]
pub struct ScopeIndex {
    by_theme: BTreeMap<TopicId, BTreeSet<ConstructId>>,
}

impl ScopeIndex {
    /// Scoped constructs carrying `theme`, in handle order.
    pub fn scoped_by_theme(&self, theme: TopicId) -> Vec<ConstructId> {
        self.by_theme
            .get(&theme)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether any scope in the map carries `topic` as a theme.
    pub fn is_used_as_theme(&self, topic: TopicId) -> bool {
        self.by_theme.contains_key(&topic)
    }

    pub(crate) fn apply(&mut self, store: &Store, event: &Event) {
        match event {
            Event::ThemeAdded { construct, theme } => {
                self.insert(*theme, *construct);
            }
            Event::ThemeRemoved { construct, theme } => {
                self.remove(*theme, *construct);
            }
            Event::AssociationAdded(a) => {
                if let Some(data) = store.associations.get(a) {
                    self.insert_scope(store, data.scope, ConstructId::Association(*a));
                }
            }
            Event::AssociationRemoved(a) => {
                if let Some(data) = store.associations.get(a) {
                    self.remove_scope(store, data.scope, ConstructId::Association(*a));
                }
            }
            Event::OccurrenceAdded(o) => {
                if let Some(data) = store.occurrences.get(o) {
                    self.insert_scope(store, data.scope, ConstructId::Occurrence(*o));
                }
            }
            Event::OccurrenceRemoved(o) => {
                if let Some(data) = store.occurrences.get(o) {
                    self.remove_scope(store, data.scope, ConstructId::Occurrence(*o));
                }
            }
            Event::NameAdded(n) => {
                if let Some(data) = store.names.get(n) {
                    self.insert_scope(store, data.scope, ConstructId::Name(*n));
                }
            }
            Event::NameRemoved(n) => {
                if let Some(data) = store.names.get(n) {
                    self.remove_scope(store, data.scope, ConstructId::Name(*n));
                }
            }
            Event::VariantAdded(v) => {
                if let Some(data) = store.variants.get(v) {
                    self.insert_scope(store, data.scope, ConstructId::Variant(*v));
                }
            }
            Event::VariantRemoved(v) => {
                if let Some(data) = store.variants.get(v) {
                    self.remove_scope(store, data.scope, ConstructId::Variant(*v));
                }
            }
            _ => {}
        }
    }

    fn insert_scope(&mut self, store: &Store, scope: ScopeId, construct: ConstructId) {
        for theme in store.scopes.themes(scope) {
            self.insert(*theme, construct);
        }
    }

    fn remove_scope(&mut self, store: &Store, scope: ScopeId, construct: ConstructId) {
        for theme in store.scopes.themes(scope) {
            self.remove(*theme, construct);
        }
    }

    fn insert(&mut self, theme: TopicId, construct: ConstructId) {
        self.by_theme.entry(theme).or_default().insert(construct);
    }

    fn remove(&mut self, theme: TopicId, construct: ConstructId) {
        if let Some(set) = self.by_theme.get_mut(&theme) {
            set.remove(&construct);
            if set.is_empty() {
                self.by_theme.remove(&theme);
            }
        }
    }
}
