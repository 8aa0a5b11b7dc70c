//! Interned theme sets (scopes).
//!
//! A scope is the set of theme topics that limits the validity context of an
//! association, occurrence, name, or variant. Scopes are interned per map:
//! themes are map-local topic handles, so the table lives inside the owning
//! [`crate::TopicMap`] rather than in the process-shared pool. Scope equality
//! is a single [`ScopeId`] comparison.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::handles::TopicId;

/// Handle of an interned theme set, local to one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
    /// The empty scope (the unconstrained validity context).
    pub const UNCONSTRAINED: ScopeId = ScopeId(0);

    /// Whether this is the empty scope.
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::UNCONSTRAINED
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Map-local interning table for theme sets.
///
/// Theme lists are stored sorted and duplicate-free; interning the same set
/// of themes in any order yields the same [`ScopeId`].
#[derive(Debug)]
pub(crate) struct ScopeTable {
    scopes: Vec<Vec<TopicId>>,
    by_themes: BTreeMap<Vec<TopicId>, ScopeId>,
}

impl ScopeTable {
    pub(crate) fn new() -> Self {
        let mut by_themes = BTreeMap::new();
        by_themes.insert(Vec::new(), ScopeId::UNCONSTRAINED);
        Self {
            scopes: vec![Vec::new()],
            by_themes,
        }
    }

    /// Intern a theme set (sorted and deduplicated internally).
    pub(crate) fn intern(&mut self, themes: &[TopicId]) -> ScopeId {
        let mut sorted: Vec<TopicId> = themes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if let Some(id) = self.by_themes.get(&sorted) {
            return *id;
        }
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(sorted.clone());
        self.by_themes.insert(sorted, id);
        id
    }

    pub(crate) fn themes(&self, id: ScopeId) -> &[TopicId] {
        &self.scopes[id.0 as usize]
    }

    pub(crate) fn contains(&self, id: ScopeId, theme: TopicId) -> bool {
        self.themes(id).binary_search(&theme).is_ok()
    }

    pub(crate) fn with_theme(&mut self, id: ScopeId, theme: TopicId) -> ScopeId {
        let mut themes = self.themes(id).to_vec();
        themes.push(theme);
        self.intern(&themes)
    }

    pub(crate) fn without_theme(&mut self, id: ScopeId, theme: TopicId) -> ScopeId {
        let themes: Vec<TopicId> = self
            .themes(id)
            .iter()
            .copied()
            .filter(|t| *t != theme)
            .collect();
        self.intern(&themes)
    }

    pub(crate) fn replace_theme(&mut self, id: ScopeId, old: TopicId, new: TopicId) -> ScopeId {
        let themes: Vec<TopicId> = self
            .themes(id)
            .iter()
            .map(|t| if *t == old { new } else { *t })
            .collect();
        self.intern(&themes)
    }

    /// Whether every theme of `narrow` is a theme of `wide`.
    pub(crate) fn is_superset(&self, wide: ScopeId, narrow: ScopeId) -> bool {
        if wide == narrow {
            return true;
        }
        let wide_themes = self.themes(wide);
        self.themes(narrow)
            .iter()
            .all(|t| wide_themes.binary_search(t).is_ok())
    }

    /// Superset with at least one extra theme.
    pub(crate) fn is_proper_superset(&self, wide: ScopeId, narrow: ScopeId) -> bool {
        wide != narrow && self.is_superset(wide, narrow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_order_independent() {
        let mut table = ScopeTable::new();
        let a = table.intern(&[TopicId(2), TopicId(1)]);
        let b = table.intern(&[TopicId(1), TopicId(2), TopicId(2)]);
        assert_eq!(a, b);
        assert_eq!(table.themes(a), &[TopicId(1), TopicId(2)]);
    }

    #[test]
    fn empty_scope_is_unconstrained() {
        let mut table = ScopeTable::new();
        assert_eq!(table.intern(&[]), ScopeId::UNCONSTRAINED);
        assert!(ScopeId::UNCONSTRAINED.is_unconstrained());
    }

    #[test]
    fn theme_add_remove_round_trip() {
        let mut table = ScopeTable::new();
        let base = table.intern(&[TopicId(1)]);
        let wide = table.with_theme(base, TopicId(3));
        assert!(table.contains(wide, TopicId(3)));
        assert_eq!(table.without_theme(wide, TopicId(3)), base);
    }

    #[test]
    fn replace_theme_merges_when_target_present() {
        let mut table = ScopeTable::new();
        let s = table.intern(&[TopicId(1), TopicId(2)]);
        let replaced = table.replace_theme(s, TopicId(1), TopicId(2));
        assert_eq!(table.themes(replaced), &[TopicId(2)]);
    }

    #[test]
    fn proper_superset_requires_an_extra_theme() {
        let mut table = ScopeTable::new();
        let narrow = table.intern(&[TopicId(1)]);
        let wide = table.intern(&[TopicId(1), TopicId(2)]);
        assert!(table.is_proper_superset(wide, narrow));
        assert!(!table.is_proper_superset(narrow, narrow));
        assert!(!table.is_proper_superset(narrow, wide));
        assert!(table.is_proper_superset(narrow, ScopeId::UNCONSTRAINED));
    }
}
