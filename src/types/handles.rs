//! Integer handles for the seven construct kinds.
//!
//! Constructs are arena-allocated and addressed by small integer handles that
//! are local to one [`crate::TopicMap`]. Equality and hashing are plain
//! integer operations; handles implement `Ord` so they can key the
//! `BTreeMap`-backed arenas and indexes deterministically.
//!
//! A handle says nothing about liveness: after a merge or removal the handle
//! of the consumed construct is stale, and map operations on it return
//! [`crate::ModelError::UnknownConstruct`].

use serde::Serialize;
use std::fmt;

/// Handle of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TopicId(pub(crate) u32);

/// Handle of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AssociationId(pub(crate) u32);

/// Handle of an association role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoleId(pub(crate) u32);

/// Handle of an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OccurrenceId(pub(crate) u32);

/// Handle of a topic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NameId(pub(crate) u32);

/// Handle of a name variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VariantId(pub(crate) u32);

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "topic#{}", self.0)
    }
}

impl fmt::Display for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "association#{}", self.0)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "role#{}", self.0)
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "occurrence#{}", self.0)
    }
}

impl fmt::Display for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name#{}", self.0)
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variant#{}", self.0)
    }
}

/// Closed union over every construct kind in a map.
///
/// Replaces capability probing ("is this construct typed? scoped?
/// reifiable?") with pattern matching: each variant carries the typed handle
/// of its kind, and operations that only apply to some kinds reject the
/// others explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ConstructId {
    /// The topic map itself (the root construct).
    Map,
    /// A topic.
    Topic(TopicId),
    /// An association.
    Association(AssociationId),
    /// A role within an association.
    Role(RoleId),
    /// An occurrence of a topic.
    Occurrence(OccurrenceId),
    /// A name of a topic.
    Name(NameId),
    /// A variant of a name.
    Variant(VariantId),
}

impl ConstructId {
    /// Whether this handle refers to a topic.
    pub fn is_topic(&self) -> bool {
        matches!(self, ConstructId::Topic(_))
    }

    /// The topic handle, if this is a topic.
    pub fn as_topic(&self) -> Option<TopicId> {
        match self {
            ConstructId::Topic(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for ConstructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructId::Map => write!(f, "map"),
            ConstructId::Topic(id) => write!(f, "{}", id),
            ConstructId::Association(id) => write!(f, "{}", id),
            ConstructId::Role(id) => write!(f, "{}", id),
            ConstructId::Occurrence(id) => write!(f, "{}", id),
            ConstructId::Name(id) => write!(f, "{}", id),
            ConstructId::Variant(id) => write!(f, "{}", id),
        }
    }
}

impl From<TopicId> for ConstructId {
    fn from(id: TopicId) -> Self {
        ConstructId::Topic(id)
    }
}

impl From<AssociationId> for ConstructId {
    fn from(id: AssociationId) -> Self {
        ConstructId::Association(id)
    }
}

impl From<RoleId> for ConstructId {
    fn from(id: RoleId) -> Self {
        ConstructId::Role(id)
    }
}

impl From<OccurrenceId> for ConstructId {
    fn from(id: OccurrenceId) -> Self {
        ConstructId::Occurrence(id)
    }
}

impl From<NameId> for ConstructId {
    fn from(id: NameId) -> Self {
        ConstructId::Name(id)
    }
}

impl From<VariantId> for ConstructId {
    fn from(id: VariantId) -> Self {
        ConstructId::Variant(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_id_topic_accessors() {
        let c = ConstructId::Topic(TopicId(7));
        assert!(c.is_topic());
        assert_eq!(c.as_topic(), Some(TopicId(7)));
        assert_eq!(ConstructId::Map.as_topic(), None);
    }

    #[test]
    fn handles_order_by_index() {
        assert!(TopicId(1) < TopicId(2));
        assert!(ConstructId::Topic(TopicId(1)) < ConstructId::Association(AssociationId(0)));
    }

    #[test]
    fn display_is_kind_prefixed() {
        assert_eq!(TopicId(3).to_string(), "topic#3");
        assert_eq!(ConstructId::Role(RoleId(9)).to_string(), "role#9");
    }
}
