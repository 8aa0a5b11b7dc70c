//! Error taxonomy for graph mutations.
//!
//! None of these errors are retried internally; they propagate synchronously
//! to the caller of the mutating operation. Multi-step operations (topic
//! merge, map copy, duplicate removal) are not transactional: when one of
//! them fails partway, already-applied effects remain in place and the caller
//! should treat the map as unusable and discard it.

use serde::Serialize;
use std::fmt;

use crate::types::{ConstructId, Iri, NameId, TopicId};

/// What keeps a topic alive when removal is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TopicUsage {
    /// The topic types another construct (a topic, association, role,
    /// occurrence, or name).
    Type,
    /// The topic plays a role in an association.
    Player,
    /// The topic reifies another construct.
    Reifier,
    /// The topic is a theme in some construct's scope.
    Theme,
}

impl fmt::Display for TopicUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicUsage::Type => f.write_str("a type"),
            TopicUsage::Player => f.write_str("a role player"),
            TopicUsage::Reifier => f.write_str("a reifier"),
            TopicUsage::Theme => f.write_str("a scope theme"),
        }
    }
}

/// Errors raised by graph mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Assigning an identifier would collide with a different construct's
    /// identity. Carries both constructs for diagnostics. The triggering
    /// mutation is rejected; the identifier sets of both constructs are
    /// unchanged.
    #[error("identity constraint violation: {iri} already identifies {existing}, cannot also identify {adding}")]
    IdentityConstraint {
        /// The colliding IRI.
        iri: Iri,
        /// The construct already bound to the IRI.
        existing: ConstructId,
        /// The construct the caller tried to bind.
        adding: ConstructId,
    },

    /// A topic that already reifies one construct was requested as the
    /// reifier of a different construct.
    #[error("reifier conflict: {topic} already reifies {reified}, cannot reify {requested}")]
    ReifierConflict {
        /// The topic requested as reifier.
        topic: TopicId,
        /// The construct it already reifies.
        reified: ConstructId,
        /// The construct it was requested to reify.
        requested: ConstructId,
    },

    /// Two topics being merged reify different constructs. Fatal to the whole
    /// merge; partial progress is not rolled back.
    #[error("merge conflict: {consumed} and {target} reify different constructs")]
    MergeReifierConflict {
        /// The topic being consumed.
        consumed: TopicId,
        /// The topic being kept.
        target: TopicId,
    },

    /// A variant's scope must be a proper superset of its parent name's
    /// scope.
    #[error("variant scope must properly extend the scope of {name}")]
    VariantScopeNotExtended {
        /// The parent name.
        name: NameId,
    },

    /// The topic is still referenced somewhere in the map and cannot be
    /// removed.
    #[error("{topic} is in use as {usage} and cannot be removed")]
    TopicInUse {
        /// The topic whose removal was rejected.
        topic: TopicId,
        /// The first detected kind of reference keeping it alive.
        usage: TopicUsage,
    },

    /// The handle does not refer to a live construct of this map. Raised for
    /// removed (merged-away) constructs and for handles minted by a different
    /// map.
    #[error("unknown construct {0} (removed, or foreign to this map)")]
    UnknownConstruct(ConstructId),

    /// The string is not an absolute IRI.
    #[error("invalid IRI: {0:?}")]
    InvalidIri(String),

    /// The construct kind carries no scope.
    #[error("{0} is not a scoped construct")]
    NotScoped(ConstructId),

    /// The construct kind carries no type.
    #[error("{0} is not a typed construct")]
    NotTyped(ConstructId),

    /// The construct kind cannot be reified (topics reify, they are not
    /// reified).
    #[error("{0} cannot be reified")]
    NotReifiable(ConstructId),

    /// The construct kind carries no literal value.
    #[error("{0} does not carry a literal value")]
    NotValued(ConstructId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TopicId;

    #[test]
    fn topic_in_use_message_names_the_usage() {
        let err = ModelError::TopicInUse {
            topic: TopicId(4),
            usage: TopicUsage::Theme,
        };
        assert_eq!(
            err.to_string(),
            "topic#4 is in use as a scope theme and cannot be removed"
        );
    }
}
