//! # topicmap-engine
//!
//! In-memory topic map engine with identity-based merging and
//! signature-driven duplicate elimination.
//!
//! The engine answers one question:
//!
//! > Given constructs that may denote the **same subject**, when are they the
//! > same, and how do they become one?
//!
//! ## Core Contract
//!
//! 1. Every graph mutation publishes a pre-change event; the identity index
//!    accepts or rejects it **before** anything commits
//! 2. Identifier collisions are rejected, never silently merged; merging is
//!    an explicit operation of the caller (or of [`GraphBuilder`] while
//!    deserializing)
//! 3. Structural signatures make duplicate detection order-independent: two
//!    associations with the same roles added in any order fingerprint
//!    identically
//!
//! ## Architecture
//!
//! ```text
//! Mutator → Event → IdentityIndex / TypeIndex / ScopeIndex → commit
//!                        ↓
//!               Merge engine (worklist of topic / association pairs)
//!                        ↓
//!               Signature generator (xxh64 structural fingerprints)
//! ```
//!
//! ## Execution model
//!
//! Single-threaded, synchronous, single-writer. The only shared (and only
//! synchronized) component is the [`InternPool`], which a [`TopicMapSystem`]
//! hands to every map it creates. Signatures fold in interned-value serials
//! and per-map registration ids, so they are process-local fingerprints, not
//! stable content hashes.
//!
//! ## Failure model
//!
//! Constraint violations propagate synchronously and reject the triggering
//! mutation. Multi-step operations (topic merge, map copy, duplicate
//! removal) are not transactional: on error, partial effects remain and the
//! caller should discard the map.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod error;
pub mod events;
pub mod index;
pub mod intern;
pub mod map;
pub mod merge;
pub mod signature;
pub mod types;

// Re-exports
pub use types::{
    xsd, AssociationId, ConstructId, Iri, Literal, NameId, OccurrenceId, RoleId, ScopeId,
    TopicId, VariantId,
};
pub use error::{ModelError, TopicUsage};
pub use events::{Event, EventKind};
pub use index::{IdentityIndex, ScopeIndex, TypeIndex};
pub use intern::InternPool;
pub use map::{MapStats, TopicMap, TopicMapSystem};
pub use builder::{BuildStats, BuilderError, GraphBuilder};
pub use signature::{
    association_signature, name_signature, occurrence_signature, role_signature, signature_hex,
    variant_signature,
};

/// Schema version for the engine's public types.
/// Increment on breaking changes to any exported type.
pub const ENGINE_SCHEMA_VERSION: &str = "1.0.0";

/// Subject identifier of the default topic-name type.
pub const TOPIC_NAME_TYPE: &str = "http://psi.topicmaps.org/iso13250/model/topic-name";
