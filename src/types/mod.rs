//! Core types of the construct graph.

pub mod handles;
pub mod iri;
pub mod literal;
pub mod scope;

pub use handles::{
    AssociationId, ConstructId, NameId, OccurrenceId, RoleId, TopicId, VariantId,
};
pub use iri::Iri;
pub use literal::{xsd, Literal};
pub use scope::ScopeId;
