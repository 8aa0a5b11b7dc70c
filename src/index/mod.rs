//! Secondary indexes kept consistent through the event pipeline.

pub mod identity;
pub mod scoped;
pub mod typed;

pub use identity::IdentityIndex;
pub use scoped::ScopeIndex;
pub use typed::TypeIndex;
