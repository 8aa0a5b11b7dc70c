//! Interned IRI references.
//!
//! Every identifier in the data model (item identifiers, subject identifiers,
//! subject locators, datatype references) is an absolute IRI. IRIs are
//! interned through [`crate::InternPool`], so structurally equal IRIs share
//! one allocation and comparison usually reduces to a pointer check.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub(crate) struct IriInner {
    /// Pool-unique serial, folded into structural signatures.
    pub(crate) serial: u64,
    pub(crate) value: String,
}

/// An interned absolute IRI.
///
/// Cheap to clone (a single `Arc`). Equality, ordering, and hashing follow
/// the string value, with a pointer-equality fast path for IRIs from the same
/// pool, so `Iri`s are safe to use across pools (e.g. when copying between
/// maps created by different [`crate::TopicMapSystem`]s).
#[derive(Clone)]
pub struct Iri(pub(crate) Arc<IriInner>);

impl Iri {
    /// The IRI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0.value
    }

    /// Pool-local serial of this IRI.
    ///
    /// Only meaningful within the process; used by the signature generator as
    /// an identity fingerprint.
    pub fn serial(&self) -> u64 {
        self.0.serial
    }
}

impl PartialEq for Iri {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.value == other.0.value
    }
}

impl Eq for Iri {}

impl PartialOrd for Iri {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Iri {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.0, &other.0) {
            Ordering::Equal
        } else {
            self.0.value.cmp(&other.0.value)
        }
    }
}

impl Hash for Iri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.value.hash(state);
    }
}

impl fmt::Debug for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iri({})", self.0.value)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.value)
    }
}

impl Serialize for Iri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.value)
    }
}
