//! Interned literal values.
//!
//! A literal is a lexical value paired with a datatype IRI. Occurrences,
//! names, and variants each carry exactly one literal. Literals are interned
//! through [`crate::InternPool`] so that equal (value, datatype) pairs share
//! one allocation; the pool serial doubles as the literal's identity
//! fingerprint in structural signatures.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::iri::Iri;

/// Well-known XSD datatype IRIs.
pub mod xsd {
    /// `xsd:string`, the datatype of plain values and of all name literals.
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    /// `xsd:anyURI`, the datatype of IRI-valued occurrences.
    pub const ANY_URI: &str = "http://www.w3.org/2001/XMLSchema#anyURI";
    /// `xsd:integer`.
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    /// `xsd:decimal`.
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
}

pub(crate) struct LiteralInner {
    pub(crate) serial: u64,
    pub(crate) value: String,
    pub(crate) datatype: Iri,
}

/// An interned (lexical value, datatype) pair.
///
/// Cheap to clone. Equality and ordering compare (datatype, value), with a
/// pointer fast path for literals interned in the same pool.
#[derive(Clone)]
pub struct Literal(pub(crate) Arc<LiteralInner>);

impl Literal {
    /// The lexical value.
    pub fn value(&self) -> &str {
        &self.0.value
    }

    /// The datatype IRI.
    pub fn datatype(&self) -> &Iri {
        &self.0.datatype
    }

    /// Pool-local serial, folded into structural signatures.
    pub fn serial(&self) -> u64 {
        self.0.serial
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.datatype == other.0.datatype && self.0.value == other.0.value)
    }
}

impl Eq for Literal {}

impl PartialOrd for Literal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Literal {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.0, &other.0) {
            return Ordering::Equal;
        }
        self.0
            .datatype
            .cmp(&other.0.datatype)
            .then_with(|| self.0.value.cmp(&other.0.value))
    }
}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.datatype.hash(state);
        self.0.value.hash(state);
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Literal({:?}^^{})", self.0.value, self.0.datatype)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.value)
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Literal", 2)?;
        s.serialize_field("value", &self.0.value)?;
        s.serialize_field("datatype", self.0.datatype.as_str())?;
        s.end()
    }
}
