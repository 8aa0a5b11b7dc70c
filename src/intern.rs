//! Shared value-interning pool.
//!
//! The pool canonicalizes IRIs and literals so that structurally equal values
//! share one allocation. Interned handles carry a pool-unique serial that the
//! signature generator folds in as an identity fingerprint, which is why
//! signatures are process-local and never stable across runs.
//!
//! This is the one component intended to be shared across maps (a
//! [`crate::TopicMapSystem`] hands the same pool to every map it creates) and
//! therefore the only place in the engine that synchronizes: the tables sit
//! behind a `parking_lot::RwLock`. Everything else in the engine is owned by
//! a single map and single-threaded.

use parking_lot::RwLock;
use regex_lite::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;
use crate::types::iri::{Iri, IriInner};
use crate::types::literal::{xsd, Literal, LiteralInner};

/// Absolute-IRI syntax: a scheme followed by a non-empty, whitespace-free
/// remainder. Deliberately permissive beyond that; full RFC 3987 validation
/// is a reader concern.
const IRI_SYNTAX: &str = r"^[A-Za-z][A-Za-z0-9+.-]*:\S+$";

#[derive(Default)]
struct PoolState {
    next_serial: u64,
    iris: HashMap<String, Iri>,
    /// Keyed by (datatype serial, lexical value). Datatypes are canonicalized
    /// into this pool before keying, so foreign-pool serials never leak in.
    literals: HashMap<(u64, String), Literal>,
}

struct PoolInner {
    iri_syntax: Regex,
    xsd_string: Iri,
    xsd_any_uri: Iri,
    state: RwLock<PoolState>,
}

/// Process-shareable interning pool for IRIs and literals.
///
/// Cloning is cheap (shared `Arc`); clones intern into the same tables.
#[derive(Clone)]
pub struct InternPool {
    inner: Arc<PoolInner>,
}

impl InternPool {
    /// Create a fresh pool with the XSD core datatypes pre-interned.
    pub fn new() -> Self {
        let mut state = PoolState::default();
        let xsd_string = Iri(Arc::new(IriInner {
            serial: 1,
            value: xsd::STRING.to_string(),
        }));
        let xsd_any_uri = Iri(Arc::new(IriInner {
            serial: 2,
            value: xsd::ANY_URI.to_string(),
        }));
        state.next_serial = 2;
        state
            .iris
            .insert(xsd::STRING.to_string(), xsd_string.clone());
        state
            .iris
            .insert(xsd::ANY_URI.to_string(), xsd_any_uri.clone());

        Self {
            inner: Arc::new(PoolInner {
                iri_syntax: Regex::new(IRI_SYNTAX).expect("static pattern"),
                xsd_string,
                xsd_any_uri,
                state: RwLock::new(state),
            }),
        }
    }

    /// Intern an absolute IRI.
    ///
    /// Returns [`ModelError::InvalidIri`] when the string has no scheme, is
    /// empty, or contains whitespace.
    pub fn iri(&self, value: &str) -> Result<Iri, ModelError> {
        if !self.inner.iri_syntax.is_match(value) {
            return Err(ModelError::InvalidIri(value.to_string()));
        }
        Ok(self.intern_iri(value))
    }

    /// Intern a literal with an explicit datatype.
    ///
    /// The datatype is canonicalized into this pool first, so literals built
    /// against a different pool's datatype handle intern correctly.
    pub fn literal(&self, value: &str, datatype: &Iri) -> Literal {
        let datatype = self.intern_iri(datatype.as_str());
        self.intern_literal(value, datatype)
    }

    /// Intern an `xsd:string` literal.
    pub fn string(&self, value: &str) -> Literal {
        let datatype = self.inner.xsd_string.clone();
        self.intern_literal(value, datatype)
    }

    /// Intern an `xsd:anyURI` literal holding the given IRI.
    pub fn iri_value(&self, value: &Iri) -> Literal {
        let datatype = self.inner.xsd_any_uri.clone();
        self.intern_literal(value.as_str(), datatype)
    }

    /// Number of distinct IRIs interned so far.
    pub fn iri_count(&self) -> usize {
        self.inner.state.read().iris.len()
    }

    /// Number of distinct literals interned so far.
    pub fn literal_count(&self) -> usize {
        self.inner.state.read().literals.len()
    }

    /// Whether two pool handles refer to the same underlying tables.
    pub fn same_pool(&self, other: &InternPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn intern_iri(&self, value: &str) -> Iri {
        if let Some(found) = self.inner.state.read().iris.get(value) {
            return found.clone();
        }
        let mut state = self.inner.state.write();
        if let Some(found) = state.iris.get(value) {
            return found.clone();
        }
        state.next_serial += 1;
        let iri = Iri(Arc::new(IriInner {
            serial: state.next_serial,
            value: value.to_string(),
        }));
        state.iris.insert(value.to_string(), iri.clone());
        iri
    }

    fn intern_literal(&self, value: &str, datatype: Iri) -> Literal {
        let key = (datatype.serial(), value.to_string());
        if let Some(found) = self.inner.state.read().literals.get(&key) {
            return found.clone();
        }
        let mut state = self.inner.state.write();
        if let Some(found) = state.literals.get(&key) {
            return found.clone();
        }
        state.next_serial += 1;
        let literal = Literal(Arc::new(LiteralInner {
            serial: state.next_serial,
            value: value.to_string(),
            datatype,
        }));
        state.literals.insert(key, literal.clone());
        literal
    }
}

impl Default for InternPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InternPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("InternPool")
            .field("iris", &state.iris.len())
            .field("literals", &state.literals.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    #[test]
    fn equal_iris_share_one_allocation() {
        let pool = InternPool::new();
        let a = pool.iri("http://example.org/x").unwrap();
        let b = pool.iri("http://example.org/x").unwrap();
        assert!(StdArc::ptr_eq(&a.0, &b.0));
        assert_eq!(a.serial(), b.serial());
    }

    #[test]
    fn distinct_iris_get_distinct_serials() {
        let pool = InternPool::new();
        let a = pool.iri("http://example.org/x").unwrap();
        let b = pool.iri("http://example.org/y").unwrap();
        assert_ne!(a.serial(), b.serial());
    }

    #[test]
    fn rejects_relative_and_malformed_iris() {
        let pool = InternPool::new();
        assert!(pool.iri("").is_err());
        assert!(pool.iri("no-scheme").is_err());
        assert!(pool.iri("/relative/path").is_err());
        assert!(pool.iri("http://has space").is_err());
        assert!(pool.iri("urn:x").is_ok());
    }

    #[test]
    fn equal_literals_share_one_allocation() {
        let pool = InternPool::new();
        let a = pool.string("hello");
        let b = pool.string("hello");
        assert!(StdArc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn datatype_distinguishes_literals() {
        let pool = InternPool::new();
        let uri = pool.iri("http://example.org/x").unwrap();
        let a = pool.string("http://example.org/x");
        let b = pool.iri_value(&uri);
        assert_ne!(a, b);
        assert_ne!(a.serial(), b.serial());
    }

    #[test]
    fn foreign_pool_datatype_is_canonicalized() {
        let pool_a = InternPool::new();
        let pool_b = InternPool::new();
        let dt = pool_a.iri("http://example.org/dt").unwrap();
        let lit = pool_b.literal("v", &dt);
        // The literal's datatype handle belongs to pool_b's table.
        let dt_b = pool_b.iri("http://example.org/dt").unwrap();
        assert!(StdArc::ptr_eq(&lit.datatype().0, &dt_b.0));
    }

    #[test]
    fn clones_intern_into_the_same_tables() {
        let pool = InternPool::new();
        let clone = pool.clone();
        let a = pool.iri("http://example.org/shared").unwrap();
        let b = clone.iri("http://example.org/shared").unwrap();
        assert!(StdArc::ptr_eq(&a.0, &b.0));
        assert!(pool.same_pool(&clone));
    }
}
