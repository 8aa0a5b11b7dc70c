//! Structural signatures for duplicate detection.
//!
//! A signature is an xxh64 fingerprint of a construct's structure: its type,
//! its scope, its literal value, and (for composites) its children. Two
//! constructs under the same parent with equal signatures are duplicates per
//! the data model and are collapsed by the merge engine.
//!
//! ## Determinism Guarantees
//!
//! - Child order never matters: role signatures are sorted before an
//!   association's signature folds them in, so two associations differing
//!   only in role insertion order fingerprint identically. Theme lists are
//!   sorted the same way.
//! - Signatures are **process-local**: they fold in interned-value serials
//!   and construct registration ids, which are meaningless across runs or
//!   processes. They are duplicate-detection fingerprints, not content
//!   hashes fit for storage.

use xxhash_rust::xxh64::Xxh64;

use crate::error::ModelError;
use crate::map::TopicMap;
use crate::types::{AssociationId, NameId, OccurrenceId, RoleId, ScopeId, VariantId};

const TAG_OCCURRENCE: u8 = 1;
const TAG_NAME: u8 = 2;
const TAG_VARIANT: u8 = 3;
const TAG_ROLE: u8 = 4;
const TAG_ASSOCIATION: u8 = 5;

/// Signature of an occurrence: type, scope, and literal.
pub fn occurrence_signature(
    map: &TopicMap,
    occurrence: OccurrenceId,
) -> Result<u64, ModelError> {
    let data = map.require_occurrence(occurrence)?;
    let typ = map.require_topic(data.typ)?.serial;
    let themes = theme_serials(map, data.scope);
    Ok(occurrence_parts(typ, &themes, data.value.serial()))
}

/// Signature of a name: type, scope, and literal.
///
/// Variants are excluded: two names that differ only in their variant sets
/// are still duplicates, and the merge engine folds the variant sets
/// together when it collapses them.
pub fn name_signature(map: &TopicMap, name: NameId) -> Result<u64, ModelError> {
    let data = map.require_name(name)?;
    let typ = map.require_topic(data.typ)?.serial;
    let themes = theme_serials(map, data.scope);
    Ok(name_parts(typ, &themes, data.value.serial()))
}

/// Signature of a variant: scope and literal (variants are untyped).
pub fn variant_signature(map: &TopicMap, variant: VariantId) -> Result<u64, ModelError> {
    let data = map.require_variant(variant)?;
    let themes = theme_serials(map, data.scope);
    Ok(variant_parts(&themes, data.value.serial()))
}

/// Signature of a role: type and player.
pub fn role_signature(map: &TopicMap, role: RoleId) -> Result<u64, ModelError> {
    let data = map.require_role(role)?;
    let typ = map.require_topic(data.typ)?.serial;
    let player = map.require_topic(data.player)?.serial;
    Ok(role_parts(typ, player))
}

/// Signature of an association: type, scope, and the sorted signatures of
/// its roles.
pub fn association_signature(
    map: &TopicMap,
    association: AssociationId,
) -> Result<u64, ModelError> {
    let data = map.require_association(association)?;
    let typ = map.require_topic(data.typ)?.serial;
    let themes = theme_serials(map, data.scope);
    let mut role_sigs = Vec::with_capacity(data.roles.len());
    for role in &data.roles {
        role_sigs.push(role_signature(map, *role)?);
    }
    Ok(association_parts(typ, &themes, role_sigs))
}

/// Format a signature the way diagnostics print them.
pub fn signature_hex(signature: u64) -> String {
    format!("{:016x}", signature)
}

pub(crate) fn occurrence_parts(type_serial: u64, theme_serials: &[u64], value_serial: u64) -> u64 {
    fold(TAG_OCCURRENCE, type_serial, theme_serials, value_serial, &[])
}

pub(crate) fn name_parts(type_serial: u64, theme_serials: &[u64], value_serial: u64) -> u64 {
    fold(TAG_NAME, type_serial, theme_serials, value_serial, &[])
}

pub(crate) fn variant_parts(theme_serials: &[u64], value_serial: u64) -> u64 {
    fold(TAG_VARIANT, 0, theme_serials, value_serial, &[])
}

pub(crate) fn role_parts(type_serial: u64, player_serial: u64) -> u64 {
    fold(TAG_ROLE, type_serial, &[], player_serial, &[])
}

pub(crate) fn association_parts(
    type_serial: u64,
    theme_serials: &[u64],
    mut role_sigs: Vec<u64>,
) -> u64 {
    role_sigs.sort_unstable();
    fold(TAG_ASSOCIATION, type_serial, theme_serials, 0, &role_sigs)
}

/// Registration ids of a scope's themes, sorted.
pub(crate) fn theme_serials(map: &TopicMap, scope: ScopeId) -> Vec<u64> {
    let mut serials: Vec<u64> = map
        .store
        .scopes
        .themes(scope)
        .iter()
        .filter_map(|theme| map.store.topics.get(theme).map(|d| d.serial))
        .collect();
    serials.sort_unstable();
    serials
}

fn fold(
    tag: u8,
    type_serial: u64,
    theme_serials: &[u64],
    value_serial: u64,
    child_sigs: &[u64],
) -> u64 {
    let mut hasher = Xxh64::new(0);
    hasher.update(&[tag]);
    hasher.update(&type_serial.to_le_bytes());
    hasher.update(&(theme_serials.len() as u64).to_le_bytes());
    for serial in theme_serials {
        hasher.update(&serial.to_le_bytes());
    }
    hasher.update(&value_serial.to_le_bytes());
    hasher.update(&(child_sigs.len() as u64).to_le_bytes());
    for sig in child_sigs {
        hasher.update(&sig.to_le_bytes());
    }
    hasher.digest()
}
