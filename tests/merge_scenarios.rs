//! End-to-end scenarios for the identity-and-merge engine.
//!
//! These tests exercise the public surface the way a deserialization driver
//! or canonical writer would: identity uniqueness, merge completeness,
//! signature-based deduplication, and cascading merges across map copies.

use topicmap_engine::{
    association_signature, occurrence_signature, ConstructId, GraphBuilder, Iri, ModelError,
    TopicId, TopicMap, TopicMapSystem, TopicUsage,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn iri(map: &TopicMap, value: &str) -> Iri {
    map.pool().iri(value).unwrap()
}

/// Topic with a subject identifier, for readable setups.
fn topic(map: &mut TopicMap, si: &str) -> TopicId {
    let si = iri(map, si);
    map.create_topic_by_subject_identifier(&si).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// IDENTITY UNIQUENESS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_colliding_identifier_leaves_both_topics_unchanged() {
    let mut map = TopicMap::new();
    let a = topic(&mut map, "http://ex/a");
    let b = topic(&mut map, "http://ex/b");
    let shared = iri(&map, "http://ex/shared");
    map.add_subject_identifier(a, shared.clone()).unwrap();

    let before_a = map.subject_identifiers(a).unwrap();
    let before_b = map.subject_identifiers(b).unwrap();
    let err = map.add_subject_identifier(b, shared.clone()).unwrap_err();

    assert!(matches!(err, ModelError::IdentityConstraint { .. }));
    assert_eq!(map.subject_identifiers(a).unwrap(), before_a);
    assert_eq!(map.subject_identifiers(b).unwrap(), before_b);
    assert_eq!(map.topic_by_subject_identifier(&shared), Some(a));
}

#[test]
fn test_subject_locator_uniqueness() {
    let mut map = TopicMap::new();
    let a = map.create_topic().unwrap();
    let b = map.create_topic().unwrap();
    let resource = iri(&map, "http://ex/doc.html");
    map.add_subject_locator(a, resource.clone()).unwrap();
    assert!(map.add_subject_locator(b, resource).is_err());
}

// ─────────────────────────────────────────────────────────────────────────────
// MERGE PROPERTIES
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_merge_with_self_is_a_noop() {
    let mut map = TopicMap::new();
    let t = topic(&mut map, "http://ex/t");
    map.create_name(t, "T", &[]).unwrap();
    let stats = map.stats();
    map.merge_topics(t, t).unwrap();
    assert_eq!(map.stats(), stats);
}

#[test]
fn test_merge_completeness() {
    let mut map = TopicMap::new();
    let typ_a = topic(&mut map, "http://ex/type-a");
    let typ_b = topic(&mut map, "http://ex/type-b");

    let a = topic(&mut map, "http://ex/a");
    map.add_subject_locator(a, iri(&map, "http://ex/res-a"))
        .unwrap();
    map.add_item_identifier(ConstructId::Topic(a), iri(&map, "http://ex/frag-a"))
        .unwrap();
    map.add_type(a, typ_a).unwrap();

    let b = topic(&mut map, "http://ex/b");
    map.add_subject_locator(b, iri(&map, "http://ex/res-b"))
        .unwrap();
    map.add_item_identifier(ConstructId::Topic(b), iri(&map, "http://ex/frag-b"))
        .unwrap();
    map.add_type(b, typ_b).unwrap();

    let mut expected_sis: Vec<Iri> = map
        .subject_identifiers(a)
        .unwrap()
        .into_iter()
        .chain(map.subject_identifiers(b).unwrap())
        .collect();
    expected_sis.sort();

    map.merge_topics(a, b).unwrap();

    assert!(!map.contains_topic(a));
    let mut sis = map.subject_identifiers(b).unwrap();
    sis.sort();
    assert_eq!(sis, expected_sis);
    assert_eq!(map.subject_locators(b).unwrap().len(), 2);
    assert_eq!(map.item_identifiers(ConstructId::Topic(b)).unwrap().len(), 2);
    assert_eq!(map.topic_types(b).unwrap(), vec![typ_a, typ_b]);
    // Every moved identity resolves to the survivor.
    assert_eq!(
        map.topic_by_subject_identifier(&iri(&map, "http://ex/a")),
        Some(b)
    );
    assert_eq!(
        map.construct_by_item_identifier(&iri(&map, "http://ex/frag-a")),
        Some(ConstructId::Topic(b))
    );
}

#[test]
fn test_merge_reparents_names_and_registers_their_identities() {
    // A pre-populated name arriving at a new parent must register its item
    // identifiers and variants with the identity index, exactly as if they
    // had been added one by one.
    let mut map = TopicMap::new();
    let a = topic(&mut map, "http://ex/a");
    let b = topic(&mut map, "http://ex/b");
    let theme = topic(&mut map, "http://ex/display");

    let n = map.create_name(a, "only-on-a", &[]).unwrap();
    let name_ii = iri(&map, "http://ex/a/name");
    map.add_item_identifier(ConstructId::Name(n), name_ii.clone())
        .unwrap();
    let v = map
        .create_variant(n, map.pool().string("ONLY-ON-A"), &[theme])
        .unwrap();
    let variant_ii = iri(&map, "http://ex/a/name/variant");
    map.add_item_identifier(ConstructId::Variant(v), variant_ii.clone())
        .unwrap();

    map.merge_topics(a, b).unwrap();

    let names = map.names(b).unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(
        map.construct_by_item_identifier(&name_ii),
        Some(ConstructId::Name(names[0]))
    );
    let variants = map.variants(names[0]).unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(
        map.construct_by_item_identifier(&variant_ii),
        Some(ConstructId::Variant(variants[0]))
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// SIGNATURES AND DEDUPLICATION
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_signature_dedup_unions_item_identifiers() {
    let mut map = TopicMap::new();
    let note = topic(&mut map, "http://ex/note");
    let t = topic(&mut map, "http://ex/t");

    let o1 = map
        .create_occurrence(t, note, map.pool().string("hello"), &[])
        .unwrap();
    map.add_item_identifier(ConstructId::Occurrence(o1), iri(&map, "http://ex/o1"))
        .unwrap();
    let o2 = map
        .create_occurrence(t, note, map.pool().string("hello"), &[])
        .unwrap();
    map.add_item_identifier(ConstructId::Occurrence(o2), iri(&map, "http://ex/o2"))
        .unwrap();

    map.remove_duplicates().unwrap();

    let occurrences = map.occurrences(t).unwrap();
    assert_eq!(occurrences.len(), 1);
    let iids = map
        .item_identifiers(ConstructId::Occurrence(occurrences[0]))
        .unwrap();
    assert_eq!(iids.len(), 2);
}

#[test]
fn test_association_signature_order_independence() {
    let mut map = TopicMap::new();
    let rel = topic(&mut map, "http://ex/rel");
    let rt1 = topic(&mut map, "http://ex/rt1");
    let rt2 = topic(&mut map, "http://ex/rt2");
    let p1 = topic(&mut map, "http://ex/p1");
    let p2 = topic(&mut map, "http://ex/p2");

    let a = map.create_association(rel, &[]).unwrap();
    map.create_role(a, rt1, p1).unwrap();
    map.create_role(a, rt2, p2).unwrap();

    let b = map.create_association(rel, &[]).unwrap();
    map.create_role(b, rt2, p2).unwrap();
    map.create_role(b, rt1, p1).unwrap();

    let sig_a = association_signature(&map, a).unwrap();
    let sig_b = association_signature(&map, b).unwrap();
    assert_eq!(sig_a, sig_b);

    // Signatures are stable across repeated computation.
    for _ in 0..100 {
        assert_eq!(association_signature(&map, a).unwrap(), sig_a);
    }

    map.remove_duplicates().unwrap();
    assert_eq!(map.associations().len(), 1);
}

#[test]
fn test_occurrence_signature_changes_with_structure() {
    let mut map = TopicMap::new();
    let note = topic(&mut map, "http://ex/note");
    let t = topic(&mut map, "http://ex/t");
    let theme = topic(&mut map, "http://ex/theme");

    let o = map
        .create_occurrence(t, note, map.pool().string("v"), &[])
        .unwrap();
    let plain = occurrence_signature(&map, o).unwrap();
    map.add_theme(ConstructId::Occurrence(o), theme).unwrap();
    let scoped = occurrence_signature(&map, o).unwrap();
    assert_ne!(plain, scoped);
    map.remove_theme(ConstructId::Occurrence(o), theme).unwrap();
    assert_eq!(occurrence_signature(&map, o).unwrap(), plain);
}

// ─────────────────────────────────────────────────────────────────────────────
// MAP COPY
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_end_to_end_copy_with_shared_subject() {
    let system = TopicMapSystem::new();
    let mut m = system.create_map();
    let mut n = system.create_map();

    // Map M: Topic T with one occurrence.
    let t = topic(&mut m, "http://ex/a");
    let note_m = topic(&mut m, "http://ex/note");
    m.create_occurrence(t, note_m, m.pool().string("hello"), &[])
        .unwrap();

    // Map N: same topic and occurrence, plus an association with two roles.
    let t2 = topic(&mut n, "http://ex/a");
    let note_n = topic(&mut n, "http://ex/note");
    n.create_occurrence(t2, note_n, n.pool().string("hello"), &[])
        .unwrap();
    let rel = topic(&mut n, "http://ex/rel");
    let rt1 = topic(&mut n, "http://ex/rt1");
    let rt2 = topic(&mut n, "http://ex/rt2");
    let other = topic(&mut n, "http://ex/other");
    let assoc = n.create_association(rel, &[]).unwrap();
    n.create_role(assoc, rt1, t2).unwrap();
    n.create_role(assoc, rt2, other).unwrap();

    m.copy_from(&n).unwrap();

    // Exactly one topic bound to the shared subject, with one occurrence.
    let merged = m
        .topic_by_subject_identifier(&iri(&m, "http://ex/a"))
        .unwrap();
    assert_eq!(merged, t);
    assert_eq!(m.occurrences(merged).unwrap().len(), 1);

    // The copied association references the merged topic.
    assert_eq!(m.associations().len(), 1);
    let copied = m.associations()[0];
    let players: Vec<TopicId> = m
        .roles(copied)
        .unwrap()
        .into_iter()
        .map(|r| m.player(r).unwrap())
        .collect();
    assert!(players.contains(&merged));
}

#[test]
fn test_cascading_merge_during_copy() {
    // Source: S1 carries subject identifier u1, S2 carries item identifier
    // u1. Target already binds u1. After the copy the target holds exactly
    // one topic with the union of S1's and S2's characteristics and no
    // duplicated associations.
    let system = TopicMapSystem::new();
    let mut target = system.create_map();
    let mut source = system.create_map();

    let u1 = system.pool().iri("http://ex/u1").unwrap();
    let existing = target.create_topic_by_subject_identifier(&u1).unwrap();

    let s1 = source.create_topic_by_subject_identifier(&u1).unwrap();
    let s2 = source.create_topic().unwrap();
    source
        .add_item_identifier(ConstructId::Topic(s2), u1.clone())
        .unwrap();
    let note = topic(&mut source, "http://ex/note");
    source
        .create_occurrence(s1, note, source.pool().string("s1"), &[])
        .unwrap();
    source
        .create_occurrence(s2, note, source.pool().string("s2"), &[])
        .unwrap();

    // Both source topics play the same kind of role against the same other
    // topic: after the cascade these associations must collapse.
    let rel = topic(&mut source, "http://ex/rel");
    let rt = topic(&mut source, "http://ex/rt");
    let ot = topic(&mut source, "http://ex/ot");
    let other = topic(&mut source, "http://ex/other");
    let a1 = source.create_association(rel, &[]).unwrap();
    source.create_role(a1, rt, s1).unwrap();
    source.create_role(a1, ot, other).unwrap();
    let a2 = source.create_association(rel, &[]).unwrap();
    source.create_role(a2, rt, s2).unwrap();
    source.create_role(a2, ot, other).unwrap();

    target.copy_from(&source).unwrap();

    let merged = target.topic_by_subject_identifier(&u1).unwrap();
    assert_eq!(merged, existing);
    assert_eq!(
        target.construct_by_item_identifier(&u1),
        Some(ConstructId::Topic(merged))
    );
    assert_eq!(target.occurrences(merged).unwrap().len(), 2);
    // The two source associations became structurally identical and
    // collapsed into one.
    assert_eq!(target.associations().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// TOPIC REMOVAL
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_topic_in_use_is_protected_for_each_reference_kind() {
    let mut map = TopicMap::new();

    // As a type.
    let typ = map.create_topic().unwrap();
    let t = map.create_topic().unwrap();
    map.add_type(t, typ).unwrap();
    assert!(matches!(
        map.remove_topic(typ).unwrap_err(),
        ModelError::TopicInUse {
            usage: TopicUsage::Type,
            ..
        }
    ));

    // As a player.
    let at = map.create_topic().unwrap();
    let rt = map.create_topic().unwrap();
    let player = map.create_topic().unwrap();
    let a = map.create_association(at, &[]).unwrap();
    map.create_role(a, rt, player).unwrap();
    assert!(matches!(
        map.remove_topic(player).unwrap_err(),
        ModelError::TopicInUse {
            usage: TopicUsage::Player,
            ..
        }
    ));

    // As a reifier.
    let reifier = map.create_topic().unwrap();
    map.set_reifier(ConstructId::Association(a), Some(reifier))
        .unwrap();
    assert!(matches!(
        map.remove_topic(reifier).unwrap_err(),
        ModelError::TopicInUse {
            usage: TopicUsage::Reifier,
            ..
        }
    ));

    // As a theme.
    let theme = map.create_topic().unwrap();
    let subject = map.create_topic().unwrap();
    map.create_name(subject, "N", &[theme]).unwrap();
    assert!(matches!(
        map.remove_topic(theme).unwrap_err(),
        ModelError::TopicInUse {
            usage: TopicUsage::Theme,
            ..
        }
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// STREAMING BUILDER
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_builder_streams_two_sources_into_one_topic() {
    let mut map = TopicMap::new();
    let mut builder = GraphBuilder::new(&mut map);

    // First "document" about the subject.
    builder
        .start_topic_by_subject_identifier("http://ex/subject")
        .unwrap();
    builder.start_name("Subject").unwrap();
    builder.end_name().unwrap();
    builder.end_topic().unwrap();

    // Second "document": same subject, found under an item identifier first.
    builder
        .start_topic_by_item_identifier("http://ex/doc2#frag")
        .unwrap();
    builder.add_subject_identifier("http://ex/subject").unwrap();
    builder.start_name("Subject").unwrap();
    builder.end_name().unwrap();
    builder.end_topic().unwrap();

    let stats = builder.finish().unwrap();
    assert_eq!(stats.merges, 1);

    let merged = map
        .topic_by_subject_identifier(&iri(&map, "http://ex/subject"))
        .unwrap();
    // Identical names deduplicated at finish.
    assert_eq!(map.names(merged).unwrap().len(), 1);
    assert_eq!(
        map.construct_by_item_identifier(&iri(&map, "http://ex/doc2#frag")),
        Some(ConstructId::Topic(merged))
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// ORDINAL NUMBERING FOR CANONICAL WRITERS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_registration_ids_are_stable_and_resolvable() {
    let mut map = TopicMap::new();
    let a = topic(&mut map, "http://ex/a");
    let b = topic(&mut map, "http://ex/b");
    let id_a = map.construct_id(ConstructId::Topic(a)).unwrap();
    let id_b = map.construct_id(ConstructId::Topic(b)).unwrap();
    assert!(id_a < id_b);
    assert_eq!(
        map.identity().construct_by_id(id_a),
        Some(ConstructId::Topic(a))
    );
    // Mutations elsewhere do not renumber.
    map.create_name(b, "B", &[]).unwrap();
    assert_eq!(map.construct_id(ConstructId::Topic(a)).unwrap(), id_a);
}
