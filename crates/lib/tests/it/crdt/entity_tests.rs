//! Entity integration tests

use converge::crdt::{Crdt, CrdtChange, CrdtEntity, EntityOperation, Reference};

use super::helpers::*;

fn entity() -> CrdtEntity<Reference> {
    CrdtEntity::new(["owner"], ["members"]).unwrap()
}

fn set_owner(actor: &str, clock: &[(&str, u64)], id: &str) -> EntityOperation<Reference> {
    EntityOperation::Set {
        field: "owner".into(),
        actor: actor.into(),
        version: vv(clock),
        value: Reference::new(id),
    }
}

fn add_member(actor: &str, clock: &[(&str, u64)], id: &str) -> EntityOperation<Reference> {
    EntityOperation::Add {
        field: "members".into(),
        actor: actor.into(),
        version: vv(clock),
        added: Reference::new(id),
    }
}

#[test]
fn test_duplicate_field_names_are_rejected() {
    let err = CrdtEntity::<Reference>::new(["a"], ["a"]).unwrap_err();
    assert!(err.is_field_error());
    let err = CrdtEntity::<Reference>::new(["a", "a"], ["b"]).unwrap_err();
    assert!(err.is_field_error());
}

#[test]
fn test_field_operations_update_view_and_version() {
    let mut e = entity();
    assert!(e.apply_operation(&set_owner("a", &[("a", 1)], "alice")).unwrap());
    assert!(e.apply_operation(&add_member("b", &[("b", 1)], "m1")).unwrap());
    assert!(e.apply_operation(&add_member("b", &[("b", 2)], "m2")).unwrap());

    let view = e.consumer_view();
    assert_eq!(view.singletons["owner"].as_ref().map(|r| r.id.as_str()), Some("alice"));
    let members: Vec<&str> = view.collections["members"].iter().map(|r| r.id.as_str()).collect();
    assert_eq!(members, vec!["m1", "m2"]);
    assert_eq!(e.version(), &vv(&[("a", 1), ("b", 2)]));
}

#[test]
fn test_stale_field_operation_leaves_version() {
    let mut e = entity();
    e.apply_operation(&set_owner("a", &[("a", 1)], "alice")).unwrap();
    assert!(!e.apply_operation(&set_owner("a", &[("a", 3)], "bob")).unwrap());
    assert_eq!(e.version(), &vv(&[("a", 1)]));
}

#[test]
fn test_unknown_and_mismatched_fields_raise() {
    let mut e = entity();
    let unknown = EntityOperation::Set {
        field: "nope".into(),
        actor: "a".into(),
        version: vv(&[("a", 1)]),
        value: Reference::new("x"),
    };
    let err = e.apply_operation(&unknown).unwrap_err();
    assert!(err.is_field_error());

    let wrong_kind = EntityOperation::Add {
        field: "owner".into(),
        actor: "a".into(),
        version: vv(&[("a", 1)]),
        added: Reference::new("x"),
    };
    let err = e.apply_operation(&wrong_kind).unwrap_err();
    assert!(err.is_crdt_type_error());
    assert!(e.version().is_empty());
}

#[test]
fn test_clear_all_removes_observed_values() {
    let mut e = entity();
    e.apply_operation(&set_owner("a", &[("a", 1)], "alice")).unwrap();
    e.apply_operation(&add_member("a", &[("a", 1)], "m1")).unwrap();
    e.apply_operation(&add_member("b", &[("b", 1)], "m2")).unwrap();

    let clear = EntityOperation::ClearAll {
        actor: "a".into(),
        version: vv(&[("a", 1)]),
    };
    assert!(e.apply_operation(&clear).unwrap());

    let view = e.consumer_view();
    assert_eq!(view.singletons["owner"], None);
    // m2 was written by b, which the clear had not observed.
    let members: Vec<&str> = view.collections["members"].iter().map(|r| r.id.as_str()).collect();
    assert_eq!(members, vec!["m2"]);
}

#[test]
fn test_merge_converges_both_sides() {
    let mut left = entity();
    let mut right = entity();
    left.apply_operation(&set_owner("a", &[("a", 1)], "alice")).unwrap();
    right.apply_operation(&add_member("b", &[("b", 1)], "m1")).unwrap();

    let changes = sync_pair(&mut left, &mut right);
    assert!(matches!(changes.other_change, CrdtChange::Model { .. }));
    assert_eq!(left.data(), right.data());
    assert_eq!(left.version(), &vv(&[("a", 1), ("b", 1)]));

    let again = left.merge(&right.data()).unwrap();
    assert!(again.model_change.is_empty());
    assert!(again.other_change.is_empty());
}

#[test]
fn test_merge_rejects_unknown_fields() {
    let mut left = entity();
    let mut other = CrdtEntity::<Reference>::new(["owner", "extra"], ["members"]).unwrap();
    other
        .apply_operation(&EntityOperation::Set {
            field: "extra".into(),
            actor: "a".into(),
            version: vv(&[("a", 1)]),
            value: Reference::new("x"),
        })
        .unwrap();

    let err = left.merge(&other.data()).unwrap_err();
    assert!(err.is_field_error());
    assert_eq!(left, entity());
}

#[test]
fn test_data_round_trips_through_from_data() {
    let mut e = entity();
    e.apply_operation(&set_owner("a", &[("a", 1)], "alice")).unwrap();
    e.apply_operation(&add_member("a", &[("a", 1)], "m1")).unwrap();
    let rebuilt = CrdtEntity::from_data(e.data()).unwrap();
    assert_eq!(rebuilt, e);
}
