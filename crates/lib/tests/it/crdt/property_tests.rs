//! Property tests for merge and version-vector laws

use std::collections::BTreeMap;

use converge::crdt::{
    CollectionOperation, Crdt, CrdtCollection, CrdtCount, CrdtSingleton, Literal, Literalize,
    OrSet, Reference, SingletonData, SingletonOperation, VersionVector, WriteToken,
};
use proptest::prelude::*;

use super::helpers::*;

const ACTORS: [&str; 3] = ["a", "b", "c"];

fn version_vector() -> impl Strategy<Value = VersionVector> {
    prop::collection::btree_map(prop::sample::select(ACTORS.to_vec()), 0u64..20, 0..4)
        .prop_map(|entries: BTreeMap<&str, u64>| entries.into_iter().collect())
}

/// Per actor: the full increment history and how much of it each replica saw.
fn histories() -> impl Strategy<Value = Vec<(Vec<u64>, usize, usize)>> {
    prop::collection::vec(
        prop::collection::vec(1u64..10, 0..5).prop_flat_map(|deltas| {
            let len = deltas.len();
            (Just(deltas), 0..=len, 0..=len)
        }),
        ACTORS.len(),
    )
}

fn replica(histories: &[(Vec<u64>, usize, usize)], left: bool) -> CrdtCount {
    let mut count = CrdtCount::new();
    for (actor, (deltas, seen_left, seen_right)) in ACTORS.iter().zip(histories) {
        let seen = if left { *seen_left } else { *seen_right };
        let partial = count_with(actor, &deltas[..seen]);
        count.merge(&partial.data()).unwrap();
    }
    count
}

const IDS: [&str; 3] = ["x", "y", "z"];

/// `true` adds, `false` removes, against one of [`IDS`].
fn edits() -> impl Strategy<Value = Vec<(bool, usize)>> {
    prop::collection::vec((any::<bool>(), 0..IDS.len()), 0..6)
}

/// Applies `edits` as `actor`, each add carrying a value unique to its token.
fn edit(collection: &mut CrdtCollection<Reference>, actor: &str, edits: &[(bool, usize)]) {
    for (is_add, slot) in edits {
        let id = IDS[*slot];
        let op = if *is_add {
            let mut clock = collection.version().clone();
            let next = clock.get(actor) + 1;
            clock.set(actor, next);
            CollectionOperation::Add {
                actor: actor.into(),
                version: clock,
                added: Reference::new(id).with_storage_key(format!("{actor}{next}")),
            }
        } else {
            CollectionOperation::Remove {
                actor: actor.into(),
                version: collection.version().clone(),
                removed: Reference::new(id),
            }
        };
        let applied = collection.apply_operation(&op).unwrap();
        assert!(applied || !*is_add);
    }
}

/// Sets (`Some`) or clears (`None`) a singleton from a clock that only knows the
/// writer's own history, so writers never observe each other.
fn assign(singleton: &mut CrdtSingleton<Reference>, actor: &str, value: Option<usize>) {
    let own = singleton.version().get(actor);
    let op = match value {
        Some(slot) => SingletonOperation::Set {
            actor: actor.into(),
            version: vv(&[(actor, own + 1)]),
            value: Reference::new(IDS[slot]),
        },
        None => SingletonOperation::Clear {
            actor: actor.into(),
            version: vv(&[(actor, own)]),
        },
    };
    assert!(singleton.apply_operation(&op).unwrap());
}

proptest! {
    #[test]
    fn dominance_is_reflexive(v in version_vector()) {
        prop_assert!(v.dominates(&v));
        prop_assert_eq!(v.merge_with(&v), v);
    }

    #[test]
    fn merge_with_is_a_join(a in version_vector(), b in version_vector()) {
        let ab = a.merge_with(&b);
        prop_assert_eq!(&ab, &b.merge_with(&a));
        prop_assert!(ab.dominates(&a));
        prop_assert!(ab.dominates(&b));
        prop_assert_eq!(a.dominates(&b), ab == a);
    }

    #[test]
    fn counter_merge_commutes(histories in histories()) {
        let left = replica(&histories, true);
        let right = replica(&histories, false);

        let mut l1 = left.clone();
        let mut r1 = right.clone();
        let changes = l1.merge(&r1.data()).unwrap();
        prop_assert!(r1.apply_change(&changes.other_change).unwrap());

        let mut r2 = right.clone();
        let mut l2 = left.clone();
        let changes = r2.merge(&l2.data()).unwrap();
        prop_assert!(l2.apply_change(&changes.other_change).unwrap());

        let expected: u64 = histories
            .iter()
            .map(|(deltas, l, r)| deltas[..*l.max(r)].iter().sum::<u64>())
            .sum();
        prop_assert_eq!(l1.consumer_view(), expected);
        prop_assert_eq!(r1.consumer_view(), expected);
        prop_assert_eq!(r2.consumer_view(), expected);
        prop_assert_eq!(l2.consumer_view(), expected);
    }

    #[test]
    fn orset_add_is_idempotent(
        tokens in prop::collection::btree_set(
            (prop::sample::select(ACTORS.to_vec()), 1u64..10),
            1..5,
        ),
        value in 0u32..100,
    ) {
        let tokens: Vec<WriteToken> = tokens
            .into_iter()
            .map(|(actor, version)| WriteToken::new(actor, version))
            .collect();
        let mut set = OrSet::new();
        prop_assert!(set.add("id", value, &tokens).unwrap());
        let snapshot = set.clone();
        prop_assert!(!set.add("id", value, &tokens).unwrap());
        prop_assert_eq!(set, snapshot);
    }

    #[test]
    fn collection_replicas_converge(
        shared in edits(),
        left_first in edits(),
        right_first in edits(),
        left_then in edits(),
        right_then in edits(),
    ) {
        let mut base = CrdtCollection::new();
        edit(&mut base, "c", &shared);
        let mut left = base.clone();
        let mut right = base;

        edit(&mut left, "a", &left_first);
        edit(&mut right, "b", &right_first);
        // right catches up on left, then both keep writing.
        right.merge(&left.data()).unwrap();
        edit(&mut left, "a", &left_then);
        edit(&mut right, "b", &right_then);

        let mut l1 = left.clone();
        let mut r1 = right.clone();
        let changes = l1.merge(&r1.data()).unwrap();
        r1.apply_change(&changes.other_change).unwrap();

        let mut r2 = right.clone();
        let mut l2 = left.clone();
        let changes = r2.merge(&l2.data()).unwrap();
        l2.apply_change(&changes.other_change).unwrap();

        let merged = l1.data();
        prop_assert_eq!(&r1.data(), &merged);
        prop_assert_eq!(&r2.data(), &merged);
        prop_assert_eq!(&l2.data(), &merged);
        prop_assert_eq!(l1.consumer_view(), r2.consumer_view());
    }

    #[test]
    fn singleton_survives_literal_round_trip(
        writes in prop::collection::vec(
            (prop::sample::select(vec!["a", "b"]), prop::option::of(0..IDS.len())),
            0..8,
        ),
    ) {
        let mut singleton = CrdtSingleton::new();
        for (actor, value) in writes {
            assign(&mut singleton, actor, value);
        }

        let json = singleton.data().to_literal().unwrap().to_json_string().unwrap();
        let literal = Literal::from_json_str(&json).unwrap();
        let restored = CrdtSingleton::from_data(SingletonData::from_literal(&literal).unwrap());
        prop_assert_eq!(restored.consumer_view(), singleton.consumer_view());
        prop_assert_eq!(restored, singleton);
    }
}
