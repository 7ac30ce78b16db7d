use converge::crdt::{
    CollectionOperation, CountOperation, Crdt, CrdtCollection, CrdtCount, MergeChanges, Reference,
    VersionRange,
};

pub use crate::helpers::*;

/// A counter where `actor` has incremented once per delta.
pub fn count_with(actor: &str, deltas: &[u64]) -> CrdtCount {
    let mut count = CrdtCount::new();
    for (step, delta) in deltas.iter().enumerate() {
        let op = CountOperation::multi_increment(actor, VersionRange::step(step as u64), *delta);
        assert!(count.apply_operation(&op).unwrap());
    }
    count
}

/// An add of `id` by `actor` at `clock`.
pub fn add(actor: &str, clock: &[(&str, u64)], id: &str) -> CollectionOperation<Reference> {
    CollectionOperation::Add {
        actor: actor.into(),
        version: vv(clock),
        added: Reference::new(id),
    }
}

/// A remove of `id` by `actor` at `clock`.
pub fn remove(actor: &str, clock: &[(&str, u64)], id: &str) -> CollectionOperation<Reference> {
    CollectionOperation::Remove {
        actor: actor.into(),
        version: vv(clock),
        removed: Reference::new(id),
    }
}

/// Ids of the collection's consumer view, in view order.
pub fn ids(collection: &CrdtCollection<Reference>) -> Vec<String> {
    collection
        .consumer_view()
        .into_iter()
        .map(|r| r.id)
        .collect()
}

/// Merges `right` into `left` and applies the other-side change to `right`.
///
/// Returns the merge result for further inspection.
pub fn sync_pair<C: Crdt>(left: &mut C, right: &mut C) -> MergeChanges<C::Data, C::Operation> {
    let changes = left.merge(&right.data()).unwrap();
    assert!(right.apply_change(&changes.other_change).unwrap());
    changes
}
