use super::*;
use crate::define_idx;

define_idx!(TestId);

#[test]
fn test_push_returns_sequential_indices() {
    let mut v: IndexVec<TestId, &str> = IndexVec::new();
    assert_eq!(v.push("a"), TestId(0));
    assert_eq!(v.push("b"), TestId(1));
    assert_eq!(v.push("c"), TestId(2));
    assert_eq!(v.len(), 3);
}

#[test]
fn test_typed_indexing() {
    let mut v: IndexVec<TestId, i32> = IndexVec::new();
    let id = v.push(42);
    assert_eq!(v[id], 42);
    v[id] = 7;
    assert_eq!(v[id], 7);
}

#[test]
fn test_get_out_of_bounds() {
    let v: IndexVec<TestId, i32> = IndexVec::new();
    assert_eq!(v.get(TestId(0)), None);
}

#[test]
fn test_next_index() {
    let mut v: IndexVec<TestId, i32> = IndexVec::new();
    assert_eq!(v.next_index(), TestId(0));
    v.push(1);
    assert_eq!(v.next_index(), TestId(1));
}

#[test]
fn test_iter_enumerated() {
    let mut v: IndexVec<TestId, &str> = IndexVec::new();
    v.push("x");
    v.push("y");

    let pairs: Vec<_> = v.iter_enumerated().collect();
    assert_eq!(pairs, vec![(TestId(0), &"x"), (TestId(1), &"y")]);
}

#[test]
fn test_indices() {
    let mut v: IndexVec<TestId, i32> = IndexVec::new();
    v.push(1);
    v.push(2);
    let ids: Vec<_> = v.indices().collect();
    assert_eq!(ids, vec![TestId(0), TestId(1)]);
}

#[test]
fn test_from_raw() {
    let v: IndexVec<TestId, i32> = IndexVec::from_raw(vec![10, 20]);
    assert_eq!(v[TestId(1)], 20);
}

#[test]
fn test_idx_roundtrip() {
    for i in [0usize, 1, 100, 65_535] {
        assert_eq!(TestId::from_usize(i).index(), i);
    }
}

#[test]
fn test_empty_and_default() {
    let v: IndexVec<TestId, i32> = IndexVec::default();
    assert!(v.is_empty());
    assert_eq!(v.len(), 0);
}

#[quickcheck_macros::quickcheck]
fn prop_push_then_index_roundtrips(values: Vec<i32>) -> bool {
    let mut v: IndexVec<TestId, i32> = IndexVec::new();
    let ids: Vec<_> = values.iter().map(|&x| v.push(x)).collect();
    ids.iter().zip(&values).all(|(&id, &x)| v[id] == x)
}
