use super::*;
use proptest::prelude::*;
use std::{
    collections::{HashMap, hash_map::DefaultHasher},
    hash::{Hash, Hasher},
};

fn build(segments: &[String]) -> NavigablePath {
    let mut path = NavigablePath::root(segments[0].clone());
    for segment in &segments[1..] {
        path = path.append(segment.clone());
    }

    path
}

fn hash_of(path: &NavigablePath) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn display_joins_segments_and_treat_targets() {
    let path = NavigablePath::root("Order")
        .append("customer")
        .treat_as("VipCustomer")
        .append("address");

    assert_eq!(path.full_path(), "Order.customer(VipCustomer).address");
    assert_eq!(path.segments(), vec!["Order", "customer", "address"]);
    assert_eq!(path.root_name(), "Order");
    assert_eq!(path.depth(), 3);
}

#[test]
fn treat_target_participates_in_equality() {
    let plain = NavigablePath::root("Order").append("customer");
    let treated = plain.treat_as("VipCustomer");

    assert_ne!(plain, treated);
    assert_eq!(treated.parent(), plain.parent());
    assert_eq!(treated.local_name(), "customer");
}

#[test]
fn identifier_paths_are_marked_and_distinct() {
    let order = NavigablePath::root("Order");
    let id = order.identifier();

    assert_eq!(id.kind(), PathKind::EntityIdentifier);
    assert_eq!(id.parent(), Some(&order));
    assert_ne!(id, order.append("id"));
    assert_eq!(id.full_path(), "Order.{id}");
}

#[test]
fn ancestry_is_strict_and_structural() {
    let order = NavigablePath::root("Order");
    let items = order.append("lineItems");
    let element = items.element();
    let rebuilt_order = NavigablePath::root("Order");

    assert!(order.is_ancestor_of(&element));
    assert!(rebuilt_order.is_ancestor_of(&items));
    assert!(!element.is_ancestor_of(&order));
    assert!(!order.is_ancestor_of(&order));
    assert!(!NavigablePath::root("Customer").is_ancestor_of(&items));
}

#[test]
fn equal_but_distinct_paths_work_as_map_keys() {
    let mut map = HashMap::new();
    map.insert(NavigablePath::root("Order").append("customer"), 1);

    let lookup = NavigablePath::root("Order").append("customer");
    assert_eq!(map.get(&lookup), Some(&1));
}

proptest! {
    #[test]
    fn structurally_equal_paths_hash_equal(
        segments in prop::collection::vec("[a-z]{1,6}", 1..6),
    ) {
        let left = build(&segments);
        let right = build(&segments);

        prop_assert_eq!(&left, &right);
        prop_assert_eq!(hash_of(&left), hash_of(&right));
    }

    #[test]
    fn paths_are_equal_only_for_equal_segment_sequences(
        left in prop::collection::vec("[a-c]{1,2}", 1..4),
        right in prop::collection::vec("[a-c]{1,2}", 1..4),
    ) {
        let equal = build(&left) == build(&right);
        prop_assert_eq!(equal, left == right);
    }
}
