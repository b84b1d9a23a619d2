use super::*;
use crate::test_support::fixtures;

#[test]
fn fixture_models_build() {
    let model = fixtures::commerce_model();

    let order = model.entity("Order").expect("Order should be mapped");
    assert_eq!(order.slot_of("lineItems"), Some(2));
    assert_eq!(order.fetchable_count(), 3);
    assert!(model.profile("with-orders").is_some());
}

#[test]
fn require_entity_reports_missing_persister() {
    let model = fixtures::employee_model();

    let err = model
        .require_entity("Invoice")
        .expect_err("unmapped entity should fail");
    assert!(matches!(err, PlanError::UnknownEntity { entity } if entity == "Invoice"));
}

#[test]
fn both_sides_of_a_bidirectional_mapping_share_an_association_key() {
    let model = fixtures::commerce_model();
    let order = model.entity("Order").expect("Order should be mapped");
    let item = model.entity("LineItem").expect("LineItem should be mapped");

    let collection_side = order
        .find_fetchable("lineItems")
        .and_then(|f| f.association_key(&order.table));
    let to_one_side = item
        .find_fetchable("order")
        .and_then(|f| f.association_key(&item.table));

    assert!(collection_side.is_some());
    assert_eq!(collection_side, to_one_side);
}

#[test]
fn values_do_not_count_toward_fetch_depth() {
    let model = fixtures::person_model();
    let person = model.entity("Person").expect("Person should be mapped");

    let depth_flags: Vec<_> = person
        .fetchables()
        .iter()
        .map(|f| (f.fetchable_name(), f.increments_fetch_depth()))
        .collect();

    assert_eq!(
        depth_flags,
        vec![
            ("name", false),
            ("bio", false),
            ("address", false),
            ("nicknames", true),
            ("favorite", true),
        ]
    );
}

#[test]
fn unknown_association_target_is_rejected() {
    let err = MappingModel::builder()
        .entity(
            EntityModel::new("Order", "orders", "id", &["id"])
                .attribute(AttributeModel::to_one("customer", "Customer", &["customer_id"])),
        )
        .build()
        .expect_err("dangling target should fail");

    assert!(matches!(err, ModelError::UnknownTarget { target, .. } if target == "Customer"));
}

#[test]
fn foreign_key_arity_must_match_target_identifier() {
    let err = MappingModel::builder()
        .entity(EntityModel::new("Line", "line", "id", &["order_id", "line_no"]))
        .entity(
            EntityModel::new("Shipment", "shipment", "id", &["id"])
                .attribute(AttributeModel::to_one("line", "Line", &["line_id"])),
        )
        .build()
        .expect_err("arity mismatch should fail");

    assert!(matches!(
        err,
        ModelError::KeyArity {
            expected: 2,
            found: 1,
            ..
        }
    ));
}

#[test]
fn duplicate_attributes_inside_embeddables_are_rejected() {
    let address = EmbeddableModel::new(
        "Address",
        vec![
            AttributeModel::basic("city", "city"),
            AttributeModel::basic("city", "town"),
        ],
    );

    let err = MappingModel::builder()
        .entity(
            EntityModel::new("Person", "person", "id", &["id"])
                .attribute(AttributeModel::embedded("address", address)),
        )
        .build()
        .expect_err("duplicate embeddable attribute should fail");

    assert!(matches!(
        err,
        ModelError::DuplicateAttribute { container, .. } if container == "Address"
    ));
}

#[test]
fn profiles_must_name_mapped_roles() {
    let err = MappingModel::builder()
        .entity(EntityModel::new("Order", "orders", "id", &["id"]))
        .profile(FetchProfile::new("broken").fetch("Order", "customer", FetchStyle::Join))
        .build()
        .expect_err("unknown profile role should fail");

    assert!(matches!(err, ModelError::UnknownProfileRole { .. }));
}

#[test]
fn fetch_option_helpers_describe_join_semantics() {
    assert!(FetchOptions::join().is_joined());
    assert!(!FetchOptions::select().is_joined());
    assert!(!FetchOptions::lazy().is_joined());
    assert_eq!(FetchOptions::batch().timing, FetchTiming::Immediate);
}
