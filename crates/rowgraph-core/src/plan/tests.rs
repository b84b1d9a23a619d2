use super::{
    state::{AssociationFrame, AssociationSide, CreationState},
    *,
};
use crate::{
    error::{ErrorClass, PlanError},
    graph::{EntityGraph, GraphSemantic},
    model::{
        AssociationKey, AttributeModel, CollectionSemantics, EntityModel, FetchOptions, FetchTiming,
        MappingModel,
    },
    test_support::{fixtures, path},
};

fn build(model: &MappingModel, root: &str) -> QueryPlan {
    QueryPlanBuilder::new(model, root)
        .build()
        .expect("plan should build")
}

fn fetch<'p>(plan: &'p QueryPlan, rendered: &str) -> &'p Fetch {
    plan.find_fetch(&path(rendered))
        .unwrap_or_else(|| panic!("plan should contain a fetch at '{rendered}'"))
}

fn referenced_path(fetch: &Fetch) -> String {
    match fetch {
        Fetch::Circular(circular) => circular.referenced_path.full_path(),
        other => panic!("expected a circular fetch, found {other:?}"),
    }
}

// Blog with two join-fetched bags and one join-fetched set.
fn blog_model() -> MappingModel {
    MappingModel::builder()
        .entity(
            EntityModel::new("Post", "post", "id", &["id"])
                .attribute(AttributeModel::basic("title", "title")),
        )
        .entity(
            EntityModel::new("Blog", "blog", "id", &["id"])
                .attribute(
                    AttributeModel::one_to_many("posts", "Post", "post", &["blog_id"])
                        .with_fetch(FetchOptions::join()),
                )
                .attribute(
                    AttributeModel::element_collection("tags", "blog_tag", &["blog_id"], "tag")
                        .with_fetch(FetchOptions::join()),
                )
                .attribute(
                    AttributeModel::element_collection(
                        "labels",
                        "blog_label",
                        &["blog_id"],
                        "label",
                    )
                    .with_semantics(CollectionSemantics::Set)
                    .with_fetch(FetchOptions::join()),
                ),
        )
        .build()
        .expect("blog model should build")
}

#[test]
fn order_plan_joins_customer_and_line_items() {
    let model = fixtures::commerce_model();
    let plan = build(&model, "Order");

    assert!(matches!(
        fetch(&plan, "Order.customer"),
        Fetch::Entity(EntityFetch {
            kind: EntityFetchKind::Joined(_),
            ..
        })
    ));
    assert!(matches!(
        fetch(&plan, "Order.customer.orders"),
        Fetch::Collection(CollectionFetch {
            kind: CollectionFetchKind::Delayed,
            ..
        })
    ));
    assert!(plan.has_joined_collection());

    // one-to-many elements share the collection table alias
    assert_eq!(plan.alias_of("Order.lineItems"), plan.alias_of("Order.lineItems.{element}"));
}

#[test]
fn selections_are_deduplicated_per_alias_and_column() {
    let model = fixtures::commerce_model();
    let plan = build(&model, "Order");

    // the collection key and the element's own FK are the same column
    let key = plan.position_of("Order.lineItems", "order_id");
    assert!(key.is_some());
    assert_eq!(key, plan.position_of("Order.lineItems.{element}", "order_id"));

    // Order: id, version, status, customer_id; Customer: id, name;
    // LineItem: order_id, id, sku, quantity
    assert_eq!(plan.selections().width(), 10);
}

#[test]
fn self_referencing_to_one_becomes_circular() {
    let model = fixtures::employee_model();
    let plan = build(&model, "Employee");

    let manager = fetch(&plan, "Employee.manager.manager");
    assert_eq!(referenced_path(manager), "Employee.manager");
    assert_eq!(plan.circular_fetch_count(), 1);
    assert_eq!(plan.selections().width(), 6);
}

#[test]
fn collection_element_back_reference_is_circular_to_owner() {
    let model = fixtures::commerce_model();
    let plan = build(&model, "Order");

    let order = fetch(&plan, "Order.lineItems.{element}.order");
    assert_eq!(referenced_path(order), "Order");

    let Fetch::Circular(circular) = order else {
        panic!("expected circular fetch");
    };
    assert_eq!(
        circular.entity(&plan).map(|e| e.name.as_str()),
        Some("Order")
    );
    assert_eq!(
        circular.fetches(&plan).map(|fetches| fetches.len()),
        Some(3),
        "circular fetch delegates to the referenced node's fetch list"
    );
    assert!(circular.identifier(&plan).is_some_and(|id| id.len() == 1));
}

#[test]
fn recursive_tree_plan_terminates() {
    let model = fixtures::node_model();
    let plan = build(&model, "Node");

    assert_eq!(referenced_path(fetch(&plan, "Node.parent.parent")), "Node.parent");
    assert_eq!(
        referenced_path(fetch(&plan, "Node.parent.children.{element}.parent")),
        "Node.parent"
    );
    assert_eq!(plan.circular_fetch_count(), 2);

    // an association key already expanded as a collection is not joined again
    assert!(matches!(
        fetch(&plan, "Node.parent.children.{element}.children"),
        Fetch::Collection(CollectionFetch {
            kind: CollectionFetchKind::Select { batched: false },
            ..
        })
    ));
}

#[test]
fn fetch_depth_limit_stops_joining() {
    let model = fixtures::employee_model();
    let plan = QueryPlanBuilder::new(&model, "Employee")
        .max_fetch_depth(Some(0))
        .build()
        .expect("plan should build");

    assert!(matches!(
        fetch(&plan, "Employee.manager"),
        Fetch::Entity(EntityFetch {
            kind: EntityFetchKind::Select { batched: false },
            ..
        })
    ));
    assert_eq!(plan.selections().width(), 3);
    assert_eq!(plan.circular_fetch_count(), 0);
}

#[test]
fn only_one_bag_is_join_fetched() {
    let model = blog_model();
    let plan = build(&model, "Blog");

    assert!(matches!(
        fetch(&plan, "Blog.posts"),
        Fetch::Collection(CollectionFetch {
            kind: CollectionFetchKind::Joined(_),
            ..
        })
    ));
    assert!(matches!(
        fetch(&plan, "Blog.tags"),
        Fetch::Collection(CollectionFetch {
            kind: CollectionFetchKind::Select { .. },
            ..
        })
    ));
    // sets are not bags
    assert!(matches!(
        fetch(&plan, "Blog.labels"),
        Fetch::Collection(CollectionFetch {
            kind: CollectionFetchKind::Joined(_),
            ..
        })
    ));
}

#[test]
fn fetch_graph_delays_unnamed_associations() {
    let model = fixtures::commerce_model();
    let graph = EntityGraph::parse("Order", GraphSemantic::Fetch, "lineItems")
        .expect("graph should parse");
    let plan = QueryPlanBuilder::new(&model, "Order")
        .entity_graph(&graph)
        .build()
        .expect("plan should build");

    let customer = fetch(&plan, "Order.customer");
    assert_eq!(customer.timing(), FetchTiming::Delayed);
    assert!(matches!(
        customer,
        Fetch::Entity(EntityFetch {
            kind: EntityFetchKind::Delayed,
            ..
        })
    ));
    assert!(fetch(&plan, "Order.lineItems").is_selected());

    // values are untouched by the graph unless named
    assert!(fetch(&plan, "Order.status").is_selected());
}

#[test]
fn load_graph_upgrades_named_paths_and_keeps_mapped_timing_elsewhere() {
    let model = fixtures::commerce_model();
    let graph = EntityGraph::parse("Order", GraphSemantic::Load, "customer(orders)")
        .expect("graph should parse");
    let plan = QueryPlanBuilder::new(&model, "Order")
        .entity_graph(&graph)
        .build()
        .expect("plan should build");

    assert!(fetch(&plan, "Order.customer.orders").is_selected());
    assert_eq!(
        referenced_path(fetch(&plan, "Order.customer.orders.{element}.customer")),
        "Order.customer"
    );
}

#[test]
fn profile_upgrades_role_only_without_graph() {
    let model = fixtures::commerce_model();

    let plain = build(&model, "Customer");
    assert!(!fetch(&plain, "Customer.orders").is_selected());

    let profiled = QueryPlanBuilder::new(&model, "Customer")
        .enable_profile("with-orders")
        .build()
        .expect("plan should build");
    assert!(fetch(&profiled, "Customer.orders").is_selected());

    let graph =
        EntityGraph::parse("Customer", GraphSemantic::Fetch, "name").expect("graph should parse");
    let graphed = QueryPlanBuilder::new(&model, "Customer")
        .enable_profile("with-orders")
        .entity_graph(&graph)
        .build()
        .expect("plan should build");
    assert!(!fetch(&graphed, "Customer.orders").is_selected());
}

#[test]
fn lazy_basic_attribute_is_not_selected() {
    let model = fixtures::person_model();
    let plan = build(&model, "Person");

    let bio = fetch(&plan, "Person.bio");
    assert!(matches!(bio, Fetch::Basic(BasicFetch { position: None, .. })));
    assert_eq!(bio.timing(), FetchTiming::Delayed);
    assert!(fetch(&plan, "Person.address.city").is_selected());
    assert!(matches!(
        fetch(&plan, "Person.address.country"),
        Fetch::Entity(EntityFetch {
            kind: EntityFetchKind::Select { batched: false },
            ..
        })
    ));
    assert!(plan.position_of("Person.nicknames", "position").is_some());
}

#[test]
fn any_fetch_maps_discriminators_to_targets() {
    let model = fixtures::person_model();
    let plan = build(&model, "Person");

    let Fetch::Any(favorite) = fetch(&plan, "Person.favorite") else {
        panic!("favorite should be an any fetch");
    };
    assert_eq!(favorite.timing, FetchTiming::Delayed);
    assert_eq!(favorite.target_for("C").map(|e| e.name.as_str()), Some("Country"));
    assert_eq!(favorite.target_for("P").map(|e| e.name.as_str()), Some("Person"));
    assert!(favorite.target_for("X").is_none());
    assert_eq!(plan.position_of("Person", "favorite_type"), Some(favorite.discriminator));
}

#[test]
fn scalar_results_share_the_root_alias() {
    let model = fixtures::commerce_model();
    let plan = QueryPlanBuilder::new(&model, "Order")
        .select_attribute("status", Some("s"))
        .select_entity(Some("o"))
        .build()
        .expect("plan should build");

    let [DomainResult::Basic(status), DomainResult::Entity(order)] = plan.results() else {
        panic!("expected a basic and an entity result");
    };
    assert_eq!(status.position, 0);
    assert_eq!(plan.results()[0].result_variable(), Some("s"));
    assert_eq!(order.node.alias, root_alias(&plan));
}

fn root_alias(plan: &QueryPlan) -> TableAlias {
    plan.alias_of("Order")
        .cloned()
        .expect("root alias should be bound")
}

#[test]
fn association_cannot_be_a_scalar_result() {
    let model = fixtures::commerce_model();
    let err = QueryPlanBuilder::new(&model, "Order")
        .select_attribute("customer", None)
        .build()
        .expect_err("association scalar should fail");

    assert!(matches!(
        err.plan_error(),
        Some(PlanError::UnsupportedResult { attribute, .. }) if attribute == "customer"
    ));
}

#[test]
fn unknown_root_and_profile_are_plan_errors() {
    let model = fixtures::commerce_model();

    let err = QueryPlanBuilder::new(&model, "Invoice")
        .build()
        .expect_err("unknown root should fail");
    assert!(err.is_plan_error());
    assert_eq!(err.class, ErrorClass::NotFound);

    let err = QueryPlanBuilder::new(&model, "Order")
        .enable_profile("missing")
        .build()
        .expect_err("unknown profile should fail");
    assert!(matches!(
        err.plan_error(),
        Some(PlanError::UnknownFetchProfile { profile }) if profile == "missing"
    ));
}

#[test]
fn graph_for_another_root_is_rejected() {
    let model = fixtures::commerce_model();
    let graph =
        EntityGraph::parse("Customer", GraphSemantic::Fetch, "orders").expect("graph should parse");

    let err = QueryPlanBuilder::new(&model, "Order")
        .entity_graph(&graph)
        .build()
        .expect_err("mismatched graph should fail");
    assert!(matches!(err.plan_error(), Some(PlanError::GraphRootMismatch { .. })));
}

#[test]
fn circular_resolution_cannot_be_reentered() {
    let model = fixtures::employee_model();
    let mut state = CreationState::new(&model, None, Vec::new(), None);
    let at = path("Employee.manager");
    let key = AssociationKey {
        table: "employee".to_string(),
        columns: vec!["manager_id".to_string()],
    };
    let mut frame = state.push_association(AssociationFrame {
        key: key.clone(),
        referenced_path: at.clone(),
        side: AssociationSide::ToOne,
    });
    assert!(frame.visited_association(&key).is_some());

    {
        let mut resolving = frame
            .resolve_circular_fetch(&at)
            .expect("first resolution should succeed");
        assert!(resolving.is_resolving_circular_fetch());
        assert!(
            resolving.visited_association(&key).is_none(),
            "detection is suspended while resolving"
        );

        let err = resolving
            .resolve_circular_fetch(&at)
            .err()
            .expect("nested resolution should fail");
        assert!(matches!(err, PlanError::CircularResolutionReentry { .. }));
    }

    assert!(!frame.is_resolving_circular_fetch());
    assert!(frame.visited_association(&key).is_some());
    drop(frame);
    assert!(state.visited_association(&key).is_none());
}

#[test]
fn fingerprint_is_stable_and_shape_sensitive() {
    let model = fixtures::commerce_model();
    let first = build(&model, "Order");
    let second = build(&model, "Order");
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.fingerprint().as_hex().len(), 64);

    let graph =
        EntityGraph::parse("Order", GraphSemantic::Fetch, "customer").expect("graph should parse");
    let graphed = QueryPlanBuilder::new(&model, "Order")
        .entity_graph(&graph)
        .build()
        .expect("plan should build");
    assert_ne!(first.fingerprint(), graphed.fingerprint());
}

#[test]
fn explain_serializes_fetch_tree() {
    let model = fixtures::employee_model();
    let plan = build(&model, "Employee");

    let json = serde_json::to_value(plan.explain()).expect("explain should serialize");
    let manager = &json["results"][0]["fetches"][1];

    assert_eq!(json["results"][0]["kind"], "entity");
    assert_eq!(manager["style"], "join");
    assert_eq!(manager["alias"], "t1");
    assert_eq!(manager["fetches"][1]["kind"], "circular");
    assert_eq!(manager["fetches"][1]["referenced_path"], "Employee.manager");
}

#[test]
fn cache_reuses_plans_and_never_caches_failures() {
    let model = fixtures::commerce_model();
    let cache = PlanCache::new();
    let builder = QueryPlanBuilder::new(&model, "Order");

    let first = cache.get_or_build(&builder).expect("first build should succeed");
    let second = cache.get_or_build(&builder).expect("cached build should succeed");
    assert!(Arc::ptr_eq(&first, &second));

    let failing = QueryPlanBuilder::new(&model, "Order").enable_profile("missing");
    assert!(cache.get_or_build(&failing).is_err());

    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            misses: 2,
            size: 1,
        }
    );

    cache.clear();
    assert_eq!(cache.stats().size, 0);
}
