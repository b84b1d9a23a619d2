use super::*;
use crate::context::EntityKey;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

#[test]
fn joined_bag_collects_one_order_with_two_line_items() {
    let model = fixtures::commerce_model();
    let plan = build_plan(&model, "Order");
    let mut pc = PersistenceContext::new();

    let outcome = run(
        &plan,
        &mut pc,
        vec![
            order_row(&plan, 1, 10, Some(100)),
            order_row(&plan, 1, 10, Some(101)),
        ],
    );

    assert_eq!(outcome.rows.len(), 1, "owner rows are filtered by default");
    let order = entity_of(&outcome.rows[0]);
    let items = elements(&pc, order, "lineItems");
    assert_eq!(items.len(), 2);

    for item in &items {
        let item = item.as_entity().expect("element should be a line item");
        assert_eq!(
            attribute(&pc, item, "order").as_entity(),
            Some(order),
            "back reference is the owning instance"
        );
    }

    let skus: Vec<_> = items
        .iter()
        .filter_map(FieldValue::as_entity)
        .map(|item| attribute(&pc, item, "sku").clone())
        .collect();
    assert_eq!(
        skus,
        [
            FieldValue::Basic(Value::from("sku-100")),
            FieldValue::Basic(Value::from("sku-101"))
        ]
    );

    let entity = pc.entity(order).expect("order should be managed");
    assert_eq!(entity.status, crate::context::EntityStatus::Managed);
    assert_eq!(entity.version, Some(Value::from(3)));
    assert_eq!(outcome.stats.entities_created, 4);
}

#[test]
fn self_referencing_manager_is_the_same_instance() {
    let model = fixtures::employee_model();
    let plan = build_plan(&model, "Employee");
    let mut pc = PersistenceContext::new();

    let row = RowBuilder::new(&plan)
        .set("Employee", "id", 1)
        .set("Employee", "name", "Grace")
        .set("Employee", "manager_id", 1)
        .set("Employee.manager", "id", 1)
        .set("Employee.manager", "name", "Grace")
        .set("Employee.manager", "manager_id", 1)
        .build();
    let processor = drive(&plan, &mut pc, &[row]);

    let employee = processor
        .instance(&path("Employee"))
        .expect("root should resolve");
    assert_eq!(processor.instance(&path("Employee.manager")), Some(employee));
    assert_eq!(
        processor
            .counters(&path("Employee.manager.manager"))
            .map(|c| c.copied_from_canonical),
        Some(1)
    );
    assert_eq!(attribute(&pc, employee, "manager").as_entity(), Some(employee));
    assert_eq!(pc.entity_count(), 1);
}

#[test]
fn node_that_is_its_own_parent_closes_on_itself() {
    let model = fixtures::node_model();
    let plan = build_plan(&model, "Node");
    let mut pc = PersistenceContext::new();

    let row = ["Node", "Node.parent", "Node.parent.children.{element}"]
        .into_iter()
        .fold(RowBuilder::new(&plan), |row, at| {
            row.set(at, "id", 1)
                .set(at, "label", "root")
                .set(at, "parent_id", 1)
        })
        .build();
    let outcome = run(&plan, &mut pc, vec![row]);

    let node = entity_of(&outcome.rows[0]);
    assert_eq!(attribute(&pc, node, "parent").as_entity(), Some(node));
    assert_eq!(elements(&pc, node, "children"), [FieldValue::Entity(Some(node))]);
    assert_eq!(pc.entity_count(), 1);
    assert!(outcome.post_load.collections().is_empty());
}

#[test]
fn null_foreign_key_is_missing_and_skips_the_subtree() {
    let model = fixtures::employee_model();
    let plan = build_plan(&model, "Employee");
    let mut pc = PersistenceContext::new();

    let row = RowBuilder::new(&plan)
        .set("Employee", "id", 1)
        .set("Employee", "name", "Grace")
        .build();
    let mut processor = drive(&plan, &mut pc, &[row]);

    assert_eq!(
        processor.state(&path("Employee.manager")),
        Some(InitializerState::Missing)
    );
    assert_eq!(processor.instance(&path("Employee.manager")), None);
    assert_eq!(
        processor.state(&path("Employee.manager.manager")),
        Some(InitializerState::Uninitialized)
    );
    assert_eq!(
        processor
            .counters(&path("Employee.manager.manager"))
            .map(|c| c.resolve_key),
        Some(0),
        "no child of a MISSING node is visited"
    );

    processor.end_loading(&mut pc, true);
    let employee = pc
        .find(&EntityKey::new("Employee", 1))
        .expect("employee should be managed");
    assert_eq!(attribute(&pc, employee, "manager"), &FieldValue::Entity(None));
}

#[test]
fn join_back_paths_resolve_to_one_customer() {
    let model = fixtures::commerce_model();
    let mut pc = PersistenceContext::new();

    let orders = build_plan(&model, "Order");
    let first = run(&orders, &mut pc, vec![order_row(&orders, 1, 10, None)]);
    let order = entity_of(&first.rows[0]);
    let customer = attribute(&pc, order, "customer")
        .as_entity()
        .expect("order should reference its customer");

    let customers = QueryPlanBuilder::new(&model, "Customer")
        .enable_profile("with-orders")
        .build()
        .expect("plan should build");
    let rows = [1, 2]
        .into_iter()
        .map(|id| {
            RowBuilder::new(&customers)
                .set("Customer", "id", 10)
                .set("Customer", "name", "Ada")
                .set("Customer.orders.{element}", "customer_id", 10)
                .set("Customer.orders.{element}", "id", id)
                .set("Customer.orders.{element}", "version", 1)
                .set("Customer.orders.{element}", "status", "OPEN")
                .build()
        })
        .collect();
    let second = run(&customers, &mut pc, rows);

    assert_eq!(entity_of(&second.rows[0]), customer);

    let placed = elements(&pc, customer, "orders");
    assert_eq!(placed.len(), 2);
    assert!(placed.contains(&FieldValue::Entity(Some(order))));
    for element in placed {
        let element = element.as_entity().expect("element should be an order");
        assert_eq!(attribute(&pc, element, "customer").as_entity(), Some(customer));
    }
}

#[test]
fn join_back_within_one_plan_shares_the_customer() {
    let model = fixtures::commerce_model();
    let plan = QueryPlanBuilder::new(&model, "Order")
        .enable_profile("with-orders")
        .build()
        .expect("plan should build");
    let mut pc = PersistenceContext::new();

    let rows: Vec<_> = [1, 2]
        .into_iter()
        .map(|id| {
            RowBuilder::new(&plan)
                .set("Order", "id", 1)
                .set("Order", "version", 3)
                .set("Order", "status", "OPEN")
                .set("Order", "customer_id", 10)
                .set("Order.customer", "id", 10)
                .set("Order.customer", "name", "Ada")
                .set("Order.customer.orders.{element}", "customer_id", 10)
                .set("Order.customer.orders.{element}", "id", id)
                .set("Order.customer.orders.{element}", "version", 3)
                .set("Order.customer.orders.{element}", "status", "OPEN")
                .build()
        })
        .collect();
    let mut processor = drive(&plan, &mut pc, &rows);

    let customer = processor
        .instance(&path("Order.customer"))
        .expect("customer should resolve");
    let back = path("Order.customer.orders.{element}.customer");
    assert_eq!(
        processor.graph().find(&back).and_then(|id| processor.graph().kind_of(id)),
        Some("bidirectional")
    );
    assert_eq!(processor.instance(&back), Some(customer));
    processor.end_loading(&mut pc, true);

    let placed = elements(&pc, customer, "orders");
    assert_eq!(placed.len(), 2);
    for element in placed {
        let element = element.as_entity().expect("element should be an order");
        assert_eq!(attribute(&pc, element, "customer").as_entity(), Some(customer));
    }
    assert_eq!(pc.find(&EntityKey::new("Customer", 10)), Some(customer));
}

#[test]
fn consecutive_rows_reuse_the_owner_resolution() {
    let model = fixtures::commerce_model();
    let plan = build_plan(&model, "Order");
    let mut pc = PersistenceContext::new();

    let rows: Vec<_> = (100..103)
        .map(|item| order_row(&plan, 1, 10, Some(item)))
        .collect();
    let processor = drive(&plan, &mut pc, &rows);

    let order = processor
        .counters(&path("Order"))
        .expect("root should have counters");
    assert_eq!(order.resolve_instance, 1);
    assert_eq!(order.from_previous_row, 2);
    assert_eq!(order.initialize, 1);

    let collection = processor
        .counters(&path("Order.lineItems"))
        .expect("collection should have counters");
    assert_eq!(collection.resolve_instance, 1);
    assert_eq!(collection.from_previous_row, 2);
    assert_eq!(collection.initialize, 3);

    let order = processor.instance(&path("Order")).expect("order should resolve");
    assert_eq!(elements(&pc, order, "lineItems").len(), 3);
    // Order, Order.customer, Order.lineItems and Order.customer.orders
    assert_eq!(processor.stats().reuses, 8);
}

proptest! {
    #[test]
    fn rows_sharing_a_key_share_one_instance(
        pairs in prop::collection::vec((1_i64..=3, 1_i64..=4), 1..24),
    ) {
        let model = fixtures::commerce_model();
        let plan = build_plan(&model, "Order");
        let mut pc = PersistenceContext::new();

        let rows = pairs
            .iter()
            .map(|(order, item)| order_row(&plan, *order, 7, Some(order * 10 + item)))
            .collect();
        let outcome = run(&plan, &mut pc, rows);

        let mut expected: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for (order, item) in &pairs {
            expected.entry(*order).or_default().insert(order * 10 + item);
        }

        prop_assert_eq!(outcome.rows.len(), expected.len());
        let items: usize = expected.values().map(BTreeSet::len).sum();
        prop_assert_eq!(pc.entity_count(), expected.len() + items + 1);

        for (order, items) in &expected {
            let instance = pc.find(&EntityKey::new("Order", *order));
            prop_assert!(instance.is_some());
            let instance = instance.unwrap_or(InstanceId(usize::MAX));

            prop_assert!(outcome.rows.iter().any(|row| entity_of(row) == instance));
            prop_assert_eq!(elements(&pc, instance, "lineItems").len(), items.len());
        }
    }
}
