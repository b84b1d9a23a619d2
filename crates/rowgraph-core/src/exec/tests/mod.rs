mod scenarios;
mod values;

use super::*;
use crate::{
    context::{FieldValue, InstanceId, PersistenceContext},
    model::MappingModel,
    plan::{QueryPlan, QueryPlanBuilder},
    test_support::{RowBuilder, fixtures, path},
    value::Value,
};

fn build_plan(model: &MappingModel, root: &str) -> QueryPlan {
    QueryPlanBuilder::new(model, root)
        .build()
        .expect("plan should build")
}

fn options() -> ExecutionOptions {
    ExecutionOptions::default().without_metrics()
}

fn run(plan: &QueryPlan, pc: &mut PersistenceContext, rows: Vec<Vec<Value>>) -> ExecutionOutcome {
    execute(plan, pc, &mut VecJdbcValues::new(rows), options()).expect("execution should succeed")
}

fn run_err(
    plan: &QueryPlan,
    pc: &mut PersistenceContext,
    rows: Vec<Vec<Value>>,
    options: ExecutionOptions,
) -> crate::error::InternalError {
    execute(plan, pc, &mut VecJdbcValues::new(rows), options).expect_err("execution should fail")
}

// Rows are processed but the execution is left open, so per-row state
// stays inspectable.
fn drive<'p>(
    plan: &'p QueryPlan,
    pc: &mut PersistenceContext,
    rows: &[Vec<Value>],
) -> ResultSetProcessor<'p> {
    let mut processor = ResultSetProcessor::new(plan, options()).expect("processor should build");
    processor
        .start_loading(pc)
        .expect("loading should start");
    for row in rows {
        processor.process_row(pc, row).expect("row should process");
    }

    processor
}

// Order joined with its customer and, optionally, one line item.
fn order_row(plan: &QueryPlan, order: i64, customer: i64, item: Option<i64>) -> Vec<Value> {
    let mut row = RowBuilder::new(plan)
        .set("Order", "id", order)
        .set("Order", "version", 3)
        .set("Order", "status", "OPEN")
        .set("Order", "customer_id", customer)
        .set("Order.customer", "id", customer)
        .set("Order.customer", "name", "Ada");

    if let Some(item) = item {
        row = row
            .set("Order.lineItems.{element}", "id", item)
            .set("Order.lineItems.{element}", "order_id", order)
            .set("Order.lineItems.{element}", "sku", format!("sku-{item}"))
            .set("Order.lineItems.{element}", "quantity", 1);
    }

    row.build()
}

fn entity_of(row: &ResultRow) -> InstanceId {
    row[0]
        .as_entity()
        .expect("first result should be an entity")
}

fn attribute<'c>(pc: &'c PersistenceContext, id: InstanceId, name: &str) -> &'c FieldValue {
    pc.attribute(id, name)
        .unwrap_or_else(|| panic!("instance {id} should carry '{name}'"))
}

fn elements(pc: &PersistenceContext, id: InstanceId, name: &str) -> Vec<FieldValue> {
    let collection = attribute(pc, id, name)
        .as_collection()
        .and_then(|c| pc.collection(c))
        .unwrap_or_else(|| panic!("'{name}' should be a collection"));

    collection.elements().cloned().collect()
}
