use super::*;
use crate::{
    context::{EmbeddedValue, EntityKey},
    error::{ErrorClass, RowError},
};

fn person(plan: &QueryPlan, id: i64) -> RowBuilder<'_> {
    RowBuilder::new(plan)
        .set("Person", "id", id)
        .set("Person", "name", "Ada")
}

fn nickname<'a>(row: RowBuilder<'a>, person: i64, position: i64, value: &str) -> RowBuilder<'a> {
    row.set("Person.nicknames", "person_id", person)
        .set("Person.nicknames", "position", position)
        .set("Person.nicknames", "nickname", value)
}

fn address(row: RowBuilder<'_>) -> RowBuilder<'_> {
    row.set("Person", "street", "Main St")
        .set("Person", "city", "Berlin")
        .set("Person", "country_code", "DE")
}

#[test]
fn embedded_value_and_list_elements_are_assembled() {
    let model = fixtures::person_model();
    let plan = build_plan(&model, "Person");
    let mut pc = PersistenceContext::new();

    let outcome = run(
        &plan,
        &mut pc,
        vec![
            nickname(address(person(&plan, 1)), 1, 1, "Bo").build(),
            nickname(address(person(&plan, 1)), 1, 0, "Al").build(),
        ],
    );

    let person = entity_of(&outcome.rows[0]);
    let country = pc
        .find(&EntityKey::new("Country", "DE"))
        .expect("country proxy should exist");
    assert!(pc.entity(country).is_some_and(|e| e.is_proxy()));

    assert_eq!(
        attribute(&pc, person, "address"),
        &FieldValue::Embedded(Some(EmbeddedValue {
            name: "Address".to_string(),
            fields: vec![
                FieldValue::Basic(Value::from("Main St")),
                FieldValue::Basic(Value::from("Berlin")),
                FieldValue::Entity(Some(country)),
            ],
        }))
    );
    assert!(attribute(&pc, person, "bio").is_unfetched());
    assert_eq!(
        elements(&pc, person, "nicknames"),
        [
            FieldValue::Basic(Value::from("Al")),
            FieldValue::Basic(Value::from("Bo")),
        ]
    );

    // eager select of the country is left to the caller
    let pending: Vec<_> = outcome
        .post_load
        .entities()
        .iter()
        .map(|load| load.key.to_string())
        .collect();
    assert_eq!(pending, ["Country['DE']"]);
}

#[test]
fn all_null_embeddable_is_absent() {
    let model = fixtures::person_model();
    let plan = build_plan(&model, "Person");
    let mut pc = PersistenceContext::new();

    let processor = drive(&plan, &mut pc, &[person(&plan, 1).build()]);
    assert_eq!(
        processor.state(&path("Person.address")),
        Some(InitializerState::Missing)
    );
    assert_eq!(
        processor.state(&path("Person.address.country")),
        Some(InitializerState::Missing)
    );

    let person = processor.instance(&path("Person")).expect("person should resolve");
    assert_eq!(attribute(&pc, person, "address"), &FieldValue::Embedded(None));
    assert!(elements(&pc, person, "nicknames").is_empty());
    assert!(processor.post_load().is_empty());
}

#[test]
fn managed_owner_provides_its_embedded_value() {
    let model = fixtures::person_model();
    let plan = build_plan(&model, "Person");
    let mut pc = PersistenceContext::new();
    let row = person(&plan, 1).set("Person", "street", "Main St").build();

    run(&plan, &mut pc, vec![row.clone()]);
    let processor = drive(&plan, &mut pc, &[row]);

    let data = processor
        .data(&path("Person.address"))
        .expect("address should have row data");
    assert!(data.is_preloaded());
    assert_eq!(data.counters().initialize_from_parent, 1);
    assert_eq!(data.counters().initialize, 0);
    assert_eq!(
        data.embedded().and_then(|e| e.field(0)),
        Some(&FieldValue::Basic(Value::from("Main St")))
    );
}

#[test]
fn conflicting_list_index_is_rejected() {
    let model = fixtures::person_model();
    let plan = build_plan(&model, "Person");
    let mut pc = PersistenceContext::new();

    let err = run_err(
        &plan,
        &mut pc,
        vec![
            nickname(person(&plan, 1), 1, 0, "Al").build(),
            nickname(person(&plan, 1), 1, 0, "Bo").build(),
        ],
        options(),
    );

    assert_eq!(err.class, ErrorClass::Conflict);
    assert_eq!(
        err.row_error(),
        Some(&RowError::ListIndexConflict {
            path: "Person.nicknames".to_string(),
            index: 0,
        })
    );
}

#[test]
fn any_association_follows_its_discriminator() {
    let model = fixtures::person_model();
    let plan = build_plan(&model, "Person");
    let mut pc = PersistenceContext::new();

    let outcome = run(
        &plan,
        &mut pc,
        vec![
            person(&plan, 1)
                .set("Person", "favorite_type", "C")
                .set("Person", "favorite_id", "FR")
                .build(),
            person(&plan, 2).build(),
        ],
    );

    let first = entity_of(&outcome.rows[0]);
    let france = pc
        .find(&EntityKey::new("Country", "FR"))
        .expect("favorite should be linked as a proxy");
    assert_eq!(attribute(&pc, first, "favorite").as_entity(), Some(france));
    assert!(outcome.post_load.entities().is_empty(), "favorite is lazy");

    let second = entity_of(&outcome.rows[1]);
    assert_eq!(attribute(&pc, second, "favorite"), &FieldValue::Entity(None));

    let err = run_err(
        &plan,
        &mut PersistenceContext::new(),
        vec![
            person(&plan, 3)
                .set("Person", "favorite_type", "X")
                .set("Person", "favorite_id", "1")
                .build(),
        ],
        options(),
    );
    assert_eq!(
        err.row_error(),
        Some(&RowError::UnknownDiscriminator {
            path: "Person.favorite".to_string(),
            value: "X".to_string(),
        })
    );
}
