//! Mapping-model fixtures shared by unit tests.

use crate::model::{
    AttributeModel, CollectionSemantics, EmbeddableModel, EntityModel, FetchOptions, FetchProfile,
    FetchStyle, MappingModel, NotFoundAction,
};

/// Customer 1..* Order 1..* LineItem, with both sides of each association.
///
/// - `Order.customer` and `LineItem.order` are join-fetched to-ones.
/// - `Order.lineItems` is a join-fetched bag.
/// - `Customer.orders` is a lazy set.
pub(crate) fn commerce_model() -> MappingModel {
    MappingModel::builder()
        .entity(
            EntityModel::new("Customer", "customer", "id", &["id"])
                .attribute(AttributeModel::basic("name", "name"))
                .attribute(
                    AttributeModel::one_to_many("orders", "Order", "orders", &["customer_id"])
                        .with_semantics(CollectionSemantics::Set),
                ),
        )
        .entity(
            EntityModel::new("Order", "orders", "id", &["id"])
                .version("version", "version")
                .attribute(AttributeModel::basic("status", "status").not_null())
                .attribute(AttributeModel::to_one("customer", "Customer", &["customer_id"]))
                .attribute(
                    AttributeModel::one_to_many("lineItems", "LineItem", "line_item", &["order_id"])
                        .with_fetch(FetchOptions::join()),
                ),
        )
        .entity(
            EntityModel::new("LineItem", "line_item", "id", &["id"])
                .attribute(AttributeModel::basic("sku", "sku"))
                .attribute(AttributeModel::basic("quantity", "quantity"))
                .attribute(AttributeModel::to_one("order", "Order", &["order_id"])),
        )
        .profile(FetchProfile::new("with-orders").fetch("Customer", "orders", FetchStyle::Join))
        .build()
        .expect("commerce model should build")
}

/// Employee with a self-referencing `manager`.
pub(crate) fn employee_model() -> MappingModel {
    MappingModel::builder()
        .entity(
            EntityModel::new("Employee", "employee", "id", &["id"])
                .attribute(AttributeModel::basic("name", "name"))
                .attribute(AttributeModel::to_one("manager", "Employee", &["manager_id"])),
        )
        .build()
        .expect("employee model should build")
}

/// Tree node with a join-fetched `parent` and a join-fetched `children` bag.
pub(crate) fn node_model() -> MappingModel {
    MappingModel::builder()
        .entity(
            EntityModel::new("Node", "node", "id", &["id"])
                .attribute(AttributeModel::basic("label", "label"))
                .attribute(AttributeModel::to_one("parent", "Node", &["parent_id"]))
                .attribute(
                    AttributeModel::one_to_many("children", "Node", "node", &["parent_id"])
                        .with_fetch(FetchOptions::join()),
                ),
        )
        .build()
        .expect("node model should build")
}

/// Person with an embedded address, a list of nicknames, and an
/// any-valued `favorite`.
///
/// - `Address.country` is an eager select-fetched to-one.
/// - `Person.nicknames` is a join-fetched list of text values.
/// - `Person.bio` is a lazy basic attribute.
pub(crate) fn person_model() -> MappingModel {
    let address = EmbeddableModel::new(
        "Address",
        vec![
            AttributeModel::basic("street", "street"),
            AttributeModel::basic("city", "city"),
            AttributeModel::to_one("country", "Country", &["country_code"])
                .with_fetch(FetchOptions::select()),
        ],
    );

    MappingModel::builder()
        .entity(
            EntityModel::new("Country", "country", "code", &["code"])
                .attribute(AttributeModel::basic("name", "name")),
        )
        .entity(
            EntityModel::new("Person", "person", "id", &["id"])
                .attribute(AttributeModel::basic("name", "name").not_null())
                .attribute(
                    AttributeModel::basic("bio", "bio").with_fetch(FetchOptions::lazy()),
                )
                .attribute(AttributeModel::embedded("address", address))
                .attribute(
                    AttributeModel::element_collection(
                        "nicknames",
                        "person_nickname",
                        &["person_id"],
                        "nickname",
                    )
                    .with_semantics(CollectionSemantics::List {
                        index_column: "position".to_string(),
                    })
                    .with_fetch(FetchOptions::join()),
                )
                .attribute(AttributeModel::any(
                    "favorite",
                    "favorite_type",
                    "favorite_id",
                    &[("C", "Country"), ("P", "Person")],
                )),
        )
        .build()
        .expect("person model should build")
}

/// Ticket whose `assignee` tolerates dangling foreign keys while `reporter`
/// does not.
pub(crate) fn ticket_model() -> MappingModel {
    MappingModel::builder()
        .entity(
            EntityModel::new("User", "app_user", "id", &["id"])
                .attribute(AttributeModel::basic("login", "login")),
        )
        .entity(
            EntityModel::new("Ticket", "ticket", "id", &["id"])
                .attribute(AttributeModel::basic("title", "title"))
                .attribute(
                    AttributeModel::to_one("assignee", "User", &["assignee_id"])
                        .not_found(NotFoundAction::Ignore),
                )
                .attribute(AttributeModel::to_one("reporter", "User", &["reporter_id"])),
        )
        .build()
        .expect("ticket model should build")
}
