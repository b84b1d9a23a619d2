use crate::model::attribute::AttributeModel;

///
/// EntityModel
/// Runtime mapping of one entity: its table, identifier, and ordered
/// attributes. Attribute order is significant: it fixes fetch order and the
/// slot layout of managed entity state.
///

#[derive(Clone, Debug)]
pub struct EntityModel {
    /// Stable entity name used in paths and keys.
    pub name: String,
    /// Table holding the entity's own columns.
    pub table: String,
    pub identifier: IdentifierModel,
    /// Optimistic version column, read and carried but never checked here.
    pub version: Option<VersionModel>,
    pub attributes: Vec<AttributeModel>,
}

impl EntityModel {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        id_attribute: impl Into<String>,
        id_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            identifier: IdentifierModel {
                attribute: id_attribute.into(),
                columns: id_columns.iter().map(|c| (*c).to_string()).collect(),
            },
            version: None,
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn attribute(mut self, attribute: AttributeModel) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn version(mut self, attribute: impl Into<String>, column: impl Into<String>) -> Self {
        self.version = Some(VersionModel {
            attribute: attribute.into(),
            column: column.into(),
        });
        self
    }

    /// Slot of the named attribute in managed state.
    #[must_use]
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }
}

///
/// IdentifierModel
///

#[derive(Clone, Debug)]
pub struct IdentifierModel {
    pub attribute: String,
    pub columns: Vec<String>,
}

///
/// VersionModel
///

#[derive(Clone, Debug)]
pub struct VersionModel {
    pub attribute: String,
    pub column: String,
}
