use serde::Serialize;

///
/// FetchTiming
///
/// `Immediate` populates the attribute while processing the current result;
/// `Delayed` leaves a proxy or uninitialized collection to be loaded later.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum FetchTiming {
    Immediate,
    Delayed,
}

///
/// FetchStyle
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum FetchStyle {
    Join,
    Select,
    Batch,
}

///
/// FetchOptions
///
/// Mapped fetch strategy of one attribute.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FetchOptions {
    pub timing: FetchTiming,
    pub style: FetchStyle,
}

impl FetchOptions {
    /// Fetched in the same row through a join.
    #[must_use]
    pub const fn join() -> Self {
        Self {
            timing: FetchTiming::Immediate,
            style: FetchStyle::Join,
        }
    }

    /// Loaded eagerly by a subsequent select.
    #[must_use]
    pub const fn select() -> Self {
        Self {
            timing: FetchTiming::Immediate,
            style: FetchStyle::Select,
        }
    }

    /// Loaded eagerly by a subsequent batched select.
    #[must_use]
    pub const fn batch() -> Self {
        Self {
            timing: FetchTiming::Immediate,
            style: FetchStyle::Batch,
        }
    }

    /// Left as a proxy or uninitialized collection.
    #[must_use]
    pub const fn lazy() -> Self {
        Self {
            timing: FetchTiming::Delayed,
            style: FetchStyle::Select,
        }
    }

    #[must_use]
    pub const fn is_joined(self) -> bool {
        matches!(self.timing, FetchTiming::Immediate) && matches!(self.style, FetchStyle::Join)
    }
}

///
/// NotFoundAction
///
/// What to do when a foreign key points at a row that does not exist.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum NotFoundAction {
    #[default]
    Exception,
    Ignore,
}

///
/// AttributeModel
///

#[derive(Clone, Debug)]
pub struct AttributeModel {
    pub name: String,
    pub kind: AttributeKind,
    pub fetch: FetchOptions,
    pub nullable: bool,
}

impl AttributeModel {
    /// Plain column-backed attribute.
    #[must_use]
    pub fn basic(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(
            name,
            AttributeKind::Basic {
                column: column.into(),
            },
            FetchOptions::join(),
        )
    }

    /// Embedded value stored in the owner's columns.
    #[must_use]
    pub fn embedded(name: impl Into<String>, embeddable: EmbeddableModel) -> Self {
        Self::new(name, AttributeKind::Embedded(embeddable), FetchOptions::join())
    }

    /// Owning side of a single-valued association.
    #[must_use]
    pub fn to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: &[&str],
    ) -> Self {
        Self::new(
            name,
            AttributeKind::ToOne(ToOneModel {
                target: target.into(),
                foreign_key: columns(foreign_key),
                not_found: NotFoundAction::default(),
            }),
            FetchOptions::join(),
        )
    }

    /// One-to-many (or many-to-many through `table`) entity collection.
    #[must_use]
    pub fn one_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        table: impl Into<String>,
        key_columns: &[&str],
    ) -> Self {
        Self::new(
            name,
            AttributeKind::Collection(CollectionModel {
                semantics: CollectionSemantics::Bag,
                element: CollectionElement::Entity {
                    target: target.into(),
                },
                table: table.into(),
                key_columns: columns(key_columns),
            }),
            FetchOptions::lazy(),
        )
    }

    /// Collection of plain values stored in a collection table.
    #[must_use]
    pub fn element_collection(
        name: impl Into<String>,
        table: impl Into<String>,
        key_columns: &[&str],
        element_column: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            AttributeKind::Collection(CollectionModel {
                semantics: CollectionSemantics::Bag,
                element: CollectionElement::Basic {
                    column: element_column.into(),
                },
                table: table.into(),
                key_columns: columns(key_columns),
            }),
            FetchOptions::lazy(),
        )
    }

    /// Collection of embeddable values stored in a collection table.
    #[must_use]
    pub fn embeddable_collection(
        name: impl Into<String>,
        table: impl Into<String>,
        key_columns: &[&str],
        embeddable: EmbeddableModel,
    ) -> Self {
        Self::new(
            name,
            AttributeKind::Collection(CollectionModel {
                semantics: CollectionSemantics::Bag,
                element: CollectionElement::Embeddable(embeddable),
                table: table.into(),
                key_columns: columns(key_columns),
            }),
            FetchOptions::lazy(),
        )
    }

    /// Polymorphic association keyed by a discriminator column.
    #[must_use]
    pub fn any(
        name: impl Into<String>,
        discriminator_column: impl Into<String>,
        key_column: impl Into<String>,
        targets: &[(&str, &str)],
    ) -> Self {
        Self::new(
            name,
            AttributeKind::Any(AnyModel {
                discriminator_column: discriminator_column.into(),
                key_column: key_column.into(),
                targets: targets
                    .iter()
                    .map(|(value, entity)| ((*value).to_string(), (*entity).to_string()))
                    .collect(),
            }),
            FetchOptions::lazy(),
        )
    }

    fn new(name: impl Into<String>, kind: AttributeKind, fetch: FetchOptions) -> Self {
        Self {
            name: name.into(),
            kind,
            fetch,
            nullable: true,
        }
    }

    #[must_use]
    pub const fn with_fetch(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the dangling-foreign-key policy of a to-one association.
    #[must_use]
    pub fn not_found(mut self, action: NotFoundAction) -> Self {
        if let AttributeKind::ToOne(to_one) = &mut self.kind {
            to_one.not_found = action;
        }
        self
    }

    /// Set the semantics of a collection attribute.
    #[must_use]
    pub fn with_semantics(mut self, semantics: CollectionSemantics) -> Self {
        if let AttributeKind::Collection(collection) = &mut self.kind {
            collection.semantics = semantics;
        }
        self
    }

    #[must_use]
    pub const fn is_association(&self) -> bool {
        matches!(
            self.kind,
            AttributeKind::ToOne(_) | AttributeKind::Collection(_) | AttributeKind::Any(_)
        )
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

///
/// AttributeKind
///

#[derive(Clone, Debug)]
pub enum AttributeKind {
    Basic { column: String },
    Embedded(EmbeddableModel),
    ToOne(ToOneModel),
    Collection(CollectionModel),
    Any(AnyModel),
}

///
/// EmbeddableModel
///
/// Value type whose attributes live in the owner's table.
///

#[derive(Clone, Debug)]
pub struct EmbeddableModel {
    pub name: String,
    pub attributes: Vec<AttributeModel>,
}

impl EmbeddableModel {
    #[must_use]
    pub fn new(name: impl Into<String>, attributes: Vec<AttributeModel>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }
}

///
/// ToOneModel
///
/// Foreign key columns live on the owner's table and reference the
/// target's identifier columns positionally.
///

#[derive(Clone, Debug)]
pub struct ToOneModel {
    pub target: String,
    pub foreign_key: Vec<String>,
    pub not_found: NotFoundAction,
}

///
/// CollectionModel
///
/// `key_columns` live on `table` and reference the owner's identifier.
/// For a one-to-many, `table` is the element entity's own table.
///

#[derive(Clone, Debug)]
pub struct CollectionModel {
    pub semantics: CollectionSemantics,
    pub element: CollectionElement,
    pub table: String,
    pub key_columns: Vec<String>,
}

///
/// CollectionSemantics
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum CollectionSemantics {
    Bag,
    Set,
    List { index_column: String },
}

impl CollectionSemantics {
    #[must_use]
    pub const fn is_bag(&self) -> bool {
        matches!(self, Self::Bag)
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Bag => "bag",
            Self::Set => "set",
            Self::List { .. } => "list",
        }
    }
}

///
/// CollectionElement
///

#[derive(Clone, Debug)]
pub enum CollectionElement {
    Entity { target: String },
    Basic { column: String },
    Embeddable(EmbeddableModel),
}

///
/// AnyModel
///
/// `targets` maps discriminator text to entity names.
///

#[derive(Clone, Debug)]
pub struct AnyModel {
    pub discriminator_column: String,
    pub key_column: String,
    pub targets: Vec<(String, String)>,
}
