use crate::{
    model::{CollectionSemantics, EntityModel, FetchTiming, NotFoundAction},
    path::NavigablePath,
    plan::{EntityNode, FetchParent, QueryPlan, TableAlias},
};
use derive_more::{Deref, IntoIterator};
use std::sync::Arc;

///
/// FetchList
///
/// Immutable, order-preserving list of child fetches. Order fixes the
/// initializer visit order and therefore the row-column consumption order.
/// No `DerefMut`: a finished list is never mutated.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator)]
#[into_iterator(owned, ref)]
pub struct FetchList(Vec<Fetch>);

impl FetchList {
    pub(crate) const fn new(fetches: Vec<Fetch>) -> Self {
        Self(fetches)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Fetch> {
        self.0.get(index)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Fetch> {
        self.0.iter().find(|f| f.fetchable_name() == name)
    }
}

///
/// Fetch
///
/// One plan node describing how a single attribute of a fetch parent is
/// populated. The set of kinds is closed.
///

#[derive(Clone, Debug)]
pub enum Fetch {
    Basic(BasicFetch),
    Embeddable(EmbeddableFetch),
    Entity(EntityFetch),
    Collection(CollectionFetch),
    Any(AnyFetch),
    Circular(CircularFetch),
}

impl Fetch {
    #[must_use]
    pub const fn navigable_path(&self) -> &NavigablePath {
        match self {
            Self::Basic(f) => &f.path,
            Self::Embeddable(f) => &f.path,
            Self::Entity(f) => &f.path,
            Self::Collection(f) => &f.path,
            Self::Any(f) => &f.path,
            Self::Circular(f) => &f.path,
        }
    }

    #[must_use]
    pub fn fetchable_name(&self) -> &str {
        match self {
            Self::Basic(f) => &f.name,
            Self::Embeddable(f) => &f.name,
            Self::Entity(f) => &f.name,
            Self::Collection(f) => &f.name,
            Self::Any(f) => &f.name,
            Self::Circular(f) => &f.name,
        }
    }

    /// Slot of the attribute in its container's state layout.
    #[must_use]
    pub const fn slot(&self) -> usize {
        match self {
            Self::Basic(f) => f.slot,
            Self::Embeddable(f) => f.slot,
            Self::Entity(f) => f.slot,
            Self::Collection(f) => f.slot,
            Self::Any(f) => f.slot,
            Self::Circular(f) => f.slot,
        }
    }

    #[must_use]
    pub const fn timing(&self) -> FetchTiming {
        match self {
            Self::Basic(f) => {
                if f.position.is_some() {
                    FetchTiming::Immediate
                } else {
                    FetchTiming::Delayed
                }
            }
            Self::Embeddable(f) => f.timing,
            Self::Entity(f) => f.timing,
            Self::Collection(f) => f.timing,
            Self::Any(f) => f.timing,
            Self::Circular(f) => f.timing,
        }
    }

    /// True when the fetched data itself is present in the row.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        match self {
            Self::Basic(f) => f.position.is_some(),
            Self::Embeddable(f) => matches!(f.timing, FetchTiming::Immediate),
            Self::Entity(f) => matches!(f.kind, EntityFetchKind::Joined(_)),
            Self::Collection(f) => matches!(f.kind, CollectionFetchKind::Joined(_)),
            Self::Any(_) | Self::Circular(_) => false,
        }
    }

    /// Child fetch list, for the kinds that own one.
    #[must_use]
    pub fn as_fetch_parent(&self) -> Option<&dyn FetchParent> {
        match self {
            Self::Embeddable(f) => Some(f),
            Self::Entity(EntityFetch {
                kind: EntityFetchKind::Joined(node),
                ..
            }) => Some(node),
            Self::Collection(CollectionFetch {
                kind: CollectionFetchKind::Joined(joined),
                ..
            }) => match &joined.element {
                ElementFetch::Entity(node) => Some(node),
                ElementFetch::Embeddable(element) => Some(element),
                ElementFetch::Basic(_) => None,
            },
            _ => None,
        }
    }
}

///
/// BasicFetch
///
/// `position` is `None` for a value excluded from the current fetch, which
/// is then assembled as the unfetched sentinel.
///

#[derive(Clone, Debug)]
pub struct BasicFetch {
    pub path: NavigablePath,
    pub name: String,
    pub slot: usize,
    pub column: String,
    pub position: Option<usize>,
    pub nullable: bool,
}

///
/// EmbeddableFetch
///

#[derive(Clone, Debug)]
pub struct EmbeddableFetch {
    pub path: NavigablePath,
    pub name: String,
    pub slot: usize,
    pub embeddable: String,
    pub timing: FetchTiming,
    pub fetches: FetchList,
}

impl FetchParent for EmbeddableFetch {
    fn navigable_path(&self) -> &NavigablePath {
        &self.path
    }

    fn fetches(&self) -> &FetchList {
        &self.fetches
    }
}

///
/// EntityFetch
///
/// To-one association. `foreign_key` are the row positions of the FK
/// columns on the owner's table alias.
///

#[derive(Clone, Debug)]
pub struct EntityFetch {
    pub path: NavigablePath,
    pub name: String,
    pub slot: usize,
    pub target: Arc<EntityModel>,
    pub timing: FetchTiming,
    pub foreign_key: Vec<usize>,
    pub foreign_key_columns: Vec<String>,
    pub not_found: NotFoundAction,
    pub kind: EntityFetchKind,
}

///
/// EntityFetchKind
///

#[derive(Clone, Debug)]
pub enum EntityFetchKind {
    /// Target columns are joined into the same row.
    Joined(EntityNode),
    /// Target is loaded eagerly after the result set is processed.
    Select { batched: bool },
    /// Target is left as a proxy.
    Delayed,
}

///
/// CollectionFetch
///

#[derive(Clone, Debug)]
pub struct CollectionFetch {
    pub path: NavigablePath,
    pub name: String,
    pub slot: usize,
    /// `Entity.attribute` role, used as the collection identity.
    pub role: String,
    pub semantics: CollectionSemantics,
    pub timing: FetchTiming,
    pub kind: CollectionFetchKind,
}

///
/// CollectionFetchKind
///

#[derive(Clone, Debug)]
pub enum CollectionFetchKind {
    Joined(JoinedCollection),
    Select { batched: bool },
    Delayed,
}

///
/// JoinedCollection
///
/// `key` are the row positions of the collection-table key columns; all
/// NULL means the owner has no element on this row.
///

#[derive(Clone, Debug)]
pub struct JoinedCollection {
    pub alias: TableAlias,
    pub key: Vec<usize>,
    pub key_columns: Vec<String>,
    pub index: Option<usize>,
    pub element: ElementFetch,
}

///
/// ElementFetch
///

#[derive(Clone, Debug)]
pub enum ElementFetch {
    Entity(EntityNode),
    Basic(BasicElement),
    Embeddable(EmbeddableElement),
}

impl ElementFetch {
    #[must_use]
    pub const fn navigable_path(&self) -> &NavigablePath {
        match self {
            Self::Entity(node) => &node.path,
            Self::Basic(element) => &element.path,
            Self::Embeddable(element) => &element.path,
        }
    }
}

///
/// BasicElement
///

#[derive(Clone, Debug)]
pub struct BasicElement {
    pub path: NavigablePath,
    pub column: String,
    pub position: usize,
}

///
/// EmbeddableElement
///

#[derive(Clone, Debug)]
pub struct EmbeddableElement {
    pub path: NavigablePath,
    pub embeddable: String,
    pub fetches: FetchList,
}

impl FetchParent for EmbeddableElement {
    fn navigable_path(&self) -> &NavigablePath {
        &self.path
    }

    fn fetches(&self) -> &FetchList {
        &self.fetches
    }
}

///
/// AnyFetch
///
/// Polymorphic to-one; never joined.
///

#[derive(Clone, Debug)]
pub struct AnyFetch {
    pub path: NavigablePath,
    pub name: String,
    pub slot: usize,
    pub timing: FetchTiming,
    pub discriminator: usize,
    pub key: usize,
    pub key_column: String,
    pub targets: Vec<(String, Arc<EntityModel>)>,
}

impl AnyFetch {
    #[must_use]
    pub fn target_for(&self, discriminator: &str) -> Option<&Arc<EntityModel>> {
        self.targets
            .iter()
            .find(|(value, _)| value == discriminator)
            .map(|(_, entity)| entity)
    }
}

///
/// CircularFetch
///
/// Alias for an entity node already open on the build stack. Carries only
/// the foreign key to read and the path of the node it refers to; fetches,
/// entity descriptor and identifier come from that node.
///

#[derive(Clone, Debug)]
pub struct CircularFetch {
    pub path: NavigablePath,
    pub name: String,
    pub slot: usize,
    pub timing: FetchTiming,
    pub referenced_path: NavigablePath,
    pub target: Arc<EntityModel>,
    pub foreign_key: Vec<usize>,
    pub foreign_key_columns: Vec<String>,
}

impl CircularFetch {
    /// Fetch list of the referenced node.
    #[must_use]
    pub fn fetches<'p>(&self, plan: &'p QueryPlan) -> Option<&'p FetchList> {
        plan.fetch_parent(&self.referenced_path)
            .map(|parent| parent.fetches())
    }

    /// Entity descriptor of the referenced node.
    #[must_use]
    pub fn entity<'p>(&self, plan: &'p QueryPlan) -> Option<&'p Arc<EntityModel>> {
        plan.entity_node(&self.referenced_path).map(|node| &node.entity)
    }

    /// Identifier row positions of the referenced node.
    #[must_use]
    pub fn identifier<'p>(&self, plan: &'p QueryPlan) -> Option<&'p [usize]> {
        plan.entity_node(&self.referenced_path)
            .map(|node| node.identifier.as_slice())
    }
}
