use crate::{
    error::InternalError,
    exec::{
        DomainResultAssembler, InitializerId,
        initializer::{
            AnyInitializer, BiDirectionalInitializer, CollectionInitializer,
            CollectionInitializerKind, ElementAssembly, EmbeddableInitializer, EntityInitializer,
            EntityInitializerKind, EntitySelectInitializer, Initializer,
        },
    },
    model::FetchTiming,
    path::NavigablePath,
    plan::{
        CollectionFetch, CollectionFetchKind, DomainResult, ElementFetch, EmbeddableElement,
        EntityFetchKind, EntityNode, Fetch, FetchList, QueryPlan,
    },
};
use std::{collections::HashMap, sync::Arc};

///
/// InitializerNode
///
/// Closed set of initializer kinds stored in the graph arena.
///

#[derive(Clone, Debug)]
pub(crate) enum InitializerNode {
    Entity(EntityInitializer),
    EntitySelect(EntitySelectInitializer),
    BiDirectional(BiDirectionalInitializer),
    Any(AnyInitializer),
    Collection(CollectionInitializer),
    Embeddable(EmbeddableInitializer),
}

impl InitializerNode {
    pub(crate) fn as_initializer(&self) -> &dyn Initializer {
        match self {
            Self::Entity(node) => node,
            Self::EntitySelect(node) => node,
            Self::BiDirectional(node) => node,
            Self::Any(node) => node,
            Self::Collection(node) => node,
            Self::Embeddable(node) => node,
        }
    }

    pub(crate) const fn kind_label(&self) -> &'static str {
        match self {
            Self::Entity(_) => "entity",
            Self::EntitySelect(_) => "entity_select",
            Self::BiDirectional(_) => "bidirectional",
            Self::Any(_) => "any",
            Self::Collection(_) => "collection",
            Self::Embeddable(_) => "embeddable",
        }
    }
}

///
/// InitializerGraph
///
/// Runtime mirror of one plan: a flat arena of initializers in pre-order,
/// so every parent precedes its children and ids index the data table.
/// Built fresh for each execution; the plan itself is never touched.
///

#[derive(Debug)]
pub struct InitializerGraph {
    nodes: Vec<InitializerNode>,
    index: HashMap<NavigablePath, InitializerId>,
    results: Vec<DomainResultAssembler>,
    root: Option<InitializerId>,
}

impl InitializerGraph {
    pub fn build(plan: &QueryPlan) -> Result<Self, InternalError> {
        let mut builder = GraphBuilder::default();
        let mut results = Vec::with_capacity(plan.results().len());
        let mut root = None;

        for result in plan.results() {
            match result {
                DomainResult::Entity(result) => {
                    let id = builder.entity(&result.node, None, EntityInitializerKind::Root)?;
                    root.get_or_insert(id);
                    results.push(DomainResultAssembler::Entity(id));
                }
                DomainResult::Basic(result) => results.push(DomainResultAssembler::Basic {
                    path: result.path.clone(),
                    column: result.column.clone(),
                    position: result.position,
                    nullable: result.nullable,
                }),
            }
        }

        let (nodes, index) = builder.finish()?;
        tracing::debug!(
            root = %plan.root_path(),
            initializers = nodes.len(),
            "initializer graph built"
        );

        Ok(Self {
            nodes,
            index,
            results,
            root,
        })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Initializer created for the plan node at `path`.
    #[must_use]
    pub fn find(&self, path: &NavigablePath) -> Option<InitializerId> {
        self.index.get(path).copied()
    }

    /// Kind label of an initializer, for diagnostics.
    #[must_use]
    pub fn kind_of(&self, id: InitializerId) -> Option<&'static str> {
        self.nodes.get(id.0).map(InitializerNode::kind_label)
    }

    #[must_use]
    pub fn results(&self) -> &[DomainResultAssembler] {
        &self.results
    }

    /// Initializer of the first entity result.
    #[must_use]
    pub const fn root(&self) -> Option<InitializerId> {
        self.root
    }

    pub(crate) fn nodes(&self) -> &[InitializerNode] {
        &self.nodes
    }

    pub(crate) fn node(&self, id: InitializerId) -> Option<&InitializerNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn embeddable(&self, id: InitializerId) -> Option<&EmbeddableInitializer> {
        match self.node(id) {
            Some(InitializerNode::Embeddable(node)) => Some(node),
            _ => None,
        }
    }
}

///
/// Scope
///
/// Where fetches being converted sit: the initializer they hang off, the
/// entity whose key identifies nested collections, and the entity whose
/// state holds nested embedded values.
///

#[derive(Clone, Debug, Default)]
struct Scope {
    parent: Option<InitializerId>,
    key_owner: Option<InitializerId>,
    state_owner: Option<InitializerId>,
    slot_path: Vec<usize>,
}

impl Scope {
    fn entity(id: InitializerId) -> Self {
        Self {
            parent: Some(id),
            key_owner: Some(id),
            state_owner: Some(id),
            slot_path: Vec::new(),
        }
    }
}

///
/// GraphBuilder
///
/// Ids are reserved before children are converted, which yields pre-order.
///

#[derive(Default)]
struct GraphBuilder {
    nodes: Vec<Option<InitializerNode>>,
    index: HashMap<NavigablePath, InitializerId>,
}

impl GraphBuilder {
    fn reserve(&mut self, path: &NavigablePath) -> Result<InitializerId, InternalError> {
        let id = InitializerId(self.nodes.len());
        if self.index.insert(path.clone(), id).is_some() {
            return Err(InternalError::driver_invariant(format!(
                "plan reaches '{path}' twice"
            )));
        }
        self.nodes.push(None);

        Ok(id)
    }

    fn fill(&mut self, id: InitializerId, node: InitializerNode) {
        self.nodes[id.0] = Some(node);
    }

    fn finish(
        self,
    ) -> Result<(Vec<InitializerNode>, HashMap<NavigablePath, InitializerId>), InternalError> {
        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                node.ok_or_else(|| {
                    InternalError::driver_invariant(format!("initializer i{i} was never built"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((nodes, self.index))
    }

    fn entity(
        &mut self,
        node: &EntityNode,
        parent: Option<InitializerId>,
        kind: EntityInitializerKind,
    ) -> Result<InitializerId, InternalError> {
        let id = self.reserve(&node.path)?;
        let slots = self.fetches(&node.fetches, &Scope::entity(id))?;

        self.fill(
            id,
            InitializerNode::Entity(EntityInitializer {
                id,
                parent,
                path: node.path.clone(),
                entity: Arc::clone(&node.entity),
                identifier: node.identifier.clone(),
                version: node.version,
                kind,
                slots,
            }),
        );

        Ok(id)
    }

    fn fetches(
        &mut self,
        fetches: &FetchList,
        scope: &Scope,
    ) -> Result<Vec<DomainResultAssembler>, InternalError> {
        fetches.iter().map(|fetch| self.fetch(fetch, scope)).collect()
    }

    fn fetch(&mut self, fetch: &Fetch, scope: &Scope) -> Result<DomainResultAssembler, InternalError> {
        let assembler = match fetch {
            Fetch::Basic(f) => match f.position {
                Some(position) => DomainResultAssembler::Basic {
                    path: f.path.clone(),
                    column: f.column.clone(),
                    position,
                    nullable: f.nullable,
                },
                None => DomainResultAssembler::UnfetchedBasic,
            },
            Fetch::Embeddable(f) => {
                if f.timing == FetchTiming::Delayed {
                    return Ok(DomainResultAssembler::Unfetched);
                }

                let id = self.reserve(&f.path)?;
                let mut slot_path = scope.slot_path.clone();
                slot_path.push(f.slot);
                let inner = Scope {
                    parent: Some(id),
                    key_owner: scope.key_owner,
                    state_owner: scope.state_owner,
                    slot_path: slot_path.clone(),
                };
                let slots = self.fetches(&f.fetches, &inner)?;

                self.fill(
                    id,
                    InitializerNode::Embeddable(EmbeddableInitializer {
                        id,
                        parent: scope.parent,
                        path: f.path.clone(),
                        name: f.embeddable.clone(),
                        owner: scope.state_owner,
                        slot_path,
                        slots,
                    }),
                );

                DomainResultAssembler::Embeddable(id)
            }
            Fetch::Entity(f) => {
                let (timing, batched) = match &f.kind {
                    EntityFetchKind::Joined(node) => {
                        let id = self.entity(
                            node,
                            scope.parent,
                            EntityInitializerKind::JoinedToOne {
                                foreign_key: f.foreign_key.clone(),
                                foreign_key_columns: f.foreign_key_columns.clone(),
                                not_found: f.not_found,
                            },
                        )?;

                        return Ok(DomainResultAssembler::Entity(id));
                    }
                    EntityFetchKind::Select { batched } => (FetchTiming::Immediate, *batched),
                    EntityFetchKind::Delayed => (FetchTiming::Delayed, false),
                };

                let id = self.reserve(&f.path)?;
                self.fill(
                    id,
                    InitializerNode::EntitySelect(EntitySelectInitializer {
                        id,
                        parent: scope.parent,
                        path: f.path.clone(),
                        target: Arc::clone(&f.target),
                        foreign_key: f.foreign_key.clone(),
                        foreign_key_columns: f.foreign_key_columns.clone(),
                        timing,
                        batched,
                    }),
                );

                DomainResultAssembler::Entity(id)
            }
            Fetch::Collection(f) => DomainResultAssembler::Collection(self.collection(f, scope)?),
            Fetch::Any(f) => {
                let id = self.reserve(&f.path)?;
                self.fill(
                    id,
                    InitializerNode::Any(AnyInitializer {
                        id,
                        parent: scope.parent,
                        path: f.path.clone(),
                        discriminator: f.discriminator,
                        key: f.key,
                        key_column: f.key_column.clone(),
                        targets: f.targets.clone(),
                        timing: f.timing,
                    }),
                );

                DomainResultAssembler::Entity(id)
            }
            Fetch::Circular(f) => {
                let referenced = self.index.get(&f.referenced_path).copied().ok_or_else(|| {
                    InternalError::driver_invariant(format!(
                        "circular fetch '{}' refers to '{}', which has no initializer",
                        f.path, f.referenced_path
                    ))
                })?;

                let id = self.reserve(&f.path)?;
                self.fill(
                    id,
                    InitializerNode::BiDirectional(BiDirectionalInitializer {
                        id,
                        parent: scope.parent,
                        path: f.path.clone(),
                        target: Arc::clone(&f.target),
                        foreign_key: f.foreign_key.clone(),
                        foreign_key_columns: f.foreign_key_columns.clone(),
                        timing: f.timing,
                        referenced,
                    }),
                );

                DomainResultAssembler::Entity(id)
            }
        };

        Ok(assembler)
    }

    fn collection(
        &mut self,
        fetch: &CollectionFetch,
        scope: &Scope,
    ) -> Result<InitializerId, InternalError> {
        let owner = scope.key_owner.ok_or_else(|| {
            InternalError::driver_invariant(format!(
                "collection '{}' has no owning entity",
                fetch.path
            ))
        })?;
        let id = self.reserve(&fetch.path)?;

        let kind = match &fetch.kind {
            CollectionFetchKind::Joined(joined) => {
                let element = match &joined.element {
                    ElementFetch::Entity(node) => ElementAssembly::Entity(self.entity(
                        node,
                        Some(id),
                        EntityInitializerKind::Element,
                    )?),
                    ElementFetch::Basic(element) => ElementAssembly::Basic {
                        position: element.position,
                    },
                    ElementFetch::Embeddable(element) => {
                        ElementAssembly::Embeddable(self.element_embeddable(element, id)?)
                    }
                };

                CollectionInitializerKind::Joined {
                    key: joined.key.clone(),
                    index: joined.index,
                    element,
                }
            }
            CollectionFetchKind::Select { batched } => {
                CollectionInitializerKind::Select { batched: *batched }
            }
            CollectionFetchKind::Delayed => CollectionInitializerKind::Delayed,
        };

        self.fill(
            id,
            InitializerNode::Collection(CollectionInitializer {
                id,
                parent: scope.parent,
                path: fetch.path.clone(),
                role: fetch.role.clone(),
                semantics: fetch.semantics.clone(),
                owner,
                kind,
            }),
        );

        Ok(id)
    }

    // Element values have no owning entity state to preload from.
    fn element_embeddable(
        &mut self,
        element: &EmbeddableElement,
        collection: InitializerId,
    ) -> Result<InitializerId, InternalError> {
        let id = self.reserve(&element.path)?;
        let inner = Scope {
            parent: Some(id),
            ..Scope::default()
        };
        let slots = self.fetches(&element.fetches, &inner)?;

        self.fill(
            id,
            InitializerNode::Embeddable(EmbeddableInitializer {
                id,
                parent: Some(collection),
                path: element.path.clone(),
                name: element.embeddable.clone(),
                owner: None,
                slot_path: Vec::new(),
                slots,
            }),
        );

        Ok(id)
    }
}
